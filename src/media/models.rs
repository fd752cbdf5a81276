use crate::platform::{ContentLocator, Document, Message, MessageMedia, Photo};
use crate::store::MediaKind;

use super::MediaError;

pub const PREVIEW_VIDEO_MIME: &str = "video/mp4";
pub const UNKNOWN_MIME: &str = "unknown/unknown";

/// A download candidate picked out of a message.
#[derive(Debug, Clone)]
pub enum Downloadable {
    /// Video attached to a link preview.
    WebPreview(Document),
    Document(Document),
    Photo(Photo),
    /// Media the platform delivered but we have no download path for.
    Unsupported(String),
}

impl Downloadable {
    /// Picks the candidate for a message. A `video/mp4` link preview wins
    /// over the native attachment.
    pub fn from_message(message: &Message) -> Option<Self> {
        match message.media.as_ref()? {
            MessageMedia::WebPage(page) => page
                .document
                .as_ref()
                .filter(|doc| doc.mime_type.as_deref() == Some(PREVIEW_VIDEO_MIME))
                .cloned()
                .map(Downloadable::WebPreview),
            MessageMedia::Document(doc) => Some(Downloadable::Document(doc.clone())),
            MessageMedia::Photo(photo) => Some(Downloadable::Photo(photo.clone())),
            MessageMedia::Unsupported { description } => {
                Some(Downloadable::Unsupported(description.clone()))
            }
        }
    }

    /// Advertised size, zero when unknown.
    pub fn declared_size(&self) -> u64 {
        match self {
            Downloadable::WebPreview(doc) | Downloadable::Document(doc) => doc.size,
            Downloadable::Photo(photo) => photo.size,
            Downloadable::Unsupported(_) => 0,
        }
    }

    pub fn sticker_set(&self) -> Option<&str> {
        match self {
            Downloadable::Document(doc) => doc.sticker_set.as_deref(),
            _ => None,
        }
    }

    pub fn resolve(&self, message: &Message) -> Result<ResolvedMedia, MediaError> {
        let (file_id, size, mime_type, file_name, from_preview) = match self {
            Downloadable::WebPreview(doc) => (
                &doc.file_id,
                doc.size,
                doc.mime_type.clone(),
                doc.file_name.clone(),
                true,
            ),
            Downloadable::Document(doc) => (
                &doc.file_id,
                doc.size,
                doc.mime_type.clone(),
                doc.file_name.clone(),
                false,
            ),
            Downloadable::Photo(photo) => (&photo.file_id, photo.size, None, None, false),
            Downloadable::Unsupported(_) => return Err(MediaError::Unresolvable(message.id)),
        };

        Ok(ResolvedMedia {
            locator: ContentLocator {
                channel_id: message.channel_id,
                message_id: message.id,
                file_id: file_id.clone(),
                from_preview,
            },
            file_id: file_id.clone(),
            size,
            mime_type,
            file_name,
            from_preview,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub locator: ContentLocator,
    pub file_id: String,
    pub size: u64,
    pub mime_type: Option<String>,
    /// Name the sender attached, if any.
    pub file_name: Option<String>,
    pub from_preview: bool,
}

/// Descriptor of a file that landed in the media root. Never stored as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub locator: ContentLocator,
    pub file_id: String,
    pub from_preview: bool,
    pub mime_type: String,
    pub media_type: MediaKind,
    pub file_name: String,
    pub file_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoMedia,
    Oversized,
    Sticker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Ingested(DownloadItem),
    /// Same content and size already stored.
    AlreadyPresent { media_item_id: String },
    /// Legacy row got its channel and message ids filled in.
    Patched { media_item_id: String },
    Skipped(SkipReason),
}

/// MIME major type first, then native photo, then document.
pub fn classify(mime_type: &str, message: &Message) -> MediaKind {
    match mime_type.split('/').next() {
        Some("video") => MediaKind::Video,
        Some("image") => MediaKind::Image,
        _ if matches!(message.media, Some(MessageMedia::Photo(_))) => MediaKind::Photo,
        _ => MediaKind::Document,
    }
}
