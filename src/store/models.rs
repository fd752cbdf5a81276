use serde::{Deserialize, Serialize};

/// Origin of a media item. Only `Telegram` is written by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Telegram,
    Twitter,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Telegram, Source::Twitter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Telegram => "telegram",
            Source::Twitter => "twitter",
        }
    }
}

/// Media type as recorded in `media_types.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Image,
    Document,
    Unknown,
}

impl MediaKind {
    pub const ALL: [MediaKind; 5] = [
        MediaKind::Photo,
        MediaKind::Video,
        MediaKind::Image,
        MediaKind::Document,
        MediaKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Image => "image",
            MediaKind::Document => "document",
            MediaKind::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(MediaKind::Photo),
            "video" => Some(MediaKind::Video),
            "image" => Some(MediaKind::Image),
            "document" => Some(MediaKind::Document),
            "unknown" => Some(MediaKind::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: i64,
    pub title: String,
    /// Selected for crawling.
    pub check: bool,
}

#[derive(Debug, Clone)]
pub struct MediaItem {
    pub id: String,
    pub source: String,
    pub media_type: String,
    pub file_name: String,
    pub file_size: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub seen: bool,
    pub favorite: bool,
    pub user_deleted: bool,
    pub deleted_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelegramMetadata {
    pub media_item_id: String,
    pub channel_id: Option<i64>,
    pub message_id: Option<i64>,
    pub file_id: String,
    pub from_preview: bool,
    pub date: Option<i64>,
    pub text: Option<String>,
    pub url: Option<String>,
}

/// A dedup hit: the stored item matching a (file id, from_preview) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingMedia {
    pub media_item_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub channel_id: Option<i64>,
    pub message_id: Option<i64>,
}

impl ExistingMedia {
    /// Rows ingested before message linkage was tracked have no ids.
    pub fn lacks_linkage(&self) -> bool {
        self.channel_id.is_none() || self.message_id.is_none()
    }
}

/// What `insert_media` did with a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New media item id.
    Inserted(String),
    /// An item with the same (file id, from_preview) was stored first.
    Existing(ExistingMedia),
}

impl InsertOutcome {
    pub fn media_item_id(&self) -> &str {
        match self {
            InsertOutcome::Inserted(id) => id,
            InsertOutcome::Existing(existing) => &existing.media_item_id,
        }
    }
}

/// Everything needed to insert a media item and its metadata row.
#[derive(Debug, Clone)]
pub struct NewMediaRecord {
    pub source: Source,
    pub media_type: MediaKind,
    pub file_name: String,
    pub file_size: i64,
    pub channel_id: i64,
    pub message_id: i64,
    pub file_id: String,
    pub from_preview: bool,
    pub date: i64,
    pub text: String,
}
