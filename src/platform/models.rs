//! Value types exchanged with the messaging platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A channel as the platform reports it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: i64,
    pub title: String,
}

impl ChannelInfo {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

/// A named dialog filter ("folder") and the peers it contains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogFolder {
    pub title: String,
    pub peers: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub channel_id: i64,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub media: Option<MessageMedia>,
    #[serde(default)]
    pub forward: Option<ForwardInfo>,
    /// True if any entity in the text is a URL.
    #[serde(default)]
    pub has_url: bool,
}

/// Where a forwarded message came from. `channel` is set only when the
/// original sender was a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardInfo {
    pub channel: Option<ChannelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageMedia {
    Document(Document),
    Photo(Photo),
    WebPage(WebPage),
    /// Media kinds with nothing to download (polls, locations, contacts...).
    Unsupported { description: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub size: u64,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
    /// Set when the document belongs to a sticker set.
    #[serde(default)]
    pub sticker_set: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub file_id: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebPage {
    pub url: String,
    pub document: Option<Document>,
}

/// Canonical reference used to fetch a media payload, whatever shape the
/// message carried it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentLocator {
    pub channel_id: i64,
    pub message_id: i64,
    pub file_id: String,
    pub from_preview: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFilter {
    Url,
    Video,
}

/// Parameters for a history walk. Messages come newest-first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageQuery {
    pub limit: Option<usize>,
    /// Only messages with an id strictly greater than this.
    pub min_id: Option<i64>,
    /// Only messages with an id strictly lower than this.
    pub offset_id: Option<i64>,
    pub filter: Option<MessageFilter>,
}
