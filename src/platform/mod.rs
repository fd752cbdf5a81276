//! Messaging platform boundary.
//!
//! The pipeline only talks to the platform through [`PlatformClient`]. The
//! crate ships [`HttpPlatformClient`], which speaks JSON to a local bridge
//! process holding the actual platform session.

mod http_client;
mod models;

pub use http_client::HttpPlatformClient;
pub use models::*;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::progress::ProgressReporter;

pub type MessageStream = BoxStream<'static, Result<Message, PlatformError>>;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// The platform asked us to slow down.
    #[error("flood wait: retry after {0:?}")]
    FloodWait(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected platform response: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlatformError {
    /// Flood waits and network hiccups are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlatformError::FloodWait(_) | PlatformError::Network(_))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PlatformError::FloodWait(wait) => Some(*wait),
            _ => None,
        }
    }
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Walks a channel's history. Dropping the stream releases the cursor.
    fn iter_messages(&self, channel: &ChannelInfo, query: MessageQuery) -> MessageStream;

    async fn get_channel(&self, channel_id: i64) -> Result<ChannelInfo, PlatformError>;

    /// Channel dialogs currently open in the session, in platform order.
    async fn dialogs(&self) -> Result<Vec<ChannelInfo>, PlatformError>;

    async fn dialog_folders(&self) -> Result<Vec<DialogFolder>, PlatformError>;

    async fn unread_count(&self, channel: &ChannelInfo) -> Result<u64, PlatformError>;

    async fn export_message_link(
        &self,
        channel: &ChannelInfo,
        message_id: i64,
    ) -> Result<String, PlatformError>;

    /// Downloads the payload behind `locator` to `dest`.
    ///
    /// Returns the final local path, or `None` when the platform produced
    /// nothing.
    async fn download_media(
        &self,
        locator: &ContentLocator,
        dest: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<Option<PathBuf>, PlatformError>;

    async fn mark_read(&self, channel: &ChannelInfo, message_id: i64)
        -> Result<(), PlatformError>;
}
