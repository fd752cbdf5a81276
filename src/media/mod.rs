//! Media extraction, deduplication, download and persistence for one message.

mod files;
mod models;
mod processor;

pub use files::{sanitize_filename, MediaFiles};
pub use models::{classify, Downloadable, DownloadItem, ProcessOutcome, ResolvedMedia, SkipReason};
pub use processor::{MediaProcessor, ProcessingConfig};

use crate::backoff::Retryable;
use crate::platform::PlatformError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("message {0} carries media that cannot be downloaded")]
    Unresolvable(i64),

    /// Size recorded at first ingest disagrees with what the platform reports now.
    #[error("size mismatch for {file_id}: recorded {recorded} bytes, observed {observed}")]
    Integrity {
        file_id: String,
        recorded: i64,
        observed: i64,
    },

    #[error("download produced no file: {0}")]
    Download(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("failed to persist {file_name}, file moved to orphans: {cause:#}")]
    Persistence {
        file_name: String,
        cause: anyhow::Error,
    },

    #[error("store error: {0:#}")]
    Store(anyhow::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Retryable for MediaError {
    fn is_retryable(&self) -> bool {
        match self {
            MediaError::Platform(e) => e.is_retryable(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            MediaError::Platform(e) => e.retry_after(),
            _ => None,
        }
    }
}
