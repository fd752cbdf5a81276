//! Message fetch strategies.

mod fetcher;
mod strategy;

pub use fetcher::MessageFetcher;
pub use strategy::MessageStrategy;

use crate::platform::PlatformError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(
        "unknown message strategy '{0}', expected one of: all, db, oldest, before, urls, videos, unread"
    )]
    UnknownStrategy(String),

    #[error("message strategy '{0}' is not implemented")]
    Unimplemented(&'static str),

    #[error("failed to read watermark: {0:#}")]
    Store(anyhow::Error),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}
