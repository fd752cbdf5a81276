//! Channel selection and lookup.

mod manager;

pub use manager::{ChannelFilter, ChannelManager, ChannelProvider, ChannelStream};

use crate::platform::PlatformError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("no dialog title contains '{0}'")]
    NotFound(String),

    #[error("folder '{0}' not found")]
    FolderNotFound(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("store error: {0:#}")]
    Store(anyhow::Error),
}
