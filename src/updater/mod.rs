//! Crawl orchestration: wires channel selection, fetch strategy, queue,
//! backoff and media processing into one run.

mod handler;
mod runner;

pub use handler::IngestHandler;
pub use runner::{RunConfig, RunSummary, Updater};

use crate::channels::ChannelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error(transparent)]
    Channels(#[from] ChannelError),

    #[error("still rate limited after {attempts} attempts; run ended with {summary}")]
    RateLimitExhausted { attempts: u32, summary: RunSummary },
}
