//! Two-stage producer/consumer engine.
//!
//! Channels wait in a FIFO; a single producer walks them one at a time and
//! pushes every message into a shared message queue, which a pool of
//! consumers drains concurrently.

mod manager;

pub use manager::{QueueManager, QueueStats};

use async_trait::async_trait;

use crate::platform::{ChannelInfo, Message};

#[derive(Debug, Clone)]
pub struct QueueItem {
    pub channel: ChannelInfo,
    pub message: Message,
}

/// Work performed on each message popped from the queue.
#[async_trait]
pub trait QueueItemHandler: Send + Sync {
    async fn handle(&self, item: QueueItem) -> anyhow::Result<()>;
}
