use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::backoff::{BackoffError, BackoffManager};
use crate::media::MediaProcessor;
use crate::platform::PlatformClient;
use crate::queue::{QueueItem, QueueItemHandler};
use crate::run_log::AnomalyLog;

/// Consumer-side work for one queue item: processing under backoff, then
/// the read acknowledgement.
pub struct IngestHandler {
    processor: Arc<MediaProcessor>,
    backoff: BackoffManager,
    platform: Arc<dyn PlatformClient>,
    anomalies: Arc<AnomalyLog>,
    mark_read: bool,
    rate_limited: AtomicBool,
}

impl IngestHandler {
    pub fn new(
        processor: Arc<MediaProcessor>,
        backoff: BackoffManager,
        platform: Arc<dyn PlatformClient>,
        anomalies: Arc<AnomalyLog>,
        mark_read: bool,
    ) -> Self {
        Self {
            processor,
            backoff,
            platform,
            anomalies,
            mark_read,
            rate_limited: AtomicBool::new(false),
        }
    }

    /// True once any item ran out of attempts against the rate limiter.
    pub fn rate_limit_exhausted(&self) -> bool {
        self.rate_limited.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueItemHandler for IngestHandler {
    async fn handle(&self, item: QueueItem) -> anyhow::Result<()> {
        let QueueItem { channel, message } = item;
        let label = format!("{}#{}", channel.title, message.id);

        let result = self
            .backoff
            .execute(&label, || self.processor.process(&channel, &message))
            .await;

        match result {
            Ok(outcome) => {
                debug!(message_id = message.id, ?outcome, "processed");
                if self.mark_read {
                    if let Err(e) = self.platform.mark_read(&channel, message.id).await {
                        warn!(message_id = message.id, error = %e, "failed to mark message read");
                    }
                }
                Ok(())
            }
            Err(BackoffError::Exhausted { attempts, last }) => {
                self.rate_limited.store(true, Ordering::SeqCst);
                self.anomalies.record(
                    "rate_limit_exhausted",
                    json!({
                        "channel": channel.title,
                        "message_id": message.id,
                        "attempts": attempts,
                        "error": last.to_string(),
                    }),
                );
                Err(anyhow!(last).context(format!("gave up on {} after {} attempts", label, attempts)))
            }
            Err(BackoffError::Fatal(e)) => {
                error!(
                    message_id = message.id,
                    channel = %channel.title,
                    error = %e,
                    "failed to process message"
                );
                self.anomalies.record(
                    "processing_failure",
                    json!({
                        "channel": channel.title,
                        "message_id": message.id,
                        "error": e.to_string(),
                    }),
                );
                Err(e.into())
            }
        }
    }
}
