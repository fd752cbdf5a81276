use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::{IngestHandler, UpdaterError};
use crate::backoff::BackoffManager;
use crate::channels::{ChannelManager, ChannelProvider};
use crate::config::AppConfig;
use crate::fetch::{MessageFetcher, MessageStrategy};
use crate::media::{MediaFiles, MediaProcessor, ProcessingConfig};
use crate::platform::PlatformClient;
use crate::progress::ProgressReporter;
use crate::queue::QueueManager;
use crate::run_log::AnomalyLog;
use crate::store::MediaStore;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub strategy: MessageStrategy,
    pub limit: Option<usize>,
    /// Acknowledge each message after it was handled successfully.
    pub mark_read: bool,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub description: String,
    pub channels: usize,
    /// Messages enqueued by the producer.
    pub found: usize,
    pub processed: usize,
    pub failed: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} channels, {} messages found, {} processed, {} failed",
            self.description, self.channels, self.found, self.processed, self.failed
        )
    }
}

pub struct Updater {
    platform: Arc<dyn PlatformClient>,
    store: Arc<dyn MediaStore>,
    processor: Arc<MediaProcessor>,
    channels: ChannelManager,
    backoff: BackoffManager,
    anomalies: Arc<AnomalyLog>,
    consumers: usize,
}

impl Updater {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        store: Arc<dyn MediaStore>,
        processor: Arc<MediaProcessor>,
        backoff: BackoffManager,
        anomalies: Arc<AnomalyLog>,
        consumers: usize,
    ) -> Self {
        let channels = ChannelManager::new(platform.clone(), store.clone(), anomalies.clone());
        Self {
            platform,
            store,
            processor,
            channels,
            backoff,
            anomalies,
            consumers: consumers.max(1),
        }
    }

    /// Builds the whole pipeline from resolved configuration.
    pub fn from_config(
        config: &AppConfig,
        platform: Arc<dyn PlatformClient>,
        store: Arc<dyn MediaStore>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        let anomalies = Arc::new(AnomalyLog::new(&config.paths.update_state));
        let processor = Arc::new(MediaProcessor::new(
            platform.clone(),
            store.clone(),
            MediaFiles::new(&config.paths.media_root, &config.paths.orphan_root),
            anomalies.clone(),
            progress,
            ProcessingConfig {
                max_file_size: config.storage.max_file_size,
                write_message_links: config.fetch.write_message_links,
            },
        ));
        Self::new(
            platform,
            store,
            processor,
            BackoffManager::with_tokio(&config.backoff),
            anomalies,
            config.queue.max_concurrent_tasks,
        )
    }

    pub fn channels(&self) -> &ChannelManager {
        &self.channels
    }

    pub fn processor(&self) -> &Arc<MediaProcessor> {
        &self.processor
    }

    pub fn anomalies(&self) -> &Arc<AnomalyLog> {
        &self.anomalies
    }

    /// One full crawl. Channel lookups fail before any work starts; item
    /// failures are counted, and only rate-limit exhaustion fails the run,
    /// after the queue has drained and the anomaly log was flushed.
    pub async fn run(
        &self,
        provider: ChannelProvider,
        run: RunConfig,
    ) -> Result<RunSummary, UpdaterError> {
        let started = Instant::now();
        info!(
            "Starting {} ({}, strategy {}, limit {:?})",
            run.description,
            provider.describe(),
            run.strategy,
            run.limit
        );
        let channels = self.channels.resolve(provider).await?;

        let queue = QueueManager::new();
        let channel_count = queue.queue_channels(channels).await;

        let handler = Arc::new(IngestHandler::new(
            self.processor.clone(),
            self.backoff.clone(),
            self.platform.clone(),
            self.anomalies.clone(),
            run.mark_read,
        ));
        queue.spawn_consumers(self.consumers, handler.clone());

        let fetcher = MessageFetcher::new(
            self.platform.clone(),
            self.store.clone(),
            run.strategy,
            run.limit,
        );
        let found = queue.process_channel_queue(&fetcher).await;
        info!("Producer done, {} messages queued", found);

        queue.wait().await;
        queue.finish().await;

        let stats = queue.stats();
        let summary = RunSummary {
            description: run.description,
            channels: channel_count,
            found,
            processed: stats.processed,
            failed: stats.failed,
        };

        match self.anomalies.flush() {
            Ok(Some(path)) => info!("Anomalies written to {:?}", path),
            Ok(None) => {}
            Err(e) => warn!("Failed to write anomaly log: {:#}", e),
        }
        info!("Finished in {:.1?}: {}", started.elapsed(), summary);

        if handler.rate_limit_exhausted() {
            return Err(UpdaterError::RateLimitExhausted {
                attempts: self.backoff.max_attempts(),
                summary,
            });
        }
        Ok(summary)
    }
}
