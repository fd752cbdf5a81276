use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use super::models::UNKNOWN_MIME;
use super::{
    classify, Downloadable, DownloadItem, MediaError, MediaFiles, ProcessOutcome, ResolvedMedia,
    SkipReason,
};
use crate::platform::{ChannelInfo, Message, PlatformClient};
use crate::progress::ProgressReporter;
use crate::run_log::AnomalyLog;
use crate::store::{ExistingMedia, InsertOutcome, MediaStore, NewMediaRecord, Source};

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub max_file_size: u64,
    /// Export and record the deep link of messages rejected for size.
    pub write_message_links: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1 << 30,
            write_message_links: false,
        }
    }
}

pub struct MediaProcessor {
    platform: Arc<dyn PlatformClient>,
    store: Arc<dyn MediaStore>,
    files: MediaFiles,
    anomalies: Arc<AnomalyLog>,
    progress: Arc<dyn ProgressReporter>,
    config: ProcessingConfig,
}

impl MediaProcessor {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        store: Arc<dyn MediaStore>,
        files: MediaFiles,
        anomalies: Arc<AnomalyLog>,
        progress: Arc<dyn ProgressReporter>,
        config: ProcessingConfig,
    ) -> Self {
        Self {
            platform,
            store,
            files,
            anomalies,
            progress,
            config,
        }
    }

    pub fn files(&self) -> &MediaFiles {
        &self.files
    }

    /// Runs one message through forward registration, extraction, dedup,
    /// download, classification and persistence.
    pub async fn process(
        &self,
        channel: &ChannelInfo,
        message: &Message,
    ) -> Result<ProcessOutcome, MediaError> {
        self.process_forward(message);

        let candidate = match self.extract(channel, message).await {
            Ok(candidate) => candidate,
            Err(reason) => return Ok(ProcessOutcome::Skipped(reason)),
        };
        let resolved = candidate.resolve(message)?;

        if let Some(outcome) = self.check_existing(&resolved)? {
            return Ok(outcome);
        }

        let item = self.download(&resolved, message).await?;
        let outcome = self.persist(item, message).await?;

        if let ProcessOutcome::Ingested(item) = &outcome {
            info!(
                channel = %channel.title,
                message_id = message.id,
                "Ingested {} ({} bytes, {})",
                item.file_name,
                item.file_size,
                item.media_type.as_str()
            );
        }
        Ok(outcome)
    }

    /// Registers the source channel of a forwarded message. Returns true when
    /// the channel was new. Failures are logged and never abort processing.
    pub fn process_forward(&self, message: &Message) -> bool {
        let Some(source) = message.forward.as_ref().and_then(|f| f.channel.as_ref()) else {
            return false;
        };
        match self.store.add_channel_if_not_exists(source) {
            Ok(true) => {
                info!("Discovered channel {} ({}) via forward", source.title, source.id);
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(
                    message_id = message.id,
                    error = %format!("{:#}", e),
                    "failed to register forward source"
                );
                false
            }
        }
    }

    async fn extract(
        &self,
        channel: &ChannelInfo,
        message: &Message,
    ) -> Result<Downloadable, SkipReason> {
        let Some(candidate) = Downloadable::from_message(message) else {
            debug!(message_id = message.id, "no media");
            return Err(SkipReason::NoMedia);
        };

        let size = candidate.declared_size();
        if size > self.config.max_file_size {
            warn!(
                channel = %channel.title,
                message_id = message.id,
                size,
                "skipping file above {} bytes",
                self.config.max_file_size
            );
            if self.config.write_message_links {
                self.record_large_file(channel, message, size).await;
            }
            return Err(SkipReason::Oversized);
        }

        if let Some(set) = candidate.sticker_set() {
            debug!(message_id = message.id, sticker_set = set, "skipping sticker");
            return Err(SkipReason::Sticker);
        }

        Ok(candidate)
    }

    async fn record_large_file(&self, channel: &ChannelInfo, message: &Message, size: u64) {
        match self.platform.export_message_link(channel, message.id).await {
            Ok(link) => {
                info!("Large file: {}", link);
                self.anomalies.record(
                    "large_file",
                    json!({
                        "link": link,
                        "channel_id": channel.id,
                        "message_id": message.id,
                        "size": size,
                    }),
                );
            }
            Err(e) => warn!(message_id = message.id, error = %e, "failed to export message link"),
        }
    }

    fn check_existing(&self, media: &ResolvedMedia) -> Result<Option<ProcessOutcome>, MediaError> {
        let Some(existing) = self
            .store
            .find_existing(&media.file_id, media.from_preview)
            .map_err(MediaError::Store)?
        else {
            return Ok(None);
        };

        let observed = media.size as i64;
        if existing.file_size != observed {
            return Err(self.size_mismatch(&existing, &media.file_id, media.from_preview, observed));
        }

        if existing.lacks_linkage() {
            self.store
                .patch_linkage(
                    &existing.media_item_id,
                    media.locator.channel_id,
                    media.locator.message_id,
                )
                .map_err(MediaError::Store)?;
            info!("Linked legacy item {} to its message", existing.media_item_id);
            return Ok(Some(ProcessOutcome::Patched {
                media_item_id: existing.media_item_id,
            }));
        }

        debug!(file_id = %media.file_id, "already ingested");
        Ok(Some(ProcessOutcome::AlreadyPresent {
            media_item_id: existing.media_item_id,
        }))
    }

    fn size_mismatch(
        &self,
        existing: &ExistingMedia,
        file_id: &str,
        from_preview: bool,
        observed: i64,
    ) -> MediaError {
        self.anomalies.record(
            "size_mismatch",
            json!({
                "media_item_id": existing.media_item_id,
                "file_id": file_id,
                "from_preview": from_preview,
                "recorded": existing.file_size,
                "observed": observed,
            }),
        );
        MediaError::Integrity {
            file_id: file_id.to_string(),
            recorded: existing.file_size,
            observed,
        }
    }

    async fn download(
        &self,
        media: &ResolvedMedia,
        message: &Message,
    ) -> Result<DownloadItem, MediaError> {
        self.files.ensure_dirs().await?;
        let file_name = self.files.file_name_for(media);
        let dest = self.files.media_path(&file_name);

        let Some(path) = self
            .platform
            .download_media(&media.locator, &dest, self.progress.as_ref())
            .await?
        else {
            return Err(MediaError::Download(format!(
                "{} (channel {}, message {}, preview {})",
                media.file_id, media.locator.channel_id, media.locator.message_id, media.from_preview
            )));
        };

        let file_size = tokio::fs::metadata(&path).await?.len();
        if media.size > 0 && file_size != media.size {
            warn!(
                file_id = %media.file_id,
                "downloaded {} bytes, platform advertised {}",
                file_size,
                media.size
            );
        }

        let mime_type = media
            .mime_type
            .clone()
            .unwrap_or_else(|| UNKNOWN_MIME.to_string());
        let media_type = classify(&mime_type, message);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(file_name);

        Ok(DownloadItem {
            locator: media.locator.clone(),
            file_id: media.file_id.clone(),
            from_preview: media.from_preview,
            mime_type,
            media_type,
            file_name,
            file_size,
        })
    }

    async fn persist(
        &self,
        item: DownloadItem,
        message: &Message,
    ) -> Result<ProcessOutcome, MediaError> {
        let record = NewMediaRecord {
            source: Source::Telegram,
            media_type: item.media_type,
            file_name: item.file_name.clone(),
            file_size: item.file_size as i64,
            channel_id: item.locator.channel_id,
            message_id: item.locator.message_id,
            file_id: item.file_id.clone(),
            from_preview: item.from_preview,
            date: message.date.timestamp(),
            text: message.text.clone(),
        };

        let cause = match self.store.insert_media(&record) {
            Ok(InsertOutcome::Inserted(_)) => return Ok(ProcessOutcome::Ingested(item)),
            Ok(InsertOutcome::Existing(existing)) => {
                return self.discard_duplicate(&item, existing).await
            }
            Err(e) => e,
        };

        if let Err(move_err) = self.files.quarantine(&item.file_name).await {
            warn!("failed to quarantine {}: {}", item.file_name, move_err);
        }
        self.anomalies.record(
            "persistence_failure",
            json!({
                "file_name": item.file_name,
                "file_id": item.file_id,
                "error": format!("{:#}", cause),
            }),
        );
        Err(MediaError::Persistence {
            file_name: item.file_name,
            cause,
        })
    }

    /// Another consumer stored the same content while this one was
    /// downloading. The extra copy is deleted unless it is the stored file.
    async fn discard_duplicate(
        &self,
        item: &DownloadItem,
        existing: ExistingMedia,
    ) -> Result<ProcessOutcome, MediaError> {
        if existing.file_name != item.file_name {
            if let Err(e) = self.files.remove(&item.file_name).await {
                warn!("failed to remove duplicate {}: {}", item.file_name, e);
            }
        }

        let observed = item.file_size as i64;
        if existing.file_size != observed {
            return Err(self.size_mismatch(&existing, &item.file_id, item.from_preview, observed));
        }
        debug!(file_id = %item.file_id, "stored concurrently, dropped second copy");
        Ok(ProcessOutcome::AlreadyPresent {
            media_item_id: existing.media_item_id,
        })
    }
}
