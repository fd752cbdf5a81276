//! Pipeline fixtures and message builders
//!
//! `TestPipeline` wires a temp database, temp media roots and a fake bridge
//! into a resolved `AppConfig`, the same way the binary does at startup.

use super::bridge::FakeBridge;
use super::constants::*;
use chrono::{TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use teledeck_updater::channels::ChannelProvider;
use teledeck_updater::config::{AppConfig, BackoffConfig, CliConfig, FileConfig};
use teledeck_updater::platform::{
    ChannelInfo, Document, ForwardInfo, HttpPlatformClient, Message, MessageMedia, Photo, WebPage,
};
use teledeck_updater::progress::NoOpProgress;
use teledeck_updater::store::{MediaStore, SqliteMediaStore};
use teledeck_updater::updater::{RunConfig, RunSummary, Updater, UpdaterError};
use tempfile::TempDir;

/// Everything one end-to-end scenario needs.
///
/// Channel `CHANNEL_ID` exists on the bridge and is on the checklist.
pub struct TestPipeline {
    pub bridge: FakeBridge,
    pub store: Arc<SqliteMediaStore>,
    pub config: AppConfig,
    _dir: TempDir,
}

impl TestPipeline {
    pub async fn spawn() -> Self {
        Self::with_file_config(FileConfig::default()).await
    }

    /// Backoff delays are zeroed unless the file config sets them.
    pub async fn with_file_config(mut file: FileConfig) -> Self {
        let bridge = FakeBridge::spawn().await;
        let channel = bridge.add_channel(CHANNEL_ID, CHANNEL_TITLE);
        let dir = TempDir::new().expect("Failed to create temp dir");

        if file.backoff.is_none() {
            file.backoff = Some(BackoffConfig {
                max_attempts: Some(3),
                base_delay_secs: Some(0.0),
                ..Default::default()
            });
        }
        let cli = CliConfig {
            db_path: Some(dir.path().join("teledeck.db")),
            media_root: Some(dir.path().join("static").join("media")),
            orphan_root: Some(dir.path().join("recyclebin").join("orphan")),
            update_state: Some(dir.path().join("update_info")),
            platform_url: Some(bridge.base_url.clone()),
            platform_timeout_sec: BRIDGE_TIMEOUT_SECS,
            ..Default::default()
        };
        let config = AppConfig::resolve(&cli, Some(file)).expect("Failed to resolve config");

        let store =
            Arc::new(SqliteMediaStore::new(&config.db_path).expect("Failed to open media store"));
        store
            .sync_checklist(&[channel])
            .expect("Failed to seed checklist");

        Self {
            bridge,
            store,
            config,
            _dir: dir,
        }
    }

    /// A fresh updater over the real HTTP client, as `main` builds it.
    pub fn updater(&self) -> Updater {
        let platform = Arc::new(
            HttpPlatformClient::new(self.config.platform.url.clone(), self.config.platform.timeout_sec)
                .expect("Failed to build platform client"),
        );
        Updater::from_config(&self.config, platform, self.store.clone(), Arc::new(NoOpProgress))
    }

    pub async fn run(
        &self,
        provider: ChannelProvider,
        strategy: &str,
    ) -> Result<RunSummary, UpdaterError> {
        let run = RunConfig {
            strategy: strategy.parse().expect("Unknown strategy"),
            limit: self.config.fetch.limit,
            mark_read: self.config.fetch.mark_read,
            description: format!("e2e {}", strategy),
        };
        self.updater().run(provider, run).await
    }

    /// Crawls the checklist.
    pub async fn update(&self, strategy: &str) -> Result<RunSummary, UpdaterError> {
        self.run(ChannelProvider::Checked(Vec::new()), strategy).await
    }

    pub fn media_root(&self) -> &Path {
        &self.config.paths.media_root
    }

    pub fn orphan_root(&self) -> &Path {
        &self.config.paths.orphan_root
    }

    pub fn media_files(&self) -> Vec<String> {
        file_names(self.media_root())
    }

    pub fn orphan_files(&self) -> Vec<String> {
        file_names(self.orphan_root())
    }

    pub fn media_count(&self) -> usize {
        self.store.count_media_items().expect("Failed to count media items")
    }

    /// All anomaly entries written so far, across run logs.
    pub fn anomalies(&self) -> Vec<serde_json::Value> {
        let mut entries = Vec::new();
        for path in files_in(&self.config.paths.update_state) {
            let content = std::fs::read_to_string(&path).expect("Failed to read anomaly log");
            let batch: Vec<serde_json::Value> =
                serde_json::from_str(&content).expect("Anomaly log is not a JSON array");
            entries.extend(batch);
        }
        entries
    }

    pub fn anomaly_kinds(&self) -> Vec<String> {
        self.anomalies()
            .iter()
            .filter_map(|entry| entry["kind"].as_str().map(str::to_string))
            .collect()
    }
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    paths
}

fn file_names(dir: &Path) -> Vec<String> {
    files_in(dir)
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect()
}

fn base_message(channel_id: i64, id: i64) -> Message {
    Message {
        id,
        channel_id,
        date: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
        text: format!("message {}", id),
        media: None,
        forward: None,
        has_url: false,
    }
}

fn document(file_id: &str, size: u64, mime: &str) -> Document {
    Document {
        file_id: file_id.to_string(),
        size,
        mime_type: Some(mime.to_string()),
        file_name: None,
        sticker_set: None,
    }
}

pub fn text_message(channel_id: i64, id: i64) -> Message {
    base_message(channel_id, id)
}

pub fn document_message(channel_id: i64, id: i64, file_id: &str, size: u64, mime: &str) -> Message {
    Message {
        media: Some(MessageMedia::Document(document(file_id, size, mime))),
        ..base_message(channel_id, id)
    }
}

pub fn photo_message(channel_id: i64, id: i64, file_id: &str, size: u64) -> Message {
    Message {
        media: Some(MessageMedia::Photo(Photo {
            file_id: file_id.to_string(),
            size,
        })),
        ..base_message(channel_id, id)
    }
}

/// A link preview carrying an mp4, as video hosts embed them.
pub fn preview_message(channel_id: i64, id: i64, file_id: &str, size: u64) -> Message {
    Message {
        media: Some(MessageMedia::WebPage(WebPage {
            url: format!("https://example.com/v/{}", file_id),
            document: Some(document(file_id, size, "video/mp4")),
        })),
        has_url: true,
        ..base_message(channel_id, id)
    }
}

pub fn forward_message(channel_id: i64, id: i64, source: ChannelInfo) -> Message {
    Message {
        forward: Some(ForwardInfo {
            channel: Some(source),
        }),
        ..base_message(channel_id, id)
    }
}
