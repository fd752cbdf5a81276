use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub media_root: Option<String>,
    pub orphan_root: Option<String>,
    pub update_state: Option<String>,
    pub platform_url: Option<String>,
    pub platform_timeout_sec: Option<u64>,

    // Feature configs
    pub backoff: Option<BackoffConfig>,
    pub queue: Option<QueueConfig>,
    pub fetch: Option<FetchConfig>,
    pub storage: Option<StorageConfig>,
    pub tagging: Option<TaggingConfig>,
    pub channels: Option<ChannelsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BackoffConfig {
    pub max_attempts: Option<u32>,
    pub base_delay_secs: Option<f64>,
    pub slow_mode: Option<bool>,
    pub min_delay_secs: Option<f64>,
    pub max_delay_secs: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct QueueConfig {
    pub max_concurrent_tasks: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct FetchConfig {
    /// 0 means no limit.
    pub default_limit: Option<usize>,
    /// One of "all", "db", "oldest", "before", "urls", "videos", "unread"
    pub strategy: Option<String>,
    pub write_message_links: Option<bool>,
    pub mark_read: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub max_file_size: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct TaggingConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cutoff: Option<f64>,
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ChannelsConfig {
    pub folder_name: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
