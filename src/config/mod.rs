mod file_config;

pub use file_config::{
    BackoffConfig, ChannelsConfig, FetchConfig, FileConfig, QueueConfig, StorageConfig,
    TaggingConfig,
};

use crate::fetch::MessageStrategy;
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PLATFORM_URL: &str = "http://localhost:8090";
pub const DEFAULT_FOLDER_NAME: &str = "MediaView";

/// CLI arguments that can be used for config resolution.
/// Mirrors the CLI flags that TOML config may override.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub media_root: Option<PathBuf>,
    pub orphan_root: Option<PathBuf>,
    pub update_state: Option<PathBuf>,
    pub platform_url: Option<String>,
    pub platform_timeout_sec: u64,
    pub strategy: Option<String>,
    pub limit: Option<usize>,
    pub max_concurrent_tasks: Option<usize>,
    pub slow_mode: bool,
    pub mark_read: bool,
}

/// Immutable configuration built once at startup and handed to every component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub paths: PathSettings,
    pub platform: PlatformSettings,
    pub backoff: BackoffSettings,
    pub queue: QueueSettings,
    pub fetch: FetchSettings,
    pub storage: StorageSettings,
    pub tagging: TaggingSettings,
    pub folder_name: String,
}

#[derive(Debug, Clone)]
pub struct PathSettings {
    pub media_root: PathBuf,
    pub orphan_root: PathBuf,
    /// Where run anomaly logs are written.
    pub update_state: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("./static/media"),
            orphan_root: PathBuf::from("./recyclebin/orphan"),
            update_state: PathBuf::from("./data/update_info"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlatformSettings {
    pub url: String,
    pub timeout_sec: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffSettings {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub slow_mode: bool,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            slow_mode: false,
            min_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub max_concurrent_tasks: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// `None` walks the whole history.
    pub limit: Option<usize>,
    pub strategy: MessageStrategy,
    pub write_message_links: bool,
    pub mark_read: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            limit: Some(100),
            strategy: MessageStrategy::Unread,
            write_message_links: false,
            mark_read: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub max_file_size: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024 * 1024, // 1 GiB
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaggingSettings {
    pub host: String,
    pub port: u16,
    pub cutoff: f64,
    pub timeout_sec: u64,
}

impl TaggingSettings {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for TaggingSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8081,
            cutoff: 0.35,
            timeout_sec: 60,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let path_defaults = PathSettings::default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .unwrap_or_else(|| PathBuf::from("./teledeck.db"));

        let paths = PathSettings {
            media_root: file
                .media_root
                .map(PathBuf::from)
                .or_else(|| cli.media_root.clone())
                .unwrap_or(path_defaults.media_root),
            orphan_root: file
                .orphan_root
                .map(PathBuf::from)
                .or_else(|| cli.orphan_root.clone())
                .unwrap_or(path_defaults.orphan_root),
            update_state: file
                .update_state
                .map(PathBuf::from)
                .or_else(|| cli.update_state.clone())
                .unwrap_or(path_defaults.update_state),
        };
        if roots_overlap(&paths.media_root, &paths.orphan_root) {
            bail!(
                "media_root {:?} and orphan_root {:?} must be disjoint",
                paths.media_root,
                paths.orphan_root
            );
        }

        let platform = PlatformSettings {
            url: file
                .platform_url
                .or_else(|| cli.platform_url.clone())
                .unwrap_or_else(|| DEFAULT_PLATFORM_URL.to_string()),
            timeout_sec: file.platform_timeout_sec.unwrap_or(cli.platform_timeout_sec),
        };

        // Backoff settings - merge file config with defaults
        let backoff_defaults = BackoffSettings::default();
        let backoff_file = file.backoff.unwrap_or_default();
        let backoff = BackoffSettings {
            max_attempts: backoff_file
                .max_attempts
                .unwrap_or(backoff_defaults.max_attempts),
            base_delay: secs_or(backoff_file.base_delay_secs, backoff_defaults.base_delay)?,
            slow_mode: backoff_file.slow_mode.unwrap_or(cli.slow_mode),
            min_delay: secs_or(backoff_file.min_delay_secs, backoff_defaults.min_delay)?,
            max_delay: secs_or(backoff_file.max_delay_secs, backoff_defaults.max_delay)?,
        };
        if backoff.max_attempts == 0 {
            bail!("backoff.max_attempts must be at least 1");
        }
        if backoff.min_delay > backoff.max_delay {
            bail!(
                "backoff delay range is empty: min {:?} > max {:?}",
                backoff.min_delay,
                backoff.max_delay
            );
        }

        let queue_file = file.queue.unwrap_or_default();
        let queue = QueueSettings {
            max_concurrent_tasks: queue_file
                .max_concurrent_tasks
                .or(cli.max_concurrent_tasks)
                .unwrap_or(QueueSettings::default().max_concurrent_tasks),
        };
        if queue.max_concurrent_tasks == 0 {
            bail!("queue.max_concurrent_tasks must be at least 1");
        }

        // Unknown strategy keys fail here, before anything touches the network
        let fetch_defaults = FetchSettings::default();
        let fetch_file = file.fetch.unwrap_or_default();
        let strategy = match fetch_file.strategy.or_else(|| cli.strategy.clone()) {
            Some(key) => key.parse::<MessageStrategy>()?,
            None => fetch_defaults.strategy,
        };
        let limit = match fetch_file.default_limit.or(cli.limit) {
            Some(0) => None,
            Some(limit) => Some(limit),
            None => fetch_defaults.limit,
        };
        let fetch = FetchSettings {
            limit,
            strategy,
            write_message_links: fetch_file
                .write_message_links
                .unwrap_or(fetch_defaults.write_message_links),
            mark_read: fetch_file.mark_read.unwrap_or(cli.mark_read),
        };

        let storage = StorageSettings {
            max_file_size: file
                .storage
                .and_then(|s| s.max_file_size)
                .unwrap_or(StorageSettings::default().max_file_size),
        };

        let tagging_defaults = TaggingSettings::default();
        let tagging_file = file.tagging.unwrap_or_default();
        let tagging = TaggingSettings {
            host: tagging_file.host.unwrap_or(tagging_defaults.host),
            port: tagging_file.port.unwrap_or(tagging_defaults.port),
            cutoff: tagging_file.cutoff.unwrap_or(tagging_defaults.cutoff),
            timeout_sec: tagging_file
                .timeout_sec
                .unwrap_or(tagging_defaults.timeout_sec),
        };

        let folder_name = file
            .channels
            .and_then(|c| c.folder_name)
            .unwrap_or_else(|| DEFAULT_FOLDER_NAME.to_string());

        Ok(Self {
            db_path,
            paths,
            platform,
            backoff,
            queue,
            fetch,
            storage,
            tagging,
            folder_name,
        })
    }
}

fn secs_or(value: Option<f64>, default: Duration) -> Result<Duration> {
    match value {
        Some(secs) if secs.is_finite() && secs >= 0.0 => Ok(Duration::from_secs_f64(secs)),
        Some(secs) => bail!("Invalid delay value: {}", secs),
        None => Ok(default),
    }
}

fn roots_overlap(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}
