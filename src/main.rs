use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use teledeck_updater::admin;
use teledeck_updater::channels::ChannelProvider;
use teledeck_updater::config::{AppConfig, CliConfig, FileConfig};
use teledeck_updater::media::MediaFiles;
use teledeck_updater::platform::{HttpPlatformClient, PlatformClient};
use teledeck_updater::progress::{ConsoleProgress, ProgressReporter, TracingProgress};
use teledeck_updater::store::{MediaStore, SqliteMediaStore};
use teledeck_updater::tagging::{
    tag_untagged_images, HttpTaggingClient, TagJobConfig, TagSource, TaggingClient,
};
use teledeck_updater::updater::{RunConfig, Updater};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[clap(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
struct CliArgs {
    /// Path to a TOML config file. Values in it override the flags below.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite media database.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Directory downloaded media is written to.
    #[clap(long, value_parser = parse_path)]
    pub media_root: Option<PathBuf>,

    /// Directory untracked or unpersistable files are moved to.
    #[clap(long, value_parser = parse_path)]
    pub orphan_root: Option<PathBuf>,

    /// Directory for per-run anomaly logs.
    #[clap(long, value_parser = parse_path)]
    pub update_state: Option<PathBuf>,

    /// Base URL of the platform bridge.
    #[clap(long)]
    pub platform_url: Option<String>,

    /// Timeout in seconds for platform bridge requests.
    #[clap(long, default_value_t = 300)]
    pub platform_timeout_sec: u64,

    /// Message strategy: all, oldest, db, before, urls, videos or unread.
    #[clap(long)]
    pub strategy: Option<String>,

    /// Maximum messages per channel. 0 means unbounded.
    #[clap(long)]
    pub limit: Option<usize>,

    /// Number of concurrent consumers.
    #[clap(long)]
    pub max_concurrent_tasks: Option<usize>,

    /// Randomize the delay before each platform operation.
    #[clap(long)]
    pub slow_mode: bool,

    /// Mark messages read once they are processed.
    #[clap(long)]
    pub mark_read: bool,

    /// Draw terminal progress bars for downloads.
    #[clap(long)]
    pub progress: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl every checked channel.
    Update,
    /// Crawl the first open dialog whose title contains NAME.
    Channel { name: String },
    /// Crawl the members of a folder.
    Folder { name: Option<String> },
    /// Replace the checklist with the members of a folder.
    SyncFolder { name: Option<String> },
    /// Register the source channels of forwards found in a chat.
    Forwards { chat: String },
    /// Move files no media item references to the orphan root.
    FindOrphans,
    /// Tag photos and images that have no tags yet.
    Tag {
        /// Maximum items to tag in this run.
        #[clap(long, default_value_t = 500)]
        limit: usize,
        /// Let the service fetch images from this public base URL instead
        /// of uploading them.
        #[clap(long)]
        public_url: Option<String>,
    },
    /// Print the aesthetic score of an image URL.
    Score { image_url: String },
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            media_root: self.media_root.clone(),
            orphan_root: self.orphan_root.clone(),
            update_state: self.update_state.clone(),
            platform_url: self.platform_url.clone(),
            platform_timeout_sec: self.platform_timeout_sec,
            strategy: self.strategy.clone(),
            limit: self.limit,
            max_concurrent_tasks: self.max_concurrent_tasks,
            slow_mode: self.slow_mode,
            mark_read: self.mark_read,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialise logging")?;

    info!("teledeck-updater {} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"));

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Opening media database at {:?}...", config.db_path);
    let store: Arc<dyn MediaStore> = Arc::new(SqliteMediaStore::new(&config.db_path)?);

    match cli_args.command {
        Command::FindOrphans => {
            let files = MediaFiles::new(&config.paths.media_root, &config.paths.orphan_root);
            let moved = admin::find_orphans(store.as_ref(), &files).await?;
            println!("Moved {} orphaned files", moved.len());
            return Ok(());
        }
        Command::Tag { limit, public_url } => {
            let client = HttpTaggingClient::new(config.tagging.base_url(), config.tagging.timeout_sec)?;
            let source = match public_url {
                Some(url) => TagSource::PublicUrl(url),
                None => TagSource::Upload(config.paths.media_root.clone()),
            };
            let summary = tag_untagged_images(
                store.as_ref(),
                &client,
                &TagJobConfig {
                    source,
                    cutoff: config.tagging.cutoff,
                    limit,
                },
            )
            .await?;
            println!(
                "Tagged {}, skipped {} invalid, {} failed",
                summary.tagged, summary.invalid, summary.failed
            );
            return Ok(());
        }
        Command::Score { image_url } => {
            let client = HttpTaggingClient::new(config.tagging.base_url(), config.tagging.timeout_sec)?;
            let score = client.score_url(&image_url).await?;
            println!("{:.3} ({})", score.score, score.backend);
            return Ok(());
        }
        _ => {}
    }

    let platform: Arc<dyn PlatformClient> = Arc::new(HttpPlatformClient::new(
        config.platform.url.clone(),
        config.platform.timeout_sec,
    )?);
    let progress: Arc<dyn ProgressReporter> = if cli_args.progress {
        Arc::new(ConsoleProgress::new())
    } else {
        Arc::new(TracingProgress)
    };
    let updater = Updater::from_config(&config, platform.clone(), store, progress);

    let provider = match cli_args.command {
        Command::Update => ChannelProvider::Checked(Vec::new()),
        Command::Channel { name } => ChannelProvider::ByName(name),
        Command::Folder { name } => {
            ChannelProvider::Folder(name.unwrap_or_else(|| config.folder_name.clone()))
        }
        Command::SyncFolder { name } => {
            let folder = name.unwrap_or_else(|| config.folder_name.clone());
            let members = admin::sync_folder(updater.channels(), &folder).await?;
            println!("Checklist now holds {} channels from '{}'", members.len(), folder);
            return Ok(());
        }
        Command::Forwards { chat } => {
            let summary =
                admin::harvest_forwards(platform.as_ref(), updater.processor(), &chat).await?;
            println!(
                "Scanned {} messages, registered {} new channels",
                summary.scanned, summary.registered
            );
            return Ok(());
        }
        Command::FindOrphans | Command::Tag { .. } | Command::Score { .. } => unreachable!(),
    };

    let description = provider.describe();
    let summary = updater
        .run(
            provider,
            RunConfig {
                strategy: config.fetch.strategy,
                limit: config.fetch.limit,
                mark_read: config.fetch.mark_read,
                description,
            },
        )
        .await?;
    println!("{}", summary);
    Ok(())
}
