//! One-off maintenance commands that sit next to the crawl.

use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use futures::StreamExt;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::channels::{ChannelError, ChannelManager};
use crate::media::{MediaFiles, MediaProcessor};
use crate::platform::{ChannelInfo, MessageQuery, PlatformClient};
use crate::store::MediaStore;

/// How far back forward harvesting looks in a chat.
pub const FORWARD_SCAN_LIMIT: usize = 5000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    pub scanned: usize,
    pub registered: usize,
}

/// Walks the newest messages of the dialog titled exactly `chat_name` and
/// registers every channel that messages were forwarded from.
pub async fn harvest_forwards(
    platform: &dyn PlatformClient,
    processor: &MediaProcessor,
    chat_name: &str,
) -> Result<HarvestSummary, ChannelError> {
    let chat = platform
        .dialogs()
        .await?
        .into_iter()
        .find(|dialog| dialog.title == chat_name)
        .ok_or_else(|| ChannelError::NotFound(chat_name.to_string()))?;

    let query = MessageQuery {
        limit: Some(FORWARD_SCAN_LIMIT),
        ..Default::default()
    };
    let mut messages = platform.iter_messages(&chat, query);
    let mut summary = HarvestSummary::default();
    while let Some(message) = messages.next().await {
        match message {
            Ok(message) => {
                summary.scanned += 1;
                if processor.process_forward(&message) {
                    summary.registered += 1;
                }
            }
            Err(e) => {
                warn!("Stopped scanning {} after {} messages: {}", chat.title, summary.scanned, e);
                break;
            }
        }
    }
    info!(
        "Scanned {} messages in {}, {} new channels",
        summary.scanned, chat.title, summary.registered
    );
    Ok(summary)
}

/// Makes the checklist exactly the members of `folder_name`.
pub async fn sync_folder(
    channels: &ChannelManager,
    folder_name: &str,
) -> Result<Vec<ChannelInfo>, ChannelError> {
    let members = channels.channels_in_folder(folder_name).await?;
    for (n, channel) in members.iter().enumerate() {
        info!("{}: {}", n, channel.title);
    }
    channels.sync_checklist(&members)?;
    Ok(members)
}

/// Moves files directly under the media root that no media item references
/// into the orphan root. Subdirectories are left alone, and a file whose name
/// is already taken in the orphan root stays where it is. Returns the moved
/// paths.
pub async fn find_orphans(store: &dyn MediaStore, files: &MediaFiles) -> Result<Vec<PathBuf>> {
    let mut untracked = Vec::new();
    for entry in WalkDir::new(files.media_root()).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", files.media_root()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let tracked = store.is_file_tracked(&entry.file_name().to_string_lossy())?;
        if !tracked {
            untracked.push(entry.into_path());
        }
    }

    let mut moved = Vec::with_capacity(untracked.len());
    for path in untracked {
        match files.move_to_orphans(&path).await {
            Ok(dest) => moved.push(dest),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!("Not moving {:?}: {}", path, e);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to move {:?} to orphans", path))
            }
        }
    }
    info!("Moved {} orphaned files", moved.len());
    Ok(moved)
}
