use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::{TaggingClient, TaggingError};
use crate::store::MediaStore;

/// How images reach the tagging service.
#[derive(Debug, Clone)]
pub enum TagSource {
    /// Service fetches `{base_url}/media/{file_name}` itself.
    PublicUrl(String),
    /// Files are read from the media root and uploaded.
    Upload(PathBuf),
}

#[derive(Debug, Clone)]
pub struct TagJobConfig {
    pub source: TagSource,
    pub cutoff: f64,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagJobSummary {
    pub tagged: usize,
    pub invalid: usize,
    pub failed: usize,
}

/// Tags photo and image items that have no tags yet.
pub async fn tag_untagged_images(
    store: &dyn MediaStore,
    client: &dyn TaggingClient,
    config: &TagJobConfig,
) -> Result<TagJobSummary> {
    let items = store
        .untagged_still_images(config.limit)
        .context("Failed to list untagged images")?;
    info!("{} untagged images to process", items.len());

    let mut summary = TagJobSummary::default();
    for item in items {
        let result = match &config.source {
            TagSource::PublicUrl(base) => {
                let url = format!(
                    "{}/media/{}",
                    base.trim_end_matches('/'),
                    urlencoding::encode(&item.file_name)
                );
                client.tag_url(&url, config.cutoff).await
            }
            TagSource::Upload(media_root) => {
                let path = media_root.join(&item.file_name);
                match tokio::fs::read(&path).await {
                    Ok(bytes) => client.tag_bytes(&item.file_name, bytes, config.cutoff).await,
                    Err(e) => {
                        warn!("cannot read {:?}: {}", path, e);
                        summary.failed += 1;
                        continue;
                    }
                }
            }
        };

        match result {
            Ok(predictions) => {
                let tags: Vec<(String, f64)> = predictions
                    .into_iter()
                    .map(|p| (p.tag, p.weight))
                    .collect();
                store
                    .save_tags(&item.id, &tags)
                    .with_context(|| format!("Failed to save tags for {}", item.id))?;
                info!("Tagged {} with {} tags", item.file_name, tags.len());
                summary.tagged += 1;
            }
            Err(TaggingError::InvalidInput(reason)) => {
                warn!("Skipping {}: {}", item.file_name, reason);
                summary.invalid += 1;
            }
            Err(e) => {
                warn!("Tagging {} failed: {}", item.file_name, e);
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}
