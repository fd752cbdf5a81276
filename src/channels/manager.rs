use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::json;
use tracing::{info, warn};

use super::ChannelError;
use crate::platform::{ChannelInfo, PlatformClient};
use crate::run_log::AnomalyLog;
use crate::store::MediaStore;

pub type ChannelStream = BoxStream<'static, ChannelInfo>;

/// Extra predicate applied on top of the `check` flag.
pub type ChannelFilter = Box<dyn Fn(&ChannelInfo) -> bool + Send + Sync>;

/// Where a run gets its channels from.
pub enum ChannelProvider {
    /// Channels flagged for crawling in the store.
    Checked(Vec<ChannelFilter>),
    /// First open dialog whose title contains the name.
    ByName(String),
    /// Members of a platform folder.
    Folder(String),
    List(Vec<ChannelInfo>),
}

impl ChannelProvider {
    pub fn describe(&self) -> String {
        match self {
            ChannelProvider::Checked(_) => "checked channels".to_string(),
            ChannelProvider::ByName(name) => format!("channel matching '{}'", name),
            ChannelProvider::Folder(name) => format!("folder '{}'", name),
            ChannelProvider::List(channels) => format!("{} listed channels", channels.len()),
        }
    }
}

pub struct ChannelManager {
    platform: Arc<dyn PlatformClient>,
    store: Arc<dyn MediaStore>,
    anomalies: Arc<AnomalyLog>,
}

impl ChannelManager {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        store: Arc<dyn MediaStore>,
        anomalies: Arc<AnomalyLog>,
    ) -> Self {
        Self {
            platform,
            store,
            anomalies,
        }
    }

    /// Resolves a provider into a channel stream. Name and folder lookups
    /// happen here, so a bad name fails before any crawling starts.
    pub async fn resolve(&self, provider: ChannelProvider) -> Result<ChannelStream, ChannelError> {
        match provider {
            ChannelProvider::Checked(filters) => self.channels_to_crawl(filters).await,
            ChannelProvider::ByName(name) => {
                let channel = self.lookup_by_name(&name).await?;
                Ok(stream::iter(vec![channel]).boxed())
            }
            ChannelProvider::Folder(name) => {
                let channels = self.channels_in_folder(&name).await?;
                Ok(stream::iter(channels).boxed())
            }
            ChannelProvider::List(channels) => Ok(stream::iter(channels).boxed()),
        }
    }

    /// Streams the checked channels that still resolve on the platform and
    /// pass every filter. Unresolvable channels are logged and skipped.
    pub async fn channels_to_crawl(
        &self,
        filters: Vec<ChannelFilter>,
    ) -> Result<ChannelStream, ChannelError> {
        let checked = self.store.checked_channels().map_err(ChannelError::Store)?;
        info!("{} channels are checked for crawling", checked.len());

        let platform = self.platform.clone();
        let anomalies = self.anomalies.clone();
        let filters = Arc::new(filters);

        let channels = stream::iter(checked).filter_map(move |stored| {
            let platform = platform.clone();
            let anomalies = anomalies.clone();
            let filters = filters.clone();
            async move {
                match platform.get_channel(stored.id).await {
                    Ok(channel) => filters.iter().all(|f| f(&channel)).then_some(channel),
                    Err(e) => {
                        warn!(
                            channel_id = stored.id,
                            title = %stored.title,
                            error = %e,
                            "skipping channel that failed to resolve"
                        );
                        anomalies.record(
                            "unresolvable_channel",
                            json!({
                                "channel_id": stored.id,
                                "title": stored.title,
                                "error": e.to_string(),
                            }),
                        );
                        None
                    }
                }
            }
        });
        Ok(channels.boxed())
    }

    pub async fn lookup_by_name(&self, name: &str) -> Result<ChannelInfo, ChannelError> {
        let needle = name.to_lowercase();
        self.platform
            .dialogs()
            .await?
            .into_iter()
            .find(|dialog| dialog.title.to_lowercase().contains(&needle))
            .ok_or_else(|| ChannelError::NotFound(name.to_string()))
    }

    pub async fn channels_in_folder(
        &self,
        folder_name: &str,
    ) -> Result<Vec<ChannelInfo>, ChannelError> {
        let folder = self
            .platform
            .dialog_folders()
            .await?
            .into_iter()
            .find(|folder| folder.title == folder_name)
            .ok_or_else(|| ChannelError::FolderNotFound(folder_name.to_string()))?;

        let mut channels = Vec::with_capacity(folder.peers.len());
        for peer in folder.peers {
            match self.platform.get_channel(peer).await {
                Ok(channel) => channels.push(channel),
                Err(e) => warn!(peer, error = %e, "skipping folder peer that failed to resolve"),
            }
        }
        info!(
            "Folder '{}' resolved to {} channels",
            folder_name,
            channels.len()
        );
        Ok(channels)
    }

    pub fn sync_checklist(&self, channels: &[ChannelInfo]) -> Result<(), ChannelError> {
        self.store
            .sync_checklist(channels)
            .map_err(ChannelError::Store)?;
        info!("Checklist synced, {} channels checked", channels.len());
        Ok(())
    }
}
