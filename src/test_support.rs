//! In-memory platform used by unit tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::stream::{self, StreamExt};

use crate::platform::*;
use crate::progress::ProgressReporter;

#[derive(Default)]
pub struct FakePlatform {
    dialogs: Mutex<Vec<ChannelInfo>>,
    gone: Mutex<HashSet<i64>>,
    messages: Mutex<HashMap<i64, Vec<Message>>>,
    unread: Mutex<HashMap<i64, u64>>,
    folders: Mutex<Vec<DialogFolder>>,
    queries: Mutex<Vec<(i64, MessageQuery)>>,
    downloads: Mutex<Vec<ContentLocator>>,
    acks: Mutex<Vec<(i64, i64)>>,
    flood_waits_left: Mutex<u32>,
    empty_downloads: Mutex<bool>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel(&self, id: i64, title: &str) -> ChannelInfo {
        let channel = ChannelInfo::new(id, title);
        self.dialogs.lock().unwrap().push(channel.clone());
        channel
    }

    /// Makes `get_channel` fail as if the channel had been deleted.
    pub fn remove_channel(&self, id: i64) {
        self.gone.lock().unwrap().insert(id);
    }

    pub fn add_message(&self, message: Message) {
        let mut messages = self.messages.lock().unwrap();
        let list = messages.entry(message.channel_id).or_default();
        list.push(message);
        list.sort_by_key(|m| m.id);
    }

    pub fn set_unread(&self, channel_id: i64, count: u64) {
        self.unread.lock().unwrap().insert(channel_id, count);
    }

    pub fn add_folder(&self, title: &str, peers: Vec<i64>) {
        self.folders.lock().unwrap().push(DialogFolder {
            title: title.to_string(),
            peers,
        });
    }

    pub fn fail_next_downloads(&self, count: u32) {
        *self.flood_waits_left.lock().unwrap() = count;
    }

    pub fn produce_empty_downloads(&self) {
        *self.empty_downloads.lock().unwrap() = true;
    }

    pub fn queries(&self) -> Vec<(i64, MessageQuery)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<ContentLocator> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn acks(&self) -> Vec<(i64, i64)> {
        self.acks.lock().unwrap().clone()
    }

    /// Size the message advertises for the located content.
    fn declared_size(&self, locator: &ContentLocator) -> u64 {
        let messages = self.messages.lock().unwrap();
        let Some(message) = messages
            .get(&locator.channel_id)
            .and_then(|list| list.iter().find(|m| m.id == locator.message_id))
        else {
            return 0;
        };
        match &message.media {
            Some(MessageMedia::Document(doc)) => doc.size,
            Some(MessageMedia::Photo(photo)) => photo.size,
            Some(MessageMedia::WebPage(WebPage {
                document: Some(doc),
                ..
            })) => doc.size,
            _ => 0,
        }
    }
}

fn matches_filter(message: &Message, filter: MessageFilter) -> bool {
    match filter {
        MessageFilter::Url => message.has_url,
        MessageFilter::Video => matches!(
            &message.media,
            Some(MessageMedia::Document(Document { mime_type: Some(mime), .. }))
                if mime.starts_with("video/")
        ),
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    fn iter_messages(&self, channel: &ChannelInfo, query: MessageQuery) -> MessageStream {
        self.queries
            .lock()
            .unwrap()
            .push((channel.id, query.clone()));

        let mut selected: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .get(&channel.id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|m| query.min_id.map_or(true, |min| m.id > min))
            .filter(|m| query.offset_id.map_or(true, |offset| m.id < offset))
            .filter(|m| query.filter.map_or(true, |f| matches_filter(m, f)))
            .collect();
        selected.reverse();
        if let Some(limit) = query.limit {
            selected.truncate(limit);
        }
        stream::iter(selected.into_iter().map(Ok)).boxed()
    }

    async fn get_channel(&self, channel_id: i64) -> Result<ChannelInfo, PlatformError> {
        if self.gone.lock().unwrap().contains(&channel_id) {
            return Err(PlatformError::NotFound(format!("channel {}", channel_id)));
        }
        self.dialogs
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == channel_id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("channel {}", channel_id)))
    }

    async fn dialogs(&self) -> Result<Vec<ChannelInfo>, PlatformError> {
        Ok(self.dialogs.lock().unwrap().clone())
    }

    async fn dialog_folders(&self) -> Result<Vec<DialogFolder>, PlatformError> {
        Ok(self.folders.lock().unwrap().clone())
    }

    async fn unread_count(&self, channel: &ChannelInfo) -> Result<u64, PlatformError> {
        Ok(self
            .unread
            .lock()
            .unwrap()
            .get(&channel.id)
            .copied()
            .unwrap_or(0))
    }

    async fn export_message_link(
        &self,
        channel: &ChannelInfo,
        message_id: i64,
    ) -> Result<String, PlatformError> {
        Ok(format!("https://t.me/c/{}/{}", channel.id, message_id))
    }

    async fn download_media(
        &self,
        locator: &ContentLocator,
        dest: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<Option<PathBuf>, PlatformError> {
        {
            let mut left = self.flood_waits_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(PlatformError::FloodWait(Duration::from_millis(1)));
            }
        }
        self.downloads.lock().unwrap().push(locator.clone());
        if *self.empty_downloads.lock().unwrap() {
            return Ok(None);
        }
        let size = self.declared_size(locator);
        let label = locator.file_id.clone();
        progress.start(&label, Some(size));
        tokio::fs::write(dest, vec![0u8; size as usize]).await?;
        progress.advance(&label, size);
        progress.finish(&label);
        Ok(Some(dest.to_path_buf()))
    }

    async fn mark_read(
        &self,
        channel: &ChannelInfo,
        message_id: i64,
    ) -> Result<(), PlatformError> {
        self.acks.lock().unwrap().push((channel.id, message_id));
        Ok(())
    }
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

pub fn text_message(channel_id: i64, id: i64) -> Message {
    base_message(channel_id, id)
}

pub fn document_message(channel_id: i64, id: i64, file_id: &str, size: u64, mime: &str) -> Message {
    Message {
        media: Some(MessageMedia::Document(Document {
            file_id: file_id.to_string(),
            size,
            mime_type: Some(mime.to_string()),
            file_name: None,
            sticker_set: None,
        })),
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

pub fn preview_message(channel_id: i64, id: i64, file_id: &str, size: u64, mime: &str) -> Message {
    Message {
        media: Some(MessageMedia::WebPage(WebPage {
            url: "https://example.com/clip".to_string(),
            document: Some(Document {
                file_id: file_id.to_string(),
                size,
                mime_type: Some(mime.to_string()),
                file_name: None,
                sticker_set: None,
            }),
        })),
        has_url: true,
        ..base_message(channel_id, id)
    }
}

pub fn forward_message(channel_id: i64, id: i64, from: ChannelInfo) -> Message {
    Message {
        forward: Some(ForwardInfo {
            channel: Some(from),
        }),
        ..base_message(channel_id, id)
    }
}
