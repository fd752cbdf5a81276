//! HTTP client for the platform bridge service.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::models::*;
use super::{MessageStream, PlatformClient, PlatformError};
use crate::progress::ProgressReporter;

const PAGE_SIZE: usize = 100;
const DEFAULT_FLOOD_WAIT_SECS: u64 = 1;

#[derive(Debug, Deserialize)]
struct MessagePage {
    messages: Vec<Message>,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnreadResponse {
    unread_count: u64,
}

#[derive(Debug, Deserialize)]
struct LinkResponse {
    link: String,
}

#[derive(Debug, Serialize)]
struct ReadRequest {
    max_id: i64,
}

struct PageCursor {
    query: MessageQuery,
    token: Option<String>,
    fetched: usize,
}

/// Talks to the bridge process that owns the platform session.
#[derive(Clone)]
pub struct HttpPlatformClient {
    client: Client,
    base_url: String,
}

impl HttpPlatformClient {
    pub fn new(base_url: String, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, PlatformError> {
        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PlatformError> {
        let url = format!("{}{}", self.base_url, path);
        self.send(self.client.get(&url))
            .await?
            .json()
            .await
            .map_err(|e| PlatformError::Protocol(e.to_string()))
    }

    async fn fetch_page(
        &self,
        channel_id: i64,
        cursor: &PageCursor,
        page_size: usize,
    ) -> Result<MessagePage, PlatformError> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel_id);
        let query = &cursor.query;

        let mut params: Vec<(&str, String)> = vec![("limit", page_size.to_string())];
        if let Some(min_id) = query.min_id {
            params.push(("min_id", min_id.to_string()));
        }
        if let Some(offset_id) = query.offset_id {
            params.push(("offset_id", offset_id.to_string()));
        }
        if let Some(filter) = query.filter {
            let name = match filter {
                MessageFilter::Url => "url",
                MessageFilter::Video => "video",
            };
            params.push(("filter", name.to_string()));
        }
        if let Some(token) = &cursor.token {
            params.push(("cursor", token.clone()));
        }

        self.send(self.client.get(&url).query(&params))
            .await?
            .json()
            .await
            .map_err(|e| PlatformError::Protocol(e.to_string()))
    }
}

async fn check_status(response: Response) -> Result<Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 420 {
        let wait = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_FLOOD_WAIT_SECS);
        return Err(PlatformError::FloodWait(Duration::from_secs(wait)));
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(PlatformError::NotFound(format!("{} ({})", url, body)));
    }
    Err(PlatformError::Protocol(format!(
        "{} returned {}: {}",
        url, status, body
    )))
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    fn iter_messages(&self, channel: &ChannelInfo, query: MessageQuery) -> MessageStream {
        let client = self.clone();
        let channel_id = channel.id;
        let start = PageCursor {
            query,
            token: None,
            fetched: 0,
        };

        stream::try_unfold(Some(start), move |cursor| {
            let client = client.clone();
            async move {
                let Some(mut cursor) = cursor else {
                    return Ok(None);
                };
                let page_size = match cursor.query.limit {
                    Some(limit) => limit.saturating_sub(cursor.fetched).min(PAGE_SIZE),
                    None => PAGE_SIZE,
                };
                if page_size == 0 {
                    return Ok(None);
                }

                let page = client.fetch_page(channel_id, &cursor, page_size).await?;
                debug!(
                    channel_id,
                    count = page.messages.len(),
                    "fetched message page"
                );
                cursor.fetched += page.messages.len();
                let next = match page.next_cursor {
                    Some(token) if !page.messages.is_empty() => {
                        cursor.token = Some(token);
                        Some(cursor)
                    }
                    _ => None,
                };
                Ok::<_, PlatformError>(Some((page.messages, next)))
            }
        })
        .map_ok(|messages| stream::iter(messages.into_iter().map(Ok::<_, PlatformError>)))
        .try_flatten()
        .boxed()
    }

    async fn get_channel(&self, channel_id: i64) -> Result<ChannelInfo, PlatformError> {
        self.get_json(&format!("/channels/{}", channel_id)).await
    }

    async fn dialogs(&self) -> Result<Vec<ChannelInfo>, PlatformError> {
        self.get_json("/dialogs").await
    }

    async fn dialog_folders(&self) -> Result<Vec<DialogFolder>, PlatformError> {
        self.get_json("/folders").await
    }

    async fn unread_count(&self, channel: &ChannelInfo) -> Result<u64, PlatformError> {
        let response: UnreadResponse = self
            .get_json(&format!("/channels/{}/unread", channel.id))
            .await?;
        Ok(response.unread_count)
    }

    async fn export_message_link(
        &self,
        channel: &ChannelInfo,
        message_id: i64,
    ) -> Result<String, PlatformError> {
        let response: LinkResponse = self
            .get_json(&format!(
                "/channels/{}/messages/{}/link",
                channel.id, message_id
            ))
            .await?;
        Ok(response.link)
    }

    async fn download_media(
        &self,
        locator: &ContentLocator,
        dest: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<Option<PathBuf>, PlatformError> {
        let url = format!("{}/media", self.base_url);
        let request = self.client.get(&url).query(&[
            ("channel_id", locator.channel_id.to_string()),
            ("message_id", locator.message_id.to_string()),
            ("file_id", locator.file_id.clone()),
            ("from_preview", locator.from_preview.to_string()),
        ]);
        let response = self.send(request).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let label = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| locator.file_id.clone());
        let partial = dest.with_extension("part");

        progress.start(&label, response.content_length());
        let written = write_body(response, &partial, &label, progress).await;
        progress.finish(&label);

        match written {
            Ok(()) => {
                tokio::fs::rename(&partial, dest).await?;
                Ok(Some(dest.to_path_buf()))
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }

    async fn mark_read(
        &self,
        channel: &ChannelInfo,
        message_id: i64,
    ) -> Result<(), PlatformError> {
        let url = format!("{}/channels/{}/read", self.base_url, channel.id);
        self.send(self.client.post(&url).json(&ReadRequest { max_id: message_id }))
            .await?;
        Ok(())
    }
}

async fn write_body(
    response: Response,
    path: &Path,
    label: &str,
    progress: &dyn ProgressReporter,
) -> Result<(), PlatformError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut body = response.bytes_stream();
    let mut received: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| PlatformError::Network(e.to_string()))?;
        file.write_all(&chunk).await?;
        received += chunk.len() as u64;
        progress.advance(label, received);
    }
    file.flush().await?;
    Ok(())
}
