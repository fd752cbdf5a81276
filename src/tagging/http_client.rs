use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AestheticScore, TagPrediction, TaggingClient, TaggingError};

#[derive(Debug, Serialize)]
struct TagUrlRequest<'a> {
    image_url: &'a str,
    cutoff: f64,
}

#[derive(Debug, Deserialize)]
struct TagUrlResponse {
    tags: Vec<TagPrediction>,
    #[allow(dead_code)]
    cutoff: f64,
}

#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    image_url: &'a str,
}

#[derive(Clone)]
pub struct HttpTaggingClient {
    client: Client,
    base_url: String,
}

impl HttpTaggingClient {
    pub fn new(base_url: String, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, TaggingError> {
        let response = request
            .send()
            .await
            .map_err(|e| TaggingError::Internal(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(TaggingError::InvalidInput(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TaggingError::Internal(format!("{}: {}", status, body)));
        }
        response
            .json()
            .await
            .map_err(|e| TaggingError::Internal(format!("malformed response: {}", e)))
    }
}

#[async_trait]
impl TaggingClient for HttpTaggingClient {
    async fn tag_url(
        &self,
        image_url: &str,
        cutoff: f64,
    ) -> Result<Vec<TagPrediction>, TaggingError> {
        debug!("tagging {}", image_url);
        let url = format!("{}/v1/tags", self.base_url);
        let response: TagUrlResponse = self
            .send_json(self.client.post(&url).json(&TagUrlRequest { image_url, cutoff }))
            .await?;
        Ok(response.tags)
    }

    async fn tag_bytes(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        cutoff: f64,
    ) -> Result<Vec<TagPrediction>, TaggingError> {
        debug!("uploading {} ({} bytes) for tagging", file_name, bytes.len());
        let url = format!("{}/predict/file", self.base_url);
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        self.send_json(
            self.client
                .post(&url)
                .query(&[("cutoff", cutoff.to_string())])
                .multipart(form),
        )
        .await
    }

    async fn score_url(&self, image_url: &str) -> Result<AestheticScore, TaggingError> {
        let url = format!("{}/v1/score", self.base_url);
        self.send_json(self.client.post(&url).json(&ScoreRequest { image_url }))
            .await
    }
}
