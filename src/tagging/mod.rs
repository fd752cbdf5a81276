//! Client for the image tagging and scoring service, plus the batch job
//! that tags still images which have no tags yet.

mod http_client;
mod job;

pub use http_client::HttpTaggingClient;
pub use job::{tag_untagged_images, TagJobConfig, TagJobSummary, TagSource};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagPrediction {
    pub tag: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AestheticScore {
    pub score: f64,
    pub backend: String,
}

#[derive(Debug, Error)]
pub enum TaggingError {
    /// The service rejected the image or URL.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("tagging service error: {0}")]
    Internal(String),
}

#[async_trait]
pub trait TaggingClient: Send + Sync {
    /// Tags an image the service can fetch itself.
    async fn tag_url(&self, image_url: &str, cutoff: f64)
        -> Result<Vec<TagPrediction>, TaggingError>;

    /// Tags uploaded image bytes.
    async fn tag_bytes(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        cutoff: f64,
    ) -> Result<Vec<TagPrediction>, TaggingError>;

    async fn score_url(&self, image_url: &str) -> Result<AestheticScore, TaggingError>;
}
