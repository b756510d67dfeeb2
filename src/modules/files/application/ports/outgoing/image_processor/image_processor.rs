use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the remote image-processing service, mapped fail-open:
/// `Unavailable` and `Timeout` mean the service could not be reached in
/// time, `Rejected` means it processed the request and said no.
#[derive(Debug, Clone, Error)]
pub enum ImageProcessorError {
    #[error("image processing service is unreachable")]
    Unavailable,

    #[error("image processing request timed out")]
    Timeout,

    #[error("image processing failed: {0}")]
    Rejected(String),
}

/// Output transform parameters. `None` means "service default"; the caller
/// merges user wishes against the configured compression policy before
/// anything reaches the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProcessParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_dimension: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effort: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lossless: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strip_metadata: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_orient: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chroma_subsampling: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessorHealth {
    pub status: String,
    pub queue_size: i64,
    pub queue_pending: i64,
}

#[async_trait]
pub trait ImageProcessor: Send + Sync {
    /// Re-encode `bytes` according to `params`. Returns the new body and its
    /// MIME type.
    async fn process(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
        params: &ProcessParams,
    ) -> Result<ProcessedImage, ImageProcessorError>;

    /// Extract EXIF as an opaque JSON bag; `None` when the image has none.
    async fn exif(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<Option<serde_json::Value>, ImageProcessorError>;

    async fn health(&self) -> Result<ProcessorHealth, ImageProcessorError>;
}
