//! HTTP client for the remote image-processing service.
//!
//! The service is a plain RPC surface: `POST /process` returns the re-encoded
//! binary with its Content-Type, `POST /exif` returns a JSON bag, and
//! `GET /health` reports its queue. Connection problems and 5xx responses map
//! to `Unavailable`, client-side deadline hits to `Timeout`, and anything the
//! service itself rejected to `Rejected`. Callers decide how far to degrade.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::files::application::ports::outgoing::image_processor::{
    ImageProcessor, ImageProcessorError, ProcessParams, ProcessedImage, ProcessorHealth,
};
use crate::shared::config::ImageProcessingConfig;

/// Health probes fail fast; they gate uploads, not processing.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct ImageProcessorHttp {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl ImageProcessorHttp {
    pub fn new(config: &ImageProcessingConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }

    fn map_transport_err(e: reqwest::Error) -> ImageProcessorError {
        if e.is_timeout() {
            ImageProcessorError::Timeout
        } else if e.is_connect() || e.is_request() {
            ImageProcessorError::Unavailable
        } else {
            ImageProcessorError::Rejected(e.to_string())
        }
    }

    /// Wire shape of the `params` multipart field:
    /// `{transform: {...}, output: {...}}`.
    fn build_params_json(params: &ProcessParams) -> serde_json::Value {
        let mut transform = serde_json::Map::new();
        if let Some(max_dimension) = params.max_dimension {
            transform.insert("maxDimension".to_string(), max_dimension.into());
        }
        if let Some(width) = params.width {
            transform.insert("width".to_string(), width.into());
        }
        if let Some(height) = params.height {
            transform.insert("height".to_string(), height.into());
        }
        if let Some(strip_metadata) = params.strip_metadata {
            transform.insert("stripMetadata".to_string(), strip_metadata.into());
        }
        if let Some(auto_orient) = params.auto_orient {
            transform.insert("autoOrient".to_string(), auto_orient.into());
        }

        let mut output = serde_json::Map::new();
        if let Some(format) = &params.format {
            output.insert("format".to_string(), format.clone().into());
        }
        if let Some(quality) = params.quality {
            output.insert("quality".to_string(), quality.into());
        }
        if let Some(effort) = params.effort {
            output.insert("effort".to_string(), effort.into());
        }
        if let Some(lossless) = params.lossless {
            output.insert("lossless".to_string(), lossless.into());
        }
        if let Some(chroma) = &params.chroma_subsampling {
            output.insert("chromaSubsampling".to_string(), chroma.clone().into());
        }

        serde_json::json!({
            "transform": transform,
            "output": output,
        })
    }

    fn multipart_file(
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<reqwest::multipart::Part, ImageProcessorError> {
        reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| ImageProcessorError::Rejected(format!("invalid MIME type: {e}")))
    }
}

#[derive(Deserialize)]
struct ExifResponse {
    exif: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct HealthQueue {
    #[serde(default)]
    size: i64,
    #[serde(default)]
    pending: i64,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    queue: Option<HealthQueue>,
}

#[async_trait]
impl ImageProcessor for ImageProcessorHttp {
    async fn process(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
        params: &ProcessParams,
    ) -> Result<ProcessedImage, ImageProcessorError> {
        let form = reqwest::multipart::Form::new()
            .part("file", Self::multipart_file(bytes, filename, mime_type)?)
            .text(
                "params",
                Self::build_params_json(params).to_string(),
            );

        let response = self
            .client
            .post(format!("{}/process", self.base_url))
            .timeout(self.request_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(Self::map_transport_err)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ImageProcessorError::Unavailable);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageProcessorError::Rejected(format!(
                "processing rejected ({status}): {body}"
            )));
        }

        let output_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let body = response
            .bytes()
            .await
            .map_err(Self::map_transport_err)?;

        Ok(ProcessedImage {
            bytes: body.to_vec(),
            mime_type: output_mime,
        })
    }

    async fn exif(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<Option<serde_json::Value>, ImageProcessorError> {
        let form = reqwest::multipart::Form::new()
            .part("file", Self::multipart_file(bytes, filename, mime_type)?);

        let response = self
            .client
            .post(format!("{}/exif", self.base_url))
            .timeout(self.request_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(Self::map_transport_err)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ImageProcessorError::Unavailable);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageProcessorError::Rejected(format!(
                "exif extraction rejected ({status}): {body}"
            )));
        }

        let parsed: ExifResponse = response
            .json()
            .await
            .map_err(|e| ImageProcessorError::Rejected(e.to_string()))?;

        Ok(parsed.exif)
    }

    async fn health(&self) -> Result<ProcessorHealth, ImageProcessorError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(Self::map_transport_err)?;

        if !response.status().is_success() {
            return Err(ImageProcessorError::Unavailable);
        }

        let parsed: HealthResponse = response
            .json()
            .await
            .map_err(|e| ImageProcessorError::Rejected(e.to_string()))?;

        let queue = parsed.queue.unwrap_or(HealthQueue {
            size: 0,
            pending: 0,
        });

        Ok(ProcessorHealth {
            status: parsed.status,
            queue_size: queue.size,
            queue_pending: queue.pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_json_only_carries_set_fields() {
        let params = ProcessParams {
            format: Some("webp".to_string()),
            quality: Some(80),
            max_dimension: Some(2048),
            ..Default::default()
        };

        let json = ImageProcessorHttp::build_params_json(&params);
        assert_eq!(json["output"]["format"], "webp");
        assert_eq!(json["output"]["quality"], 80);
        assert_eq!(json["transform"]["maxDimension"], 2048);
        assert!(json["output"].get("lossless").is_none());
        assert!(json["transform"].get("width").is_none());
    }

    #[test]
    fn test_params_json_empty_params() {
        let json = ImageProcessorHttp::build_params_json(&ProcessParams::default());
        assert_eq!(json["transform"], serde_json::json!({}));
        assert_eq!(json["output"], serde_json::json!({}));
    }
}
