use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::files::application::domain::entities::{FileRecord, FileTags};
use crate::files::application::ports::outgoing::image_processor::ProcessParams;
use crate::files::application::services::{
    UploadError, UploadPipeline, UploadRequest, UrlFetchError, UrlFetcher,
};

#[derive(Debug, Clone)]
pub enum UploadFromUrlError {
    Fetch(UrlFetchError),
    Upload(UploadError),
}

#[derive(Debug, Clone)]
pub struct UploadFromUrlCommand {
    pub url: String,
    pub tags: FileTags,
    pub metadata: serde_json::Value,
    pub compress_params: Option<ProcessParams>,
}

/// An interface for ingesting a file from an external URL: SSRF-validated
/// fetch, then the regular upload pipeline.
#[async_trait]
pub trait IUploadFromUrlUseCase: Send + Sync {
    async fn execute(
        &self,
        command: UploadFromUrlCommand,
    ) -> Result<FileRecord, UploadFromUrlError>;
}

pub struct UploadFromUrlUseCase {
    fetcher: Arc<UrlFetcher>,
    pipeline: Arc<UploadPipeline>,
}

impl UploadFromUrlUseCase {
    pub fn new(fetcher: Arc<UrlFetcher>, pipeline: Arc<UploadPipeline>) -> Self {
        Self { fetcher, pipeline }
    }
}

#[async_trait]
impl IUploadFromUrlUseCase for UploadFromUrlUseCase {
    async fn execute(
        &self,
        command: UploadFromUrlCommand,
    ) -> Result<FileRecord, UploadFromUrlError> {
        let fetched = self
            .fetcher
            .fetch(&command.url)
            .await
            .map_err(UploadFromUrlError::Fetch)?;

        let mime_type = fetched
            .mime_type
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let filename = fetched
            .filename
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| "download".to_string());

        info!(url = %command.url, mime_type = %mime_type, "ingesting remote file");

        self.pipeline
            .upload_stream(
                fetched.stream,
                UploadRequest {
                    filename,
                    mime_type,
                    tags: command.tags,
                    metadata: command.metadata,
                    compress_params: command.compress_params,
                },
            )
            .await
            .map_err(UploadFromUrlError::Upload)
    }
}
