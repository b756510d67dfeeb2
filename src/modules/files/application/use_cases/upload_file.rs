use async_trait::async_trait;
use std::sync::Arc;

use crate::files::application::domain::entities::FileRecord;
use crate::files::application::ports::outgoing::blob_storage::BlobByteStream;
use crate::files::application::services::{UploadError, UploadPipeline, UploadRequest};

/// An interface for streaming uploads. Thin seam over the upload pipeline so
/// the web layer depends on a trait, not the service.
#[async_trait]
pub trait IUploadFileUseCase: Send + Sync {
    async fn execute(
        &self,
        source: BlobByteStream,
        request: UploadRequest,
    ) -> Result<FileRecord, UploadError>;
}

pub struct UploadFileUseCase {
    pipeline: Arc<UploadPipeline>,
}

impl UploadFileUseCase {
    pub fn new(pipeline: Arc<UploadPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl IUploadFileUseCase for UploadFileUseCase {
    async fn execute(
        &self,
        source: BlobByteStream,
        request: UploadRequest,
    ) -> Result<FileRecord, UploadError> {
        self.pipeline.upload_stream(source, request).await
    }
}
