use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::files::application::domain::entities::FileStatus;
use crate::files::application::domain::{mime, storage_keys};
use crate::files::application::ports::outgoing::blob_storage::{BlobStore, BlobStoreError};
use crate::files::application::ports::outgoing::db::{
    FileRepository, NewThumbnail, ThumbnailRepository,
};
use crate::files::application::ports::outgoing::image_processor::{
    ImageProcessor, ImageProcessorError, ProcessParams,
};
use crate::shared::config::ThumbnailConfig;

#[derive(Debug, Clone)]
pub enum ThumbnailError {
    NotFound,
    /// Thumbnails only exist for image files.
    NotAnImage,
    InvalidDimensions {
        min_width: u32,
        min_height: u32,
        max_width: u32,
        max_height: u32,
    },
    /// Parent file is not servable yet.
    NotReady,
    ProcessorUnavailable(String),
    Storage(String),
    RepositoryError(String),
}

#[derive(Debug, Clone)]
pub struct ThumbnailRequest {
    pub id: Uuid,
    pub width: u32,
    pub height: u32,
    pub quality: Option<u8>,
}

#[derive(Debug)]
pub struct ThumbnailPayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Cache key of this rendition; doubles as the HTTP ETag.
    pub params_hash: String,
}

/// An interface for serving cached (or freshly generated) thumbnails.
#[async_trait]
pub trait IGetThumbnailUseCase: Send + Sync {
    async fn execute(&self, request: ThumbnailRequest)
        -> Result<ThumbnailPayload, ThumbnailError>;
}

pub struct GetThumbnailUseCase {
    files: Arc<dyn FileRepository>,
    thumbnails: Arc<dyn ThumbnailRepository>,
    blobs: Arc<dyn BlobStore>,
    processor: Arc<dyn ImageProcessor>,
    config: ThumbnailConfig,
    bucket: String,
    /// Ceiling for buffering the source image.
    max_source_bytes: u64,
}

impl GetThumbnailUseCase {
    pub fn new(
        files: Arc<dyn FileRepository>,
        thumbnails: Arc<dyn ThumbnailRepository>,
        blobs: Arc<dyn BlobStore>,
        processor: Arc<dyn ImageProcessor>,
        config: ThumbnailConfig,
        bucket: String,
        max_source_bytes: u64,
    ) -> Self {
        Self {
            files,
            thumbnails,
            blobs,
            processor,
            config,
            bucket,
            max_source_bytes,
        }
    }

    fn check_dimensions(&self, width: u32, height: u32) -> Result<(), ThumbnailError> {
        let c = &self.config;
        if width < c.min_width
            || height < c.min_height
            || width > c.max_width
            || height > c.max_height
        {
            return Err(ThumbnailError::InvalidDimensions {
                min_width: c.min_width,
                min_height: c.min_height,
                max_width: c.max_width,
                max_height: c.max_height,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl IGetThumbnailUseCase for GetThumbnailUseCase {
    async fn execute(
        &self,
        request: ThumbnailRequest,
    ) -> Result<ThumbnailPayload, ThumbnailError> {
        self.check_dimensions(request.width, request.height)?;

        let record = self
            .files
            .find_by_id(request.id)
            .await
            .map_err(|e| ThumbnailError::RepositoryError(e.to_string()))?
            .filter(|r| !r.is_soft_deleted())
            .ok_or(ThumbnailError::NotFound)?;

        if !mime::is_image(&record.mime_type) {
            return Err(ThumbnailError::NotAnImage);
        }
        if record.status != FileStatus::Ready || record.s3_key.is_empty() {
            return Err(ThumbnailError::NotReady);
        }

        let quality = request.quality.unwrap_or(self.config.quality);
        let params_hash = storage_keys::thumbnail_params_hash(
            request.width,
            request.height,
            quality,
            &self.config.format,
        );

        // cache hit: touch and serve
        if let Some(cached) = self
            .thumbnails
            .find_by_params(record.id, &params_hash)
            .await
            .map_err(|e| ThumbnailError::RepositoryError(e.to_string()))?
        {
            match self.blobs.get_bytes(&cached.s3_key, self.max_source_bytes).await {
                Ok(bytes) => {
                    if let Err(e) = self.thumbnails.touch_last_accessed(cached.id).await {
                        warn!(thumbnail_id = %cached.id, error = %e, "could not touch thumbnail");
                    }
                    return Ok(ThumbnailPayload {
                        bytes,
                        mime_type: cached.mime_type,
                        params_hash,
                    });
                }
                // evicted blob behind a live row: fall through and regenerate
                Err(BlobStoreError::NotFound) => {
                    debug!(thumbnail_id = %cached.id, "cached thumbnail blob missing, regenerating");
                }
                Err(e) => return Err(ThumbnailError::Storage(e.to_string())),
            }
        }

        let source = self
            .blobs
            .get_bytes(&record.s3_key, self.max_source_bytes)
            .await
            .map_err(|e| ThumbnailError::Storage(e.to_string()))?;

        let processed = self
            .processor
            .process(
                source,
                &record.filename,
                &record.mime_type,
                &ProcessParams {
                    format: Some(self.config.format.clone()),
                    width: Some(request.width),
                    height: Some(request.height),
                    quality: Some(quality),
                    effort: Some(self.config.effort),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| match e {
                ImageProcessorError::Rejected(message) => {
                    ThumbnailError::ProcessorUnavailable(message)
                }
                other => ThumbnailError::ProcessorUnavailable(other.to_string()),
            })?;

        let key = storage_keys::thumbnail_key(record.id, &params_hash, &self.config.format);
        let body = processed.bytes.clone();
        self.blobs
            .put_stream(
                &key,
                &processed.mime_type,
                futures::stream::once(async move { Ok(bytes::Bytes::from(body)) }).boxed(),
            )
            .await
            .map_err(|e| ThumbnailError::Storage(e.to_string()))?;

        self.thumbnails
            .insert(NewThumbnail {
                file_id: record.id,
                width: request.width as i32,
                height: request.height as i32,
                quality: quality as i32,
                params_hash: params_hash.clone(),
                s3_key: key,
                s3_bucket: self.bucket.clone(),
                size: processed.bytes.len() as i64,
                mime_type: processed.mime_type.clone(),
            })
            .await
            .map_err(|e| ThumbnailError::RepositoryError(e.to_string()))?;

        Ok(ThumbnailPayload {
            bytes: processed.bytes,
            mime_type: processed.mime_type,
            params_hash,
        })
    }
}
