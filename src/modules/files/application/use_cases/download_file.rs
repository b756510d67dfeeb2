use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::files::application::domain::entities::{FileRecord, FileStatus};
use crate::files::application::ports::outgoing::blob_storage::{
    BlobByteStream, BlobStore, ByteRange,
};
use crate::files::application::ports::outgoing::db::FileRepository;
use crate::files::application::services::{OptimizationEngine, OptimizationWaitError};

#[derive(Debug, Clone)]
pub enum DownloadFileError {
    /// Unknown id or soft-deleted record.
    NotFound,
    /// Terminal `deleted` state.
    Gone,
    /// Not `ready` (or no served blob yet).
    NotReady,
    /// The stored optimization error.
    OptimizationFailed(String),
    /// The bounded read-path wait ran out.
    WaitTimeout,
    Storage(String),
    RepositoryError(String),
}

pub struct DownloadPayload {
    pub record: FileRecord,
    pub stream: BlobByteStream,
    pub content_length: i64,
    pub total_size: i64,
    /// The range actually satisfied, if any.
    pub range: Option<ByteRange>,
}

impl std::fmt::Debug for DownloadPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadPayload")
            .field("record", &self.record)
            .field("stream", &"<stream>")
            .field("content_length", &self.content_length)
            .field("total_size", &self.total_size)
            .field("range", &self.range)
            .finish()
    }
}

/// An interface for streaming a file's bytes back out, blocking on an
/// in-flight optimization first.
#[async_trait]
pub trait IDownloadFileUseCase: Send + Sync {
    async fn execute(
        &self,
        id: Uuid,
        range: Option<ByteRange>,
    ) -> Result<DownloadPayload, DownloadFileError>;
}

pub struct DownloadFileUseCase {
    files: Arc<dyn FileRepository>,
    blobs: Arc<dyn BlobStore>,
    engine: Arc<OptimizationEngine>,
}

impl DownloadFileUseCase {
    pub fn new(
        files: Arc<dyn FileRepository>,
        blobs: Arc<dyn BlobStore>,
        engine: Arc<OptimizationEngine>,
    ) -> Self {
        Self {
            files,
            blobs,
            engine,
        }
    }

    /// Clamp a requested range against the object size. Unsatisfiable
    /// ranges degrade to a full response rather than an error.
    fn effective_range(record: &FileRecord, requested: Option<ByteRange>) -> Option<ByteRange> {
        let requested = requested?;
        let size = record.size? as u64;
        if size == 0 || requested.start >= size || requested.start > requested.end {
            return None;
        }
        Some(ByteRange {
            start: requested.start,
            end: requested.end.min(size - 1),
        })
    }
}

#[async_trait]
impl IDownloadFileUseCase for DownloadFileUseCase {
    async fn execute(
        &self,
        id: Uuid,
        range: Option<ByteRange>,
    ) -> Result<DownloadPayload, DownloadFileError> {
        let record = self
            .files
            .find_by_id(id)
            .await
            .map_err(|e| DownloadFileError::RepositoryError(e.to_string()))?
            .ok_or(DownloadFileError::NotFound)?;

        if record.is_soft_deleted() {
            // terminal rows answer Gone, merely soft-deleted ones 404
            return if record.status == FileStatus::Deleted {
                Err(DownloadFileError::Gone)
            } else {
                Err(DownloadFileError::NotFound)
            };
        }

        let record = if record.optimization_in_flight() {
            self.engine
                .wait_until_ready(record)
                .await
                .map_err(|e| match e {
                    OptimizationWaitError::Failed(message) => {
                        DownloadFileError::OptimizationFailed(message)
                    }
                    OptimizationWaitError::Timeout => DownloadFileError::WaitTimeout,
                    OptimizationWaitError::Gone => DownloadFileError::NotFound,
                    OptimizationWaitError::Repository(message) => {
                        DownloadFileError::RepositoryError(message)
                    }
                })?
        } else {
            record
        };

        if let Some(error) = record.optimization_error.clone() {
            if record.status == FileStatus::Failed {
                return Err(DownloadFileError::OptimizationFailed(error));
            }
        }
        if record.status != FileStatus::Ready || record.s3_key.is_empty() {
            return Err(DownloadFileError::NotReady);
        }

        let range = Self::effective_range(&record, range);
        let blob = self
            .blobs
            .get(&record.s3_key, range)
            .await
            .map_err(|e| DownloadFileError::Storage(e.to_string()))?;

        Ok(DownloadPayload {
            record,
            stream: blob.stream,
            content_length: blob.content_length,
            total_size: blob.total_size,
            range,
        })
    }
}
