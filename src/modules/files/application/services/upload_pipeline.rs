//! Streaming ingest: hash-while-upload, content-addressed promotion and
//! duplicate collapse.
//!
//! Bytes flow through a probe that feeds a SHA-256, counts, and enforces the
//! per-MIME-family ceiling while forwarding chunks straight into blob
//! storage. The content identity is only known when the stream ends, so
//! plain uploads land under `tmp/<uuid>` and are promoted to their
//! content-addressed key by a server-side copy.

use bytes::Bytes;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::io;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

use crate::files::application::domain::{
    entities::{FileRecord, FileTags, OptimizationStatus},
    filename, mime,
    policies::upload_policy::{UploadPolicy, UploadPolicyError},
    storage_keys,
};
use crate::files::application::ports::outgoing::blob_storage::{
    BlobByteStream, BlobStore, BlobStoreError,
};
use crate::files::application::ports::outgoing::db::{
    FileRepository, FileRepositoryError, NewFileRecord, PromoteToReady,
};
use crate::files::application::ports::outgoing::image_processor::{
    ImageProcessor, ProcessParams,
};
use crate::files::application::services::optimization_engine::OptimizationEngine;
use crate::shared::config::CompressionConfig;

#[derive(Debug, Clone, Error)]
pub enum UploadError {
    #[error(transparent)]
    Policy(#[from] UploadPolicyError),

    #[error("image processing service is unavailable")]
    OptimizerUnavailable,

    #[error("source stream failed: {0}")]
    Source(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Database(String),
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub mime_type: String,
    pub tags: FileTags,
    pub metadata: serde_json::Value,
    /// User-requested optimization parameters; presence opts an image upload
    /// into the optimization pipeline.
    pub compress_params: Option<ProcessParams>,
}

/// Shared state of the hashing probe threaded through the storage put.
struct StreamProbe {
    hasher: Sha256,
    bytes: u64,
    limit: u64,
    exceeded: bool,
}

pub struct UploadPipeline {
    files: Arc<dyn FileRepository>,
    blobs: Arc<dyn BlobStore>,
    processor: Arc<dyn ImageProcessor>,
    engine: Arc<OptimizationEngine>,
    policy: UploadPolicy,
    compression: CompressionConfig,
    bucket: String,
}

impl UploadPipeline {
    pub fn new(
        files: Arc<dyn FileRepository>,
        blobs: Arc<dyn BlobStore>,
        processor: Arc<dyn ImageProcessor>,
        engine: Arc<OptimizationEngine>,
        policy: UploadPolicy,
        compression: CompressionConfig,
        bucket: String,
    ) -> Self {
        Self {
            files,
            blobs,
            processor,
            engine,
            policy,
            compression,
            bucket,
        }
    }

    /// Wrap `source` so every chunk is hashed and counted before it reaches
    /// storage; breaching `limit` fails the stream (which aborts the put).
    fn probed_stream(
        source: BlobByteStream,
        limit: u64,
    ) -> (BlobByteStream, Arc<Mutex<StreamProbe>>) {
        let probe = Arc::new(Mutex::new(StreamProbe {
            hasher: Sha256::new(),
            bytes: 0,
            limit,
            exceeded: false,
        }));

        let shared = Arc::clone(&probe);
        let stream = source
            .map(move |item| match item {
                Ok(chunk) => {
                    let mut probe = shared.lock().expect("stream probe lock poisoned");
                    probe.bytes += chunk.len() as u64;
                    if probe.bytes > probe.limit {
                        probe.exceeded = true;
                        return Err(io::Error::other("size ceiling exceeded"));
                    }
                    probe.hasher.update(&chunk);
                    Ok(chunk)
                }
                Err(e) => Err(e),
            })
            .boxed();

        (stream, probe)
    }

    /// Guaranteed-`ready` upload. The returned record may still carry
    /// `optimization_status=pending`; readers block on that separately.
    pub async fn upload_stream(
        &self,
        source: BlobByteStream,
        request: UploadRequest,
    ) -> Result<FileRecord, UploadError> {
        self.policy.check_mime_type(&request.mime_type)?;

        let display_name = filename::sanitize(&request.filename);
        let wants_optimization = mime::is_image(&request.mime_type)
            && (self.compression.force_enabled || request.compress_params.is_some());

        let chosen_key = if wants_optimization {
            storage_keys::originals_key()
        } else {
            storage_keys::tmp_key()
        };

        let record = self
            .files
            .create(NewFileRecord {
                filename: display_name,
                tags: request.tags.clone(),
                mime_type: request.mime_type.clone(),
                // the served key is unknown until optimization lands
                s3_key: if wants_optimization {
                    String::new()
                } else {
                    chosen_key.clone()
                },
                s3_bucket: self.bucket.clone(),
                metadata: request.metadata.clone(),
                original_mime_type: wants_optimization.then(|| request.mime_type.clone()),
                original_s3_key: wants_optimization.then(|| chosen_key.clone()),
                optimization_status: wants_optimization.then_some(OptimizationStatus::Pending),
                optimization_params: request
                    .compress_params
                    .as_ref()
                    .and_then(|params| serde_json::to_value(params).ok()),
            })
            .await
            .map_err(|e| UploadError::Database(e.to_string()))?;

        // Fail fast before spending bandwidth on a stream the optimizer
        // cannot consume.
        if wants_optimization {
            if let Err(e) = self.processor.health().await {
                warn!(file_id = %record.id, error = %e, "optimizer liveness probe failed");
                let _ = self.files.mark_failed(record.id).await;
                return Err(UploadError::OptimizerUnavailable);
            }
        }

        let limit = self.policy.max_bytes_for(&request.mime_type);
        let (stream, probe) = Self::probed_stream(source, limit);

        if let Err(e) = self
            .blobs
            .put_stream(&chosen_key, &request.mime_type, stream)
            .await
        {
            let _ = self.blobs.delete(&chosen_key).await;
            let _ = self.files.mark_failed(record.id).await;

            let exceeded = probe
                .lock()
                .expect("stream probe lock poisoned")
                .exceeded;
            if exceeded {
                return Err(UploadError::Policy(
                    self.policy.too_large_error(&request.mime_type),
                ));
            }
            return Err(match e {
                BlobStoreError::SourceAborted(message) => UploadError::Source(message),
                other => UploadError::Storage(other.to_string()),
            });
        }

        let (checksum, size) = {
            let mut probe = probe.lock().expect("stream probe lock poisoned");
            let digest = probe.hasher.finalize_reset();
            (format!("sha256:{}", hex::encode(digest)), probe.bytes as i64)
        };

        if wants_optimization {
            let record = self
                .files
                .promote_original_ready(record.id, &checksum, size)
                .await
                .map_err(|e| UploadError::Database(e.to_string()))?;

            self.engine.enqueue(record.id);
            self.engine.spawn_exif_extraction(record.clone());
            return Ok(record);
        }

        // ------------------------------------------------------------------
        // Plain path: dedup, then promote to the content-addressed key.
        // ------------------------------------------------------------------

        if let Some(existing) = self
            .files
            .find_ready_sibling(&checksum, &request.mime_type)
            .await
            .map_err(|e| UploadError::Database(e.to_string()))?
        {
            info!(
                new = %record.id,
                existing = %existing.id,
                "duplicate upload collapsed before promotion"
            );
            let _ = self.blobs.delete(&chosen_key).await;
            let _ = self.files.hard_delete(record.id).await;
            return Ok(existing);
        }

        let final_key = storage_keys::content_key(&checksum, &request.mime_type);

        if let Err(e) = self.blobs.copy(&chosen_key, &final_key).await {
            let _ = self.blobs.delete(&chosen_key).await;
            let _ = self.files.mark_failed(record.id).await;
            return Err(UploadError::Storage(e.to_string()));
        }
        let _ = self.blobs.delete(&chosen_key).await;

        match self
            .files
            .promote_to_ready(PromoteToReady {
                id: record.id,
                checksum: checksum.clone(),
                size,
                s3_key: final_key,
            })
            .await
        {
            Ok(promoted) => {
                if mime::is_image(&promoted.mime_type) {
                    self.engine.spawn_exif_extraction(promoted.clone());
                }
                Ok(promoted)
            }
            Err(FileRepositoryError::DuplicateContent) => {
                // lost the promotion race; the winner's blob shares our key
                match self
                    .files
                    .find_ready_sibling(&checksum, &request.mime_type)
                    .await
                    .map_err(|e| UploadError::Database(e.to_string()))?
                {
                    Some(sibling) => {
                        info!(
                            new = %record.id,
                            existing = %sibling.id,
                            "duplicate upload collapsed on unique violation"
                        );
                        let _ = self.files.hard_delete(record.id).await;
                        Ok(sibling)
                    }
                    None => Err(UploadError::Database(
                        "unique violation without a visible sibling".to_string(),
                    )),
                }
            }
            Err(e) => {
                let _ = self.files.mark_failed(record.id).await;
                Err(UploadError::Database(e.to_string()))
            }
        }
    }

    /// Single-chunk in-memory source.
    pub fn bytes_stream(bytes: Vec<u8>) -> BlobByteStream {
        futures::stream::once(async move { Ok(Bytes::from(bytes)) }).boxed()
    }
}
