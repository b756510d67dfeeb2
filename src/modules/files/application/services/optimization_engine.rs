//! Asynchronous image optimization.
//!
//! The database row is the task: `(id, optimization_status)` is claimed by a
//! conditional update, a spawned worker fulfills it, and readers poll the row.
//! Crashes leave the claim behind for the cleanup job's stuck-optimization
//! aging pass; there is no broker to drain.

use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::files::application::domain::{
    entities::{FileRecord, OptimizationStatus},
    mime, storage_keys,
};
use crate::files::application::ports::outgoing::blob_storage::{BlobByteStream, BlobStore};
use crate::files::application::ports::outgoing::db::{
    CompleteOptimization, FileRepository, FileRepositoryError,
};
use crate::files::application::ports::outgoing::image_processor::{
    ImageProcessor, ProcessParams,
};
use crate::files::application::domain::policies::upload_policy::UploadPolicy;
use crate::shared::config::CompressionConfig;

/// Reader poll cadence; cheap because only one row is read per tick.
const POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Output formats a caller may request; anything else falls back to the
/// configured default.
const ALLOWED_FORMATS: &[&str] = &["webp", "avif", "jpeg", "png"];

#[derive(Debug, Clone, Error)]
pub enum OptimizationWaitError {
    #[error("optimization failed: {0}")]
    Failed(String),

    #[error("timed out waiting for optimization")]
    Timeout,

    /// The record was collapsed into a duplicate while we waited.
    #[error("file no longer exists")]
    Gone,

    #[error("database error: {0}")]
    Repository(String),
}

pub struct OptimizationEngine {
    files: Arc<dyn FileRepository>,
    blobs: Arc<dyn BlobStore>,
    processor: Arc<dyn ImageProcessor>,
    compression: CompressionConfig,
    policy: UploadPolicy,
    wait_timeout: Duration,
}

impl OptimizationEngine {
    pub fn new(
        files: Arc<dyn FileRepository>,
        blobs: Arc<dyn BlobStore>,
        processor: Arc<dyn ImageProcessor>,
        compression: CompressionConfig,
        policy: UploadPolicy,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            files,
            blobs,
            processor,
            compression,
            policy,
            wait_timeout,
        }
    }

    /// Claim `pending -> processing` and run the worker in the background.
    /// Losing the claim is not an error; someone else is on it.
    pub fn enqueue(self: &Arc<Self>, file_id: Uuid) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run(file_id).await;
        });
    }

    pub async fn run(&self, file_id: Uuid) {
        match self
            .files
            .claim_optimization(
                file_id,
                OptimizationStatus::Pending,
                OptimizationStatus::Processing,
            )
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(%file_id, "optimization already claimed elsewhere");
                return;
            }
            Err(e) => {
                warn!(%file_id, error = %e, "optimization claim failed");
                return;
            }
        }

        if let Err(message) = self.process_claimed(file_id).await {
            error!(%file_id, error = %message, "optimization failed");
            if let Err(e) = self.files.fail_optimization(file_id, &message).await {
                warn!(%file_id, error = %e, "could not record optimization failure");
            }
        }
    }

    async fn process_claimed(&self, file_id: Uuid) -> Result<(), String> {
        let record = self
            .files
            .find_by_id(file_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "record vanished after claim".to_string())?;

        let original_key = record
            .original_s3_key
            .clone()
            .ok_or_else(|| "record has no original blob key".to_string())?;
        let original_mime = record
            .original_mime_type
            .clone()
            .unwrap_or_else(|| record.mime_type.clone());

        let bytes = self
            .blobs
            .get_bytes(&original_key, self.policy.image_max_bytes)
            .await
            .map_err(|e| format!("could not read original blob: {e}"))?;

        let user_params: Option<ProcessParams> = record
            .optimization_params
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok());
        let params = Self::merge_params(&self.compression, user_params.as_ref());

        let processed = self
            .processor
            .process(bytes, &record.filename, &original_mime, &params)
            .await
            .map_err(|e| e.to_string())?;

        let checksum = format!("sha256:{}", hex::encode(Sha256::digest(&processed.bytes)));
        let size = processed.bytes.len() as i64;

        // Dedup collapse: identical optimized output already serves another
        // ready record.
        if let Some(sibling) = self
            .files
            .find_ready_sibling(&checksum, &processed.mime_type)
            .await
            .map_err(|e| e.to_string())?
        {
            if sibling.id != file_id {
                info!(loser = %file_id, winner = %sibling.id, "optimization dedup collapse");
                self.collapse(file_id, &original_key).await;
                return Ok(());
            }
        }

        let final_key = storage_keys::content_key(&checksum, &processed.mime_type);
        self.blobs
            .put_stream(
                &final_key,
                &processed.mime_type,
                Self::bytes_stream(processed.bytes),
            )
            .await
            .map_err(|e| format!("could not store optimized blob: {e}"))?;

        match self
            .files
            .complete_optimization(CompleteOptimization {
                id: file_id,
                s3_key: final_key,
                mime_type: processed.mime_type,
                size,
                checksum,
            })
            .await
        {
            Ok(updated) => {
                info!(
                    %file_id,
                    size,
                    mime_type = %updated.mime_type,
                    "optimization complete"
                );
                if let Err(e) = self.blobs.delete(&original_key).await {
                    // cleanup ages out leftover originals
                    warn!(%file_id, key = %original_key, error = %e, "could not delete original blob");
                }
                Ok(())
            }
            Err(FileRepositoryError::DuplicateContent) => {
                // raced another record to the same content identity; the
                // winner's row already serves this blob
                info!(loser = %file_id, "optimization lost content race, collapsing");
                self.collapse(file_id, &original_key).await;
                Ok(())
            }
            Err(FileRepositoryError::NotFound) => {
                // lost the processing claim; leave everything for cleanup
                warn!(%file_id, "optimization completion lost its claim");
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// The losing side of a dedup: remove the redundant record and its
    /// solely-owned original blob. The shared content blob stays.
    async fn collapse(&self, loser: Uuid, original_key: &str) {
        if let Err(e) = self.files.hard_delete(loser).await {
            warn!(%loser, error = %e, "could not hard-delete collapsed record");
        }
        if let Err(e) = self.blobs.delete(original_key).await {
            warn!(%loser, key = %original_key, error = %e, "could not delete original blob");
        }
    }

    /// Block a read until the file's optimization resolves. Kicks a worker if
    /// the row is still `pending`, then polls.
    pub async fn wait_until_ready(
        self: &Arc<Self>,
        record: FileRecord,
    ) -> Result<FileRecord, OptimizationWaitError> {
        let deadline = tokio::time::Instant::now() + self.wait_timeout;
        let file_id = record.id;
        let mut current = record;
        let mut kicked = false;

        loop {
            match current.optimization_status {
                None | Some(OptimizationStatus::Ready) => return Ok(current),
                Some(OptimizationStatus::Failed) => {
                    return Err(OptimizationWaitError::Failed(
                        current
                            .optimization_error
                            .unwrap_or_else(|| "optimization failed".to_string()),
                    ));
                }
                Some(OptimizationStatus::Pending) => {
                    if !kicked {
                        kicked = true;
                        self.enqueue(file_id);
                    }
                }
                Some(OptimizationStatus::Processing) => {}
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(OptimizationWaitError::Timeout);
            }
            sleep(POLL_INTERVAL).await;

            current = self
                .files
                .find_by_id(file_id)
                .await
                .map_err(|e| OptimizationWaitError::Repository(e.to_string()))?
                .ok_or(OptimizationWaitError::Gone)?;
        }
    }

    /// Best-effort EXIF extraction after a successful image upload. Never
    /// fails the upload; every error is swallowed and logged.
    pub fn spawn_exif_extraction(self: &Arc<Self>, record: FileRecord) {
        if !mime::is_image(&record.mime_type) {
            return;
        }

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let key = record
                .original_s3_key
                .clone()
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| record.s3_key.clone());
            if key.is_empty() {
                return;
            }

            let bytes = match engine
                .blobs
                .get_bytes(&key, engine.policy.image_max_bytes)
                .await
            {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(file_id = %record.id, error = %e, "exif: could not read blob");
                    return;
                }
            };

            let source_mime = record
                .original_mime_type
                .clone()
                .unwrap_or_else(|| record.mime_type.clone());

            match engine
                .processor
                .exif(bytes, &record.filename, &source_mime)
                .await
            {
                Ok(Some(exif)) => {
                    if let Err(e) = engine.files.set_exif(record.id, exif).await {
                        warn!(file_id = %record.id, error = %e, "exif: could not store result");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(file_id = %record.id, error = %e, "exif extraction failed");
                }
            }
        });
    }

    /// Merge user wishes against the configured policy. With
    /// `force_enabled` the policy wins outright; otherwise user values are
    /// clamped (quality/effort/dimension ceilings) and unknown formats fall
    /// back to the configured one.
    pub(crate) fn merge_params(
        config: &CompressionConfig,
        user: Option<&ProcessParams>,
    ) -> ProcessParams {
        let defaults = ProcessParams {
            format: Some(config.format.clone()),
            max_dimension: Some(config.max_dimension),
            width: None,
            height: None,
            quality: Some(config.quality),
            effort: Some(config.effort),
            lossless: Some(config.lossless),
            strip_metadata: Some(config.strip_metadata),
            auto_orient: Some(config.auto_orient),
            chroma_subsampling: Some(config.chroma_subsampling.clone()),
        };

        if config.force_enabled {
            return defaults;
        }
        let Some(user) = user else {
            return defaults;
        };

        ProcessParams {
            format: user
                .format
                .as_deref()
                .map(str::to_ascii_lowercase)
                .filter(|format| ALLOWED_FORMATS.contains(&format.as_str()))
                .or(defaults.format),
            max_dimension: user
                .max_dimension
                .map(|d| d.min(config.max_dimension))
                .or(defaults.max_dimension),
            width: None,
            height: None,
            quality: user.quality.map(|q| q.min(config.quality)).or(defaults.quality),
            effort: user.effort.map(|e| e.min(config.effort)).or(defaults.effort),
            lossless: user.lossless.or(defaults.lossless),
            strip_metadata: user.strip_metadata.or(defaults.strip_metadata),
            auto_orient: user.auto_orient.or(defaults.auto_orient),
            chroma_subsampling: user
                .chroma_subsampling
                .clone()
                .or(defaults.chroma_subsampling),
        }
    }

    fn bytes_stream(bytes: Vec<u8>) -> BlobByteStream {
        futures::stream::once(async move { Ok(bytes::Bytes::from(bytes)) }).boxed()
    }
}
