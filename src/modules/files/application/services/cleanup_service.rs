//! The cleanup reconciler: a periodic, idempotent sweep that converges
//! storage and database toward the lifecycle invariants.
//!
//! Every cycle runs five passes in order: soft-deleted files, corrupted
//! records, bad-status aging, orphaned temp uploads, old thumbnails. Blob
//! deletes always precede the database transaction that removes rows, so a
//! crash mid-cycle leaves at worst an orphaned row pointing at an absent
//! blob, which the next cycle re-classifies and finishes. Partial progress
//! is preserved; each pass is itself the retry.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::files::application::domain::entities::{FileRecord, FileStatus, ThumbnailRecord};
use crate::files::application::domain::storage_keys;
use crate::files::application::ports::outgoing::blob_storage::{
    BatchDeleteOutcome, BlobStore, BlobStoreError,
};
use crate::files::application::ports::outgoing::db::{FileRepository, ThumbnailRepository};
use crate::shared::config::CleanupConfig;

/// Statuses a soft-deleted row may be claimed from. `deleted` is included:
/// a row parked there by a retry-delete still needs its hard delete.
const SOFT_DELETE_CLAIMABLE: &[FileStatus] = &[
    FileStatus::Ready,
    FileStatus::Uploading,
    FileStatus::Failed,
    FileStatus::Missing,
    FileStatus::Deleting,
    FileStatus::Deleted,
];

const BAD_STATUSES: &[FileStatus] = &[
    FileStatus::Uploading,
    FileStatus::Deleting,
    FileStatus::Failed,
    FileStatus::Missing,
];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupStats {
    pub files_hard_deleted: u64,
    pub blobs_deleted: u64,
    pub thumbnails_deleted: u64,
    pub deletes_retried: u64,
    pub errors: u64,
}

pub struct CleanupService {
    files: Arc<dyn FileRepository>,
    thumbnails: Arc<dyn ThumbnailRepository>,
    blobs: Arc<dyn BlobStore>,
    config: CleanupConfig,
}

impl CleanupService {
    pub fn new(
        files: Arc<dyn FileRepository>,
        thumbnails: Arc<dyn ThumbnailRepository>,
        blobs: Arc<dyn BlobStore>,
        config: CleanupConfig,
    ) -> Self {
        Self {
            files,
            thumbnails,
            blobs,
            config,
        }
    }

    pub async fn run_cycle(&self) -> CleanupStats {
        let mut stats = CleanupStats::default();

        self.pass_soft_deleted(&mut stats).await;
        self.pass_corrupted(&mut stats).await;
        self.pass_bad_status(&mut stats).await;
        self.pass_orphaned_uploads(&mut stats).await;
        self.pass_old_thumbnails(&mut stats).await;

        info!(
            files_hard_deleted = stats.files_hard_deleted,
            blobs_deleted = stats.blobs_deleted,
            thumbnails_deleted = stats.thumbnails_deleted,
            deletes_retried = stats.deletes_retried,
            errors = stats.errors,
            "cleanup cycle complete"
        );
        stats
    }

    // ------------------------------------------------------------------
    // (a) soft-deleted files
    // ------------------------------------------------------------------

    async fn pass_soft_deleted(&self, stats: &mut CleanupStats) {
        let cutoff =
            now() - Duration::minutes(self.config.soft_deleted_retry_delay_minutes);

        let batch = match self
            .files
            .select_soft_deleted(cutoff, self.config.batch_size)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "cleanup: soft-deleted scan failed");
                stats.errors += 1;
                return;
            }
        };

        for record in batch {
            if let Err(e) = self.reclaim_soft_deleted(&record, stats).await {
                warn!(file_id = %record.id, error = %e, "cleanup: soft-delete reclaim failed");
                stats.errors += 1;
            }
        }
    }

    async fn reclaim_soft_deleted(
        &self,
        record: &FileRecord,
        stats: &mut CleanupStats,
    ) -> Result<(), String> {
        let claimed = self
            .files
            .claim_for_deletion(record.id, SOFT_DELETE_CLAIMABLE)
            .await
            .map_err(|e| e.to_string())?;
        if !claimed {
            return Ok(());
        }

        // Reference count over live rows decides whether the shared content
        // blob may go; the original blob is solely owned either way.
        let reclaim_blob = match record.checksum.as_deref() {
            Some(checksum) => {
                self.files
                    .count_other_live_refs(checksum, &record.mime_type, record.id)
                    .await
                    .map_err(|e| e.to_string())?
                    == 0
            }
            None => true,
        };

        let thumbnails = self
            .thumbnails
            .list_by_file(record.id)
            .await
            .map_err(|e| e.to_string())?;
        let thumbnail_keys: Vec<String> =
            thumbnails.iter().map(|t| t.s3_key.clone()).collect();

        let mut own_keys: Vec<String> = Vec::new();
        if reclaim_blob {
            if !record.s3_key.is_empty() {
                own_keys.push(record.s3_key.clone());
            }
            if let Some(original) = record
                .original_s3_key
                .as_deref()
                .filter(|k| !k.is_empty() && *k != record.s3_key)
            {
                own_keys.push(original.to_string());
            }
        }

        let outcome = self
            .delete_blobs(thumbnail_keys.iter().chain(own_keys.iter()))
            .await?;
        stats.blobs_deleted += outcome.deleted_keys.len() as u64;

        let deleted_thumbnail_ids = deleted_thumbnail_ids(&thumbnails, &outcome);
        stats.thumbnails_deleted += deleted_thumbnail_ids.len() as u64;

        let thumbnails_gone = outcome.all_deleted(&thumbnail_keys);
        let own_blobs_gone = reclaim_blob && outcome.all_deleted(&own_keys);
        let delete_file_row = thumbnails_gone && own_blobs_gone;

        self.files
            .hard_delete_with_thumbnails(record.id, &deleted_thumbnail_ids, delete_file_row)
            .await
            .map_err(|e| e.to_string())?;

        if delete_file_row {
            stats.files_hard_deleted += 1;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // (b) corrupted records
    // ------------------------------------------------------------------

    async fn pass_corrupted(&self, stats: &mut CleanupStats) {
        let batch = match self.files.select_corrupted(self.config.batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "cleanup: corrupted scan failed");
                stats.errors += 1;
                return;
            }
        };

        for record in batch {
            // inconsistent records skip the reference check entirely
            match self
                .files
                .claim_for_deletion(record.id, &[record.status])
                .await
            {
                Ok(true) => {
                    if let Err(e) = self.reclaim_completely(&record, stats).await {
                        warn!(file_id = %record.id, error = %e, "cleanup: corrupted reclaim failed");
                        stats.errors += 1;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(file_id = %record.id, error = %e, "cleanup: corrupted claim failed");
                    stats.errors += 1;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // (c) bad-status aging
    // ------------------------------------------------------------------

    async fn pass_bad_status(&self, stats: &mut CleanupStats) {
        let cutoff = now() - Duration::days(self.config.bad_status_ttl_days);

        let batch = match self
            .files
            .select_stale_status(BAD_STATUSES, cutoff, self.config.batch_size)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "cleanup: bad-status scan failed");
                stats.errors += 1;
                return;
            }
        };

        for record in batch {
            let result = if record.status == FileStatus::Deleting {
                self.retry_stuck_deletion(&record, stats).await
            } else {
                match self
                    .files
                    .claim_for_deletion(record.id, &[record.status])
                    .await
                {
                    Ok(true) => self.reclaim_completely(&record, stats).await,
                    Ok(false) => Ok(()),
                    Err(e) => Err(e.to_string()),
                }
            };

            if let Err(e) = result {
                warn!(file_id = %record.id, error = %e, "cleanup: bad-status handling failed");
                stats.errors += 1;
            }
        }

        self.age_stuck_optimizations(stats).await;
    }

    /// Crashed workers leave rows parked in `pending`/`processing`; readers
    /// would block on them forever. Flip them to failed so waits resolve.
    async fn age_stuck_optimizations(&self, stats: &mut CleanupStats) {
        let cutoff = now()
            - Duration::milliseconds(self.config.stuck_optimization_timeout_ms);

        let batch = match self
            .files
            .select_stuck_optimizations(cutoff, self.config.batch_size)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "cleanup: stuck-optimization scan failed");
                stats.errors += 1;
                return;
            }
        };

        for record in batch {
            warn!(file_id = %record.id, "cleanup: aging out stuck optimization");
            if let Err(e) = self
                .files
                .fail_optimization(record.id, "optimization timed out")
                .await
            {
                warn!(file_id = %record.id, error = %e, "cleanup: could not fail stuck optimization");
                stats.errors += 1;
            }
        }
    }

    /// A row stuck in `deleting`: retry the blob delete and park the row in
    /// `deleted` on success or when the blob is already absent; the
    /// soft-delete pass hard-deletes it later.
    async fn retry_stuck_deletion(
        &self,
        record: &FileRecord,
        stats: &mut CleanupStats,
    ) -> Result<(), String> {
        stats.deletes_retried += 1;

        let mut keys: Vec<String> = Vec::new();
        if !record.s3_key.is_empty() {
            keys.push(record.s3_key.clone());
        }
        if let Some(original) = record
            .original_s3_key
            .as_deref()
            .filter(|k| !k.is_empty() && *k != record.s3_key)
        {
            keys.push(original.to_string());
        }

        let mut all_gone = true;
        for key in &keys {
            // a blob that is already absent needs no delete call
            if matches!(self.blobs.head(key).await, Err(BlobStoreError::NotFound)) {
                continue;
            }
            match self.blobs.delete(key).await {
                Ok(()) | Err(BlobStoreError::NotFound) => stats.blobs_deleted += 1,
                Err(e) => {
                    all_gone = false;
                    warn!(file_id = %record.id, key = %key, error = %e, "cleanup: retry-deletion still failing");
                }
            }
        }

        if all_gone {
            self.files
                .mark_deleted(record.id)
                .await
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // (d) orphaned temp uploads
    // ------------------------------------------------------------------

    async fn pass_orphaned_uploads(&self, stats: &mut CleanupStats) {
        let upload_cutoff = now() - Duration::days(self.config.tmp_ttl_days);
        let originals_cutoff = now() - Duration::days(self.config.originals_ttl_days);

        let batch = match self
            .files
            .select_orphaned_uploads(upload_cutoff, self.config.batch_size)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "cleanup: orphan scan failed");
                stats.errors += 1;
                return;
            }
        };

        for record in batch {
            // failed rows keep their original blob for a longer forensic
            // window than plain abandoned uploads
            if record.status == FileStatus::Failed
                && record.status_changed_at > originals_cutoff
            {
                continue;
            }

            match self
                .files
                .claim_for_deletion(record.id, &[record.status])
                .await
            {
                Ok(true) => {
                    if let Err(e) = self.reclaim_completely(&record, stats).await {
                        warn!(file_id = %record.id, error = %e, "cleanup: orphan reclaim failed");
                        stats.errors += 1;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(file_id = %record.id, error = %e, "cleanup: orphan claim failed");
                    stats.errors += 1;
                }
            }
        }

        // operator signal: transient prefixes should trend toward empty
        for prefix in [storage_keys::TMP_PREFIX, storage_keys::ORIGINALS_PREFIX] {
            match self.blobs.list(prefix, self.config.s3_list_page_size).await {
                Ok(keys) if !keys.is_empty() => {
                    info!(prefix, count = keys.len(), "transient keys still present");
                }
                Ok(_) => {}
                Err(e) => warn!(prefix, error = %e, "cleanup: prefix listing failed"),
            }
        }
    }

    // ------------------------------------------------------------------
    // (e) old thumbnails
    // ------------------------------------------------------------------

    async fn pass_old_thumbnails(&self, stats: &mut CleanupStats) {
        let cutoff = now() - Duration::days(self.config.thumbnails_ttl_days);

        let batch = match self
            .thumbnails
            .select_stale(cutoff, self.config.batch_size)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "cleanup: thumbnail scan failed");
                stats.errors += 1;
                return;
            }
        };
        if batch.is_empty() {
            return;
        }

        let keys: Vec<String> = batch.iter().map(|t| t.s3_key.clone()).collect();
        let outcome = match self.delete_blobs(keys.iter()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "cleanup: thumbnail blob delete failed");
                stats.errors += 1;
                return;
            }
        };
        stats.blobs_deleted += outcome.deleted_keys.len() as u64;

        for thumbnail in &batch {
            if !outcome.deleted_keys.contains(&thumbnail.s3_key) {
                continue;
            }
            // the cutoff guard lets a concurrently-accessed row survive
            match self
                .thumbnails
                .delete_if_still_stale(thumbnail.id, cutoff)
                .await
            {
                Ok(true) => stats.thumbnails_deleted += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(thumbnail_id = %thumbnail.id, error = %e, "cleanup: thumbnail row delete failed");
                    stats.errors += 1;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // shared plumbing
    // ------------------------------------------------------------------

    /// Unconditional reclamation of a claimed record: thumbnails, served
    /// blob, original blob. Hard-deletes the row only when everything is
    /// confirmed gone.
    async fn reclaim_completely(
        &self,
        record: &FileRecord,
        stats: &mut CleanupStats,
    ) -> Result<(), String> {
        let thumbnails = self
            .thumbnails
            .list_by_file(record.id)
            .await
            .map_err(|e| e.to_string())?;
        let thumbnail_keys: Vec<String> =
            thumbnails.iter().map(|t| t.s3_key.clone()).collect();

        let mut own_keys: Vec<String> = Vec::new();
        if !record.s3_key.is_empty() {
            own_keys.push(record.s3_key.clone());
        }
        if let Some(original) = record
            .original_s3_key
            .as_deref()
            .filter(|k| !k.is_empty() && *k != record.s3_key)
        {
            own_keys.push(original.to_string());
        }

        let outcome = self
            .delete_blobs(thumbnail_keys.iter().chain(own_keys.iter()))
            .await?;
        stats.blobs_deleted += outcome.deleted_keys.len() as u64;

        let deleted_thumbnail_ids = deleted_thumbnail_ids(&thumbnails, &outcome);
        stats.thumbnails_deleted += deleted_thumbnail_ids.len() as u64;

        let everything_gone =
            outcome.all_deleted(&thumbnail_keys) && outcome.all_deleted(&own_keys);

        self.files
            .hard_delete_with_thumbnails(record.id, &deleted_thumbnail_ids, everything_gone)
            .await
            .map_err(|e| e.to_string())?;

        if everything_gone {
            stats.files_hard_deleted += 1;
        }
        Ok(())
    }

    async fn delete_blobs<'a, I: Iterator<Item = &'a String>>(
        &self,
        keys: I,
    ) -> Result<BatchDeleteOutcome, String> {
        let keys: Vec<String> = keys.cloned().collect();
        if keys.is_empty() {
            return Ok(BatchDeleteOutcome::default());
        }
        self.blobs
            .delete_batch(&keys)
            .await
            .map_err(|e| e.to_string())
    }
}

fn deleted_thumbnail_ids(
    thumbnails: &[ThumbnailRecord],
    outcome: &BatchDeleteOutcome,
) -> Vec<Uuid> {
    thumbnails
        .iter()
        .filter(|t| outcome.deleted_keys.contains(&t.s3_key))
        .map(|t| t.id)
        .collect()
}

fn now() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::application::domain::entities::FileTags;
    use crate::files::application::ports::outgoing::db::NewFileRecord;
    use crate::files::application::services::test_support::{
        InMemoryBlobStore, InMemoryFileRepository, InMemoryThumbnailRepository,
    };

    fn config() -> CleanupConfig {
        CleanupConfig {
            enabled: true,
            cron: "0 */15 * * * *".to_string(),
            bad_status_ttl_days: 1,
            soft_deleted_retry_delay_minutes: 0,
            thumbnails_ttl_days: 30,
            batch_size: 100,
            tmp_ttl_days: 1,
            originals_ttl_days: 7,
            s3_list_page_size: 1000,
            stuck_upload_timeout_ms: 3_600_000,
            stuck_delete_timeout_ms: 3_600_000,
            stuck_optimization_timeout_ms: 1_800_000,
        }
    }

    fn service(
        files: Arc<InMemoryFileRepository>,
        thumbnails: Arc<InMemoryThumbnailRepository>,
        blobs: Arc<InMemoryBlobStore>,
    ) -> CleanupService {
        CleanupService::new(files, thumbnails, blobs, config())
    }

    async fn seed_ready_file(
        files: &Arc<InMemoryFileRepository>,
        blobs: &Arc<InMemoryBlobStore>,
        checksum: &str,
        tag: &str,
    ) -> FileRecord {
        let key = format!("ab/cd/{}", checksum.trim_start_matches("sha256:"));
        blobs.seed(&key, b"content".to_vec());

        let record = files
            .create(NewFileRecord {
                filename: "file.bin".to_string(),
                tags: FileTags {
                    app_id: Some(tag.to_string()),
                    user_id: None,
                    purpose: None,
                },
                mime_type: "application/octet-stream".to_string(),
                s3_key: key.clone(),
                s3_bucket: "media".to_string(),
                metadata: serde_json::json!({}),
                original_mime_type: None,
                original_s3_key: None,
                optimization_status: None,
                optimization_params: None,
            })
            .await
            .unwrap();

        // promote manually so both records can share one checksum
        let mut promoted = files.find_by_id(record.id).await.unwrap().unwrap();
        promoted.status = FileStatus::Ready;
        promoted.checksum = Some(checksum.to_string());
        promoted.size = Some(7);
        promoted.uploaded_at = Some(Utc::now().fixed_offset());
        files.put_record(promoted.clone());
        promoted
    }

    #[tokio::test]
    async fn test_quiescent_cycle_is_a_noop() {
        let files = Arc::new(InMemoryFileRepository::new());
        let thumbnails = Arc::new(InMemoryThumbnailRepository::new());
        let blobs = Arc::new(InMemoryBlobStore::new());

        let stats = service(files, thumbnails, blobs).run_cycle().await;
        assert_eq!(stats, CleanupStats::default());
    }

    #[tokio::test]
    async fn test_shared_blob_survives_until_last_reference_dies() {
        let files = Arc::new(InMemoryFileRepository::new());
        let thumbnails = Arc::new(InMemoryThumbnailRepository::new());
        let blobs = Arc::new(InMemoryBlobStore::new());
        let cleanup = service(files.clone(), thumbnails.clone(), blobs.clone());

        let checksum = "sha256:feed";
        let a = seed_ready_file(&files, &blobs, checksum, "app-a").await;
        let b = seed_ready_file(&files, &blobs, checksum, "app-b").await;
        let shared_key = a.s3_key.clone();

        // delete A only; B still references the blob
        files.soft_delete(a.id).await.unwrap();
        cleanup.run_cycle().await;

        assert!(blobs.contains(&shared_key));
        assert!(files.find_by_id(b.id).await.unwrap().is_some());
        // A's row is kept while its blob key is not reclaimable
        assert!(files.find_by_id(a.id).await.unwrap().is_some());

        // delete B too; now nothing references the blob
        files.soft_delete(b.id).await.unwrap();
        let stats = cleanup.run_cycle().await;

        assert!(!blobs.contains(&shared_key));
        assert!(files.find_by_id(a.id).await.unwrap().is_none());
        assert!(files.find_by_id(b.id).await.unwrap().is_none());
        assert_eq!(stats.files_hard_deleted, 2);
    }

    #[tokio::test]
    async fn test_stuck_upload_is_reclaimed() {
        let files = Arc::new(InMemoryFileRepository::new());
        let thumbnails = Arc::new(InMemoryThumbnailRepository::new());
        let blobs = Arc::new(InMemoryBlobStore::new());
        let cleanup = service(files.clone(), thumbnails.clone(), blobs.clone());

        let tmp_key = "tmp/0000".to_string();
        blobs.seed(&tmp_key, b"partial".to_vec());

        let record = files
            .create(NewFileRecord {
                filename: "stuck.bin".to_string(),
                tags: FileTags::default(),
                mime_type: "application/octet-stream".to_string(),
                s3_key: tmp_key.clone(),
                s3_bucket: "media".to_string(),
                metadata: serde_json::json!({}),
                original_mime_type: None,
                original_s3_key: None,
                optimization_status: None,
                optimization_params: None,
            })
            .await
            .unwrap();

        // age the record past the TTL (25h)
        let mut stuck = files.find_by_id(record.id).await.unwrap().unwrap();
        stuck.created_at = Utc::now().fixed_offset() - Duration::hours(25);
        stuck.status_changed_at = stuck.created_at;
        files.put_record(stuck);

        cleanup.run_cycle().await;

        assert!(files.find_by_id(record.id).await.unwrap().is_none());
        assert!(!blobs.contains(&tmp_key));
    }

    #[tokio::test]
    async fn test_failed_blob_delete_preserves_row_for_retry() {
        let files = Arc::new(InMemoryFileRepository::new());
        let thumbnails = Arc::new(InMemoryThumbnailRepository::new());
        let blobs = Arc::new(InMemoryBlobStore::new());
        let cleanup = service(files.clone(), thumbnails.clone(), blobs.clone());

        let record = seed_ready_file(&files, &blobs, "sha256:dead", "app-x").await;
        blobs.fail_deletes_for(&record.s3_key);

        files.soft_delete(record.id).await.unwrap();
        let stats = cleanup.run_cycle().await;

        // row survives; next cycle retries
        assert!(files.find_by_id(record.id).await.unwrap().is_some());
        assert_eq!(stats.files_hard_deleted, 0);
        assert_eq!(stats.errors, 0);
    }

    #[tokio::test]
    async fn test_corrupted_ready_record_reclaimed_without_refcount() {
        let files = Arc::new(InMemoryFileRepository::new());
        let thumbnails = Arc::new(InMemoryThumbnailRepository::new());
        let blobs = Arc::new(InMemoryBlobStore::new());
        let cleanup = service(files.clone(), thumbnails.clone(), blobs.clone());

        // ready with an empty key and no optimization in flight
        let record = seed_ready_file(&files, &blobs, "sha256:beef", "app-x").await;
        let mut corrupted = files.find_by_id(record.id).await.unwrap().unwrap();
        corrupted.s3_key = String::new();
        files.put_record(corrupted);

        cleanup.run_cycle().await;
        assert!(files.find_by_id(record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stuck_optimization_is_failed_out() {
        use crate::files::application::domain::entities::OptimizationStatus;

        let files = Arc::new(InMemoryFileRepository::new());
        let thumbnails = Arc::new(InMemoryThumbnailRepository::new());
        let blobs = Arc::new(InMemoryBlobStore::new());
        let cleanup = service(files.clone(), thumbnails.clone(), blobs.clone());

        let record = seed_ready_file(&files, &blobs, "sha256:aaaa", "app-x").await;
        let mut stuck = files.find_by_id(record.id).await.unwrap().unwrap();
        stuck.optimization_status = Some(OptimizationStatus::Processing);
        stuck.optimization_started_at =
            Some(Utc::now().fixed_offset() - Duration::hours(2));
        files.put_record(stuck);

        cleanup.run_cycle().await;

        let aged = files.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(aged.optimization_status, Some(OptimizationStatus::Failed));
        assert_eq!(
            aged.optimization_error.as_deref(),
            Some("optimization timed out")
        );
    }

    #[tokio::test]
    async fn test_old_thumbnails_age_out_with_resurrection_guard() {
        let files = Arc::new(InMemoryFileRepository::new());
        let thumbnails = Arc::new(InMemoryThumbnailRepository::new());
        let blobs = Arc::new(InMemoryBlobStore::new());
        let cleanup = service(files.clone(), thumbnails.clone(), blobs.clone());

        let file_id = Uuid::new_v4();
        let old = ThumbnailRecord {
            id: Uuid::new_v4(),
            file_id,
            width: 100,
            height: 100,
            quality: 80,
            params_hash: "old".to_string(),
            s3_key: format!("thumbs/{file_id}/old.webp"),
            s3_bucket: "media".to_string(),
            size: 100,
            mime_type: "image/webp".to_string(),
            last_accessed_at: Utc::now().fixed_offset() - Duration::days(60),
            created_at: Utc::now().fixed_offset() - Duration::days(60),
        };
        let fresh = ThumbnailRecord {
            id: Uuid::new_v4(),
            params_hash: "fresh".to_string(),
            s3_key: format!("thumbs/{file_id}/fresh.webp"),
            last_accessed_at: Utc::now().fixed_offset(),
            ..old.clone()
        };
        blobs.seed(&old.s3_key, vec![1]);
        blobs.seed(&fresh.s3_key, vec![2]);
        thumbnails.seed(old.clone());
        thumbnails.seed(fresh.clone());

        let stats = cleanup.run_cycle().await;

        assert_eq!(stats.thumbnails_deleted, 1);
        assert!(!blobs.contains(&old.s3_key));
        assert!(blobs.contains(&fresh.s3_key));
        assert_eq!(thumbnails.thumbnail_count(), 1);
    }
}
