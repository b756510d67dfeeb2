use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use thiserror::Error;
use uuid::Uuid;

use crate::files::application::domain::entities::{
    FileRecord, FileStatus, FileTags, OptimizationStatus,
};

#[derive(Debug, Clone, Error)]
pub enum FileRepositoryError {
    #[error("file not found")]
    NotFound,

    /// The partial unique index on `(checksum, mime_type)` for ready rows
    /// rejected the write; a sibling with the same content exists.
    #[error("a ready file with the same checksum and MIME type already exists")]
    DuplicateContent,

    #[error("database error: {0}")]
    DatabaseError(String),
}

/// Insert payload. Every new row starts in `uploading`; the optimization
/// fields are populated only when the upload requested optimization (then
/// `s3_key` carries the empty-string sentinel and `original_s3_key` the
/// ingest key).
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub filename: String,
    pub tags: FileTags,
    pub mime_type: String,
    pub s3_key: String,
    pub s3_bucket: String,
    pub metadata: serde_json::Value,
    pub original_mime_type: Option<String>,
    pub original_s3_key: Option<String>,
    pub optimization_status: Option<OptimizationStatus>,
    pub optimization_params: Option<serde_json::Value>,
}

/// Promotion of a plain upload to `ready` at its content-addressed key.
#[derive(Debug, Clone)]
pub struct PromoteToReady {
    pub id: Uuid,
    pub checksum: String,
    pub size: i64,
    pub s3_key: String,
}

/// Completion payload of the optimization worker: the record's served blob
/// identity is rewritten to the optimized output.
#[derive(Debug, Clone)]
pub struct CompleteOptimization {
    pub id: Uuid,
    pub s3_key: String,
    pub mime_type: String,
    pub size: i64,
    pub checksum: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSortBy {
    CreatedAt,
    Size,
    Filename,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct ListFilesQuery {
    pub limit: u64,
    pub offset: u64,
    pub sort_by: FileSortBy,
    pub order: SortOrder,
    /// Substring match on the display filename.
    pub q: Option<String>,
    /// Prefix match, e.g. `image/` or an exact type.
    pub mime_type: Option<String>,
    pub tags: FileTags,
}

#[derive(Debug, Clone)]
pub struct FileListPage {
    pub items: Vec<FileRecord>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkDeleteOutcome {
    pub matched: u64,
    pub deleted: u64,
}

/// Whether `soft_delete` actually transitioned the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftDeleteOutcome {
    Deleted,
    AlreadyDeleted,
}

#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn create(&self, data: NewFileRecord) -> Result<FileRecord, FileRepositoryError>;

    /// Fetch by id, soft-deleted rows included; callers decide visibility.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, FileRepositoryError>;

    /// The one visible `ready` row with this content identity, if any.
    async fn find_ready_sibling(
        &self,
        checksum: &str,
        mime_type: &str,
    ) -> Result<Option<FileRecord>, FileRepositoryError>;

    /// Flip `uploading -> ready` with the final content identity. Surfaces
    /// `DuplicateContent` when the partial unique index rejects the row.
    async fn promote_to_ready(&self, data: PromoteToReady)
        -> Result<FileRecord, FileRepositoryError>;

    /// Optimization path: record the original's identity and go `ready`
    /// while `optimization_status` stays `pending`.
    async fn promote_original_ready(
        &self,
        id: Uuid,
        original_checksum: &str,
        original_size: i64,
    ) -> Result<FileRecord, FileRepositoryError>;

    async fn mark_failed(&self, id: Uuid) -> Result<(), FileRepositoryError>;

    /// Idempotent: a second call on a soft-deleted row reports
    /// `AlreadyDeleted` without touching `deleted_at` again.
    async fn soft_delete(&self, id: Uuid) -> Result<SoftDeleteOutcome, FileRepositoryError>;

    /// Mass soft-delete of `ready`, visible rows matching the tag filters,
    /// oldest first, bounded by `limit`. `dry_run` only counts.
    async fn bulk_soft_delete(
        &self,
        tags: &FileTags,
        limit: u64,
        dry_run: bool,
    ) -> Result<BulkDeleteOutcome, FileRepositoryError>;

    async fn list(&self, query: &ListFilesQuery) -> Result<FileListPage, FileRepositoryError>;

    async fn set_exif(
        &self,
        id: Uuid,
        exif: serde_json::Value,
    ) -> Result<(), FileRepositoryError>;

    /// Compare-and-set on `optimization_status`; true when this caller won
    /// the transition. Claiming into `Processing` stamps
    /// `optimization_started_at`.
    async fn claim_optimization(
        &self,
        id: Uuid,
        from: OptimizationStatus,
        to: OptimizationStatus,
    ) -> Result<bool, FileRepositoryError>;

    /// CAS-guarded completion (`WHERE optimization_status = 'processing'`).
    /// `DuplicateContent` signals a lost race on the content identity.
    async fn complete_optimization(
        &self,
        data: CompleteOptimization,
    ) -> Result<FileRecord, FileRepositoryError>;

    async fn fail_optimization(&self, id: Uuid, error: &str) -> Result<(), FileRepositoryError>;

    /// Plain row delete, used when an upload collapses into a duplicate
    /// before it ever became visible.
    async fn hard_delete(&self, id: Uuid) -> Result<(), FileRepositoryError>;

    /// Transactional hard delete: removes the given thumbnail rows and,
    /// when `delete_file_row` is set, the file row itself. Called only after
    /// the matching blobs were confirmed gone.
    async fn hard_delete_with_thumbnails(
        &self,
        id: Uuid,
        thumbnail_ids: &[Uuid],
        delete_file_row: bool,
    ) -> Result<(), FileRepositoryError>;

    /// Other visible rows sharing this blob. Zero means the blob may be
    /// reclaimed.
    async fn count_other_live_refs(
        &self,
        checksum: &str,
        mime_type: &str,
        exclude_id: Uuid,
    ) -> Result<u64, FileRepositoryError>;

    // ------------------------------------------------------------------
    // Cleanup scans
    // ------------------------------------------------------------------

    /// Soft-deleted rows whose last transition is older than `retry_cutoff`.
    async fn select_soft_deleted(
        &self,
        retry_cutoff: DateTime<FixedOffset>,
        batch: u64,
    ) -> Result<Vec<FileRecord>, FileRepositoryError>;

    /// Rows violating structural invariants (`deleting` without
    /// `deleted_at`, `ready` with an empty key or MIME type).
    async fn select_corrupted(&self, batch: u64) -> Result<Vec<FileRecord>, FileRepositoryError>;

    /// Rows stuck in one of `statuses` since before `cutoff`.
    async fn select_stale_status(
        &self,
        statuses: &[FileStatus],
        cutoff: DateTime<FixedOffset>,
        batch: u64,
    ) -> Result<Vec<FileRecord>, FileRepositoryError>;

    /// Rows whose optimization has sat in `pending`/`processing` since
    /// before `cutoff` (crashed workers leave these behind).
    async fn select_stuck_optimizations(
        &self,
        cutoff: DateTime<FixedOffset>,
        batch: u64,
    ) -> Result<Vec<FileRecord>, FileRepositoryError>;

    /// `uploading` rows older than `cutoff`, plus `failed` rows whose keys
    /// still point at the transient ingest prefixes.
    async fn select_orphaned_uploads(
        &self,
        cutoff: DateTime<FixedOffset>,
        batch: u64,
    ) -> Result<Vec<FileRecord>, FileRepositoryError>;

    /// Claim a row for physical deletion: CAS into `deleting` if its status
    /// is still one of `expected`. The affected-row count is the lock.
    async fn claim_for_deletion(
        &self,
        id: Uuid,
        expected: &[FileStatus],
    ) -> Result<bool, FileRepositoryError>;

    /// Terminal transition after a successful retry-delete of the blob.
    async fn mark_deleted(&self, id: Uuid) -> Result<(), FileRepositoryError>;

    async fn health_check(&self) -> Result<(), FileRepositoryError>;
}
