use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use thiserror::Error;
use uuid::Uuid;

use crate::files::application::domain::entities::ThumbnailRecord;

#[derive(Debug, Clone, Error)]
pub enum ThumbnailRepositoryError {
    #[error("database error: {0}")]
    DatabaseError(String),
}

#[derive(Debug, Clone)]
pub struct NewThumbnail {
    pub file_id: Uuid,
    pub width: i32,
    pub height: i32,
    pub quality: i32,
    pub params_hash: String,
    pub s3_key: String,
    pub s3_bucket: String,
    pub size: i64,
    pub mime_type: String,
}

#[async_trait]
pub trait ThumbnailRepository: Send + Sync {
    async fn find_by_params(
        &self,
        file_id: Uuid,
        params_hash: &str,
    ) -> Result<Option<ThumbnailRecord>, ThumbnailRepositoryError>;

    /// Insert a new rendition row. Two requests racing on the same
    /// `(file_id, params_hash)` both succeed: the loser gets the winner's row.
    async fn insert(
        &self,
        data: NewThumbnail,
    ) -> Result<ThumbnailRecord, ThumbnailRepositoryError>;

    async fn touch_last_accessed(&self, id: Uuid) -> Result<(), ThumbnailRepositoryError>;

    async fn list_by_file(
        &self,
        file_id: Uuid,
    ) -> Result<Vec<ThumbnailRecord>, ThumbnailRepositoryError>;

    /// Rows not accessed since `cutoff`, oldest first, up to `limit`.
    async fn select_stale(
        &self,
        cutoff: DateTime<FixedOffset>,
        limit: u64,
    ) -> Result<Vec<ThumbnailRecord>, ThumbnailRepositoryError>;

    /// Guarded hard delete: removes the row only while `last_accessed_at`
    /// is still older than `cutoff`, so a concurrent access resurrects it.
    async fn delete_if_still_stale(
        &self,
        id: Uuid,
        cutoff: DateTime<FixedOffset>,
    ) -> Result<bool, ThumbnailRepositoryError>;
}
