use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr, QueryResult, Statement,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::files::application::{
    domain::entities::ThumbnailRecord,
    ports::outgoing::db::{NewThumbnail, ThumbnailRepository, ThumbnailRepositoryError},
};

const THUMBNAIL_COLUMNS: &str = r#"
    id, file_id, width, height, quality, params_hash,
    s3_key, s3_bucket, size, mime_type, last_accessed_at, created_at
"#;

#[derive(Clone)]
pub struct ThumbnailRepositoryPostgres {
    db: Arc<DatabaseConnection>,
}

impl ThumbnailRepositoryPostgres {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn map_db_err(e: DbErr) -> ThumbnailRepositoryError {
        ThumbnailRepositoryError::DatabaseError(e.to_string())
    }

    fn map_row(row: &QueryResult) -> Result<ThumbnailRecord, ThumbnailRepositoryError> {
        let err = |e: DbErr| ThumbnailRepositoryError::DatabaseError(e.to_string());

        Ok(ThumbnailRecord {
            id: row.try_get("", "id").map_err(err)?,
            file_id: row.try_get("", "file_id").map_err(err)?,
            width: row.try_get("", "width").map_err(err)?,
            height: row.try_get("", "height").map_err(err)?,
            quality: row.try_get("", "quality").map_err(err)?,
            params_hash: row.try_get("", "params_hash").map_err(err)?,
            s3_key: row.try_get("", "s3_key").map_err(err)?,
            s3_bucket: row.try_get("", "s3_bucket").map_err(err)?,
            size: row.try_get("", "size").map_err(err)?,
            mime_type: row.try_get("", "mime_type").map_err(err)?,
            last_accessed_at: row.try_get("", "last_accessed_at").map_err(err)?,
            created_at: row.try_get("", "created_at").map_err(err)?,
        })
    }
}

#[async_trait]
impl ThumbnailRepository for ThumbnailRepositoryPostgres {
    async fn find_by_params(
        &self,
        file_id: Uuid,
        params_hash: &str,
    ) -> Result<Option<ThumbnailRecord>, ThumbnailRepositoryError> {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                format!(
                    r#"
                    SELECT {THUMBNAIL_COLUMNS} FROM thumbnails
                    WHERE file_id = $1 AND params_hash = $2
                    "#
                ),
                vec![file_id.into(), params_hash.into()],
            ))
            .await
            .map_err(Self::map_db_err)?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn insert(
        &self,
        data: NewThumbnail,
    ) -> Result<ThumbnailRecord, ThumbnailRepositoryError> {
        let now = Utc::now().fixed_offset();

        // Two requests can race generating the same rendition; the loser
        // keeps the winner's row and its own blob write is harmless (same
        // deterministic key, same bytes).
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                format!(
                    r#"
                    INSERT INTO thumbnails (
                      id, file_id, width, height, quality, params_hash,
                      s3_key, s3_bucket, size, mime_type,
                      last_accessed_at, created_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
                    ON CONFLICT (file_id, params_hash) DO UPDATE
                      SET last_accessed_at = EXCLUDED.last_accessed_at
                    RETURNING {THUMBNAIL_COLUMNS}
                    "#
                ),
                vec![
                    Uuid::new_v4().into(),
                    data.file_id.into(),
                    data.width.into(),
                    data.height.into(),
                    data.quality.into(),
                    data.params_hash.clone().into(),
                    data.s3_key.clone().into(),
                    data.s3_bucket.clone().into(),
                    data.size.into(),
                    data.mime_type.clone().into(),
                    now.into(),
                ],
            ))
            .await
            .map_err(Self::map_db_err)?
            .ok_or_else(|| {
                ThumbnailRepositoryError::DatabaseError("insert returned no row".to_string())
            })?;

        Self::map_row(&row)
    }

    async fn touch_last_accessed(&self, id: Uuid) -> Result<(), ThumbnailRepositoryError> {
        let now = Utc::now().fixed_offset();
        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "UPDATE thumbnails SET last_accessed_at = $2 WHERE id = $1",
                vec![id.into(), now.into()],
            ))
            .await
            .map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn list_by_file(
        &self,
        file_id: Uuid,
    ) -> Result<Vec<ThumbnailRecord>, ThumbnailRepositoryError> {
        let rows = self
            .db
            .query_all(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                format!(
                    "SELECT {THUMBNAIL_COLUMNS} FROM thumbnails WHERE file_id = $1"
                ),
                vec![file_id.into()],
            ))
            .await
            .map_err(Self::map_db_err)?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn select_stale(
        &self,
        cutoff: DateTime<FixedOffset>,
        limit: u64,
    ) -> Result<Vec<ThumbnailRecord>, ThumbnailRepositoryError> {
        let rows = self
            .db
            .query_all(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                format!(
                    r#"
                    SELECT {THUMBNAIL_COLUMNS} FROM thumbnails
                    WHERE last_accessed_at < $1
                    ORDER BY last_accessed_at ASC
                    LIMIT {limit}
                    "#
                ),
                vec![cutoff.into()],
            ))
            .await
            .map_err(Self::map_db_err)?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn delete_if_still_stale(
        &self,
        id: Uuid,
        cutoff: DateTime<FixedOffset>,
    ) -> Result<bool, ThumbnailRepositoryError> {
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                r#"
                DELETE FROM thumbnails
                WHERE id = $1
                  AND last_accessed_at < $2
                "#,
                vec![id.into(), cutoff.into()],
            ))
            .await
            .map_err(Self::map_db_err)?;

        Ok(result.rows_affected() == 1)
    }
}
