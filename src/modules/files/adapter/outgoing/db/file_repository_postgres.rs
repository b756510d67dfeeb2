use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr, QueryResult, Statement,
    TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::files::application::{
    domain::entities::{FileRecord, FileStatus, FileTags, OptimizationStatus},
    ports::outgoing::db::{
        BulkDeleteOutcome, CompleteOptimization, FileListPage, FileRepository,
        FileRepositoryError, FileSortBy, ListFilesQuery, NewFileRecord, PromoteToReady,
        SoftDeleteOutcome, SortOrder,
    },
};

// ============================================================================
// Repository Implementation (Production)
// ============================================================================

/// All file columns, status enums rendered as text for portable mapping.
const FILE_COLUMNS: &str = r#"
    id, filename, app_id, user_id, purpose,
    mime_type, size, checksum, s3_key, s3_bucket,
    original_mime_type, original_size, original_checksum, original_s3_key,
    status::text AS status,
    optimization_status::text AS optimization_status,
    optimization_params, optimization_error,
    optimization_started_at, optimization_completed_at,
    metadata, exif,
    created_at, status_changed_at, uploaded_at, deleted_at
"#;

#[derive(Clone)]
pub struct FileRepositoryPostgres {
    db: Arc<DatabaseConnection>,
}

impl FileRepositoryPostgres {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    // =====================================================
    // SQL builders
    // =====================================================

    fn insert_stmt(id: Uuid, data: &NewFileRecord, now: DateTime<FixedOffset>) -> Statement {
        Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            format!(
                r#"
                INSERT INTO files (
                  id, filename, app_id, user_id, purpose,
                  mime_type, s3_key, s3_bucket, metadata,
                  original_mime_type, original_s3_key,
                  status, optimization_status, optimization_params,
                  created_at, status_changed_at
                )
                VALUES (
                  $1, $2, $3, $4, $5,
                  $6, $7, $8, $9,
                  $10, $11,
                  'uploading'::file_status, $12::optimization_status, $13,
                  $14, $14
                )
                RETURNING {FILE_COLUMNS}
                "#
            ),
            vec![
                id.into(),
                data.filename.clone().into(),
                data.tags.app_id.clone().into(),
                data.tags.user_id.clone().into(),
                data.tags.purpose.clone().into(),
                data.mime_type.clone().into(),
                data.s3_key.clone().into(),
                data.s3_bucket.clone().into(),
                data.metadata.clone().into(),
                data.original_mime_type.clone().into(),
                data.original_s3_key.clone().into(),
                data.optimization_status
                    .map(|s| s.as_str().to_string())
                    .into(),
                data.optimization_params.clone().into(),
                now.into(),
            ],
        )
    }

    fn find_by_id_stmt(id: Uuid) -> Statement {
        Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            format!("SELECT {FILE_COLUMNS} FROM files WHERE id = $1"),
            vec![id.into()],
        )
    }

    fn find_ready_sibling_stmt(checksum: &str, mime_type: &str) -> Statement {
        Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            format!(
                r#"
                SELECT {FILE_COLUMNS} FROM files
                WHERE checksum = $1
                  AND mime_type = $2
                  AND status = 'ready'
                  AND deleted_at IS NULL
                LIMIT 1
                "#
            ),
            vec![checksum.into(), mime_type.into()],
        )
    }

    fn promote_to_ready_stmt(data: &PromoteToReady, now: DateTime<FixedOffset>) -> Statement {
        Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            format!(
                r#"
                UPDATE files
                SET checksum = $2,
                    size = $3,
                    s3_key = $4,
                    status = 'ready'::file_status,
                    uploaded_at = $5,
                    status_changed_at = $5
                WHERE id = $1
                  AND status = 'uploading'
                RETURNING {FILE_COLUMNS}
                "#
            ),
            vec![
                data.id.into(),
                data.checksum.clone().into(),
                data.size.into(),
                data.s3_key.clone().into(),
                now.into(),
            ],
        )
    }

    fn promote_original_ready_stmt(
        id: Uuid,
        original_checksum: &str,
        original_size: i64,
        now: DateTime<FixedOffset>,
    ) -> Statement {
        Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            format!(
                r#"
                UPDATE files
                SET original_checksum = $2,
                    original_size = $3,
                    status = 'ready'::file_status,
                    uploaded_at = $4,
                    status_changed_at = $4
                WHERE id = $1
                  AND status = 'uploading'
                RETURNING {FILE_COLUMNS}
                "#
            ),
            vec![
                id.into(),
                original_checksum.into(),
                original_size.into(),
                now.into(),
            ],
        )
    }

    fn complete_optimization_stmt(
        data: &CompleteOptimization,
        now: DateTime<FixedOffset>,
    ) -> Statement {
        Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            format!(
                r#"
                UPDATE files
                SET s3_key = $2,
                    mime_type = $3,
                    size = $4,
                    checksum = $5,
                    optimization_status = 'ready'::optimization_status,
                    optimization_completed_at = $6
                WHERE id = $1
                  AND optimization_status = 'processing'
                RETURNING {FILE_COLUMNS}
                "#
            ),
            vec![
                data.id.into(),
                data.s3_key.clone().into(),
                data.mime_type.clone().into(),
                data.size.into(),
                data.checksum.clone().into(),
                now.into(),
            ],
        )
    }

    /// Quoted literal list for a trusted status slice (enum-derived, never
    /// user input).
    fn status_list(statuses: &[FileStatus]) -> String {
        statuses
            .iter()
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn map_db_err(e: DbErr) -> FileRepositoryError {
        if Self::is_unique_violation(&e) {
            FileRepositoryError::DuplicateContent
        } else {
            FileRepositoryError::DatabaseError(e.to_string())
        }
    }

    fn is_unique_violation(e: &DbErr) -> bool {
        let msg = e.to_string().to_lowercase();
        msg.contains("duplicate key") || msg.contains("unique constraint")
    }

    fn parse_status(s: &str) -> Result<FileStatus, FileRepositoryError> {
        FileStatus::parse(s)
            .ok_or_else(|| FileRepositoryError::DatabaseError(format!("invalid file status: {s}")))
    }

    fn map_row(row: &QueryResult) -> Result<FileRecord, FileRepositoryError> {
        let err = |e: DbErr| FileRepositoryError::DatabaseError(e.to_string());

        let status: String = row.try_get("", "status").map_err(err)?;
        let optimization_status: Option<String> =
            row.try_get("", "optimization_status").map_err(err)?;
        let optimization_status = match optimization_status.as_deref() {
            None => None,
            Some(s) => Some(OptimizationStatus::parse(s).ok_or_else(|| {
                FileRepositoryError::DatabaseError(format!("invalid optimization status: {s}"))
            })?),
        };

        Ok(FileRecord {
            id: row.try_get("", "id").map_err(err)?,
            filename: row.try_get("", "filename").map_err(err)?,
            tags: FileTags {
                app_id: row.try_get("", "app_id").map_err(err)?,
                user_id: row.try_get("", "user_id").map_err(err)?,
                purpose: row.try_get("", "purpose").map_err(err)?,
            },
            mime_type: row.try_get("", "mime_type").map_err(err)?,
            size: row.try_get("", "size").map_err(err)?,
            checksum: row.try_get("", "checksum").map_err(err)?,
            s3_key: row.try_get("", "s3_key").map_err(err)?,
            s3_bucket: row.try_get("", "s3_bucket").map_err(err)?,
            original_mime_type: row.try_get("", "original_mime_type").map_err(err)?,
            original_size: row.try_get("", "original_size").map_err(err)?,
            original_checksum: row.try_get("", "original_checksum").map_err(err)?,
            original_s3_key: row.try_get("", "original_s3_key").map_err(err)?,
            status: Self::parse_status(&status)?,
            optimization_status,
            optimization_params: row.try_get("", "optimization_params").map_err(err)?,
            optimization_error: row.try_get("", "optimization_error").map_err(err)?,
            optimization_started_at: row.try_get("", "optimization_started_at").map_err(err)?,
            optimization_completed_at: row
                .try_get("", "optimization_completed_at")
                .map_err(err)?,
            metadata: row.try_get("", "metadata").map_err(err)?,
            exif: row.try_get("", "exif").map_err(err)?,
            created_at: row.try_get("", "created_at").map_err(err)?,
            status_changed_at: row.try_get("", "status_changed_at").map_err(err)?,
            uploaded_at: row.try_get("", "uploaded_at").map_err(err)?,
            deleted_at: row.try_get("", "deleted_at").map_err(err)?,
        })
    }

    async fn query_files(&self, stmt: Statement) -> Result<Vec<FileRecord>, FileRepositoryError> {
        let rows = self.db.query_all(stmt).await.map_err(Self::map_db_err)?;
        rows.iter().map(Self::map_row).collect()
    }
}

#[async_trait]
impl FileRepository for FileRepositoryPostgres {
    async fn create(&self, data: NewFileRecord) -> Result<FileRecord, FileRepositoryError> {
        let now = Utc::now().fixed_offset();
        let stmt = Self::insert_stmt(Uuid::new_v4(), &data, now);

        let row = self
            .db
            .query_one(stmt)
            .await
            .map_err(Self::map_db_err)?
            .ok_or_else(|| {
                FileRepositoryError::DatabaseError("insert returned no row".to_string())
            })?;

        Self::map_row(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, FileRepositoryError> {
        let row = self
            .db
            .query_one(Self::find_by_id_stmt(id))
            .await
            .map_err(Self::map_db_err)?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn find_ready_sibling(
        &self,
        checksum: &str,
        mime_type: &str,
    ) -> Result<Option<FileRecord>, FileRepositoryError> {
        let row = self
            .db
            .query_one(Self::find_ready_sibling_stmt(checksum, mime_type))
            .await
            .map_err(Self::map_db_err)?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn promote_to_ready(
        &self,
        data: PromoteToReady,
    ) -> Result<FileRecord, FileRepositoryError> {
        let now = Utc::now().fixed_offset();
        let row = self
            .db
            .query_one(Self::promote_to_ready_stmt(&data, now))
            .await
            .map_err(Self::map_db_err)?
            .ok_or(FileRepositoryError::NotFound)?;

        Self::map_row(&row)
    }

    async fn promote_original_ready(
        &self,
        id: Uuid,
        original_checksum: &str,
        original_size: i64,
    ) -> Result<FileRecord, FileRepositoryError> {
        let now = Utc::now().fixed_offset();
        let row = self
            .db
            .query_one(Self::promote_original_ready_stmt(
                id,
                original_checksum,
                original_size,
                now,
            ))
            .await
            .map_err(Self::map_db_err)?
            .ok_or(FileRepositoryError::NotFound)?;

        Self::map_row(&row)
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), FileRepositoryError> {
        let now = Utc::now().fixed_offset();
        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                r#"
                UPDATE files
                SET status = 'failed'::file_status, status_changed_at = $2
                WHERE id = $1
                "#,
                vec![id.into(), now.into()],
            ))
            .await
            .map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<SoftDeleteOutcome, FileRepositoryError> {
        let now = Utc::now().fixed_offset();
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                r#"
                UPDATE files
                SET deleted_at = $2
                WHERE id = $1
                  AND deleted_at IS NULL
                "#,
                vec![id.into(), now.into()],
            ))
            .await
            .map_err(Self::map_db_err)?;

        if result.rows_affected() == 1 {
            return Ok(SoftDeleteOutcome::Deleted);
        }

        // 0 rows: either already soft-deleted or absent
        match self.find_by_id(id).await? {
            Some(_) => Ok(SoftDeleteOutcome::AlreadyDeleted),
            None => Err(FileRepositoryError::NotFound),
        }
    }

    async fn bulk_soft_delete(
        &self,
        tags: &FileTags,
        limit: u64,
        dry_run: bool,
    ) -> Result<BulkDeleteOutcome, FileRepositoryError> {
        let mut conditions = vec![
            "status = 'ready'".to_string(),
            "deleted_at IS NULL".to_string(),
        ];
        let mut values: Vec<sea_orm::Value> = Vec::new();

        let mut bind = |value: String| {
            values.push(value.into());
            format!("${}", values.len())
        };

        if let Some(app_id) = tags.app_id.as_deref().filter(|s| !s.trim().is_empty()) {
            let placeholder = bind(app_id.to_string());
            conditions.push(format!("app_id = {placeholder}"));
        }
        if let Some(user_id) = tags.user_id.as_deref().filter(|s| !s.trim().is_empty()) {
            let placeholder = bind(user_id.to_string());
            conditions.push(format!("user_id = {placeholder}"));
        }
        if let Some(purpose) = tags.purpose.as_deref().filter(|s| !s.trim().is_empty()) {
            let placeholder = bind(purpose.to_string());
            conditions.push(format!("purpose = {placeholder}"));
        }

        let where_clause = conditions.join(" AND ");
        let candidates = format!(
            "SELECT id FROM files WHERE {where_clause} ORDER BY created_at ASC LIMIT {limit}"
        );

        let count_row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                format!("SELECT COUNT(*) AS matched FROM ({candidates}) AS t"),
                values.clone(),
            ))
            .await
            .map_err(Self::map_db_err)?;

        let matched: i64 = count_row
            .as_ref()
            .map(|row| row.try_get("", "matched"))
            .transpose()
            .map_err(|e| FileRepositoryError::DatabaseError(e.to_string()))?
            .unwrap_or(0);

        if dry_run {
            return Ok(BulkDeleteOutcome {
                matched: matched as u64,
                deleted: 0,
            });
        }

        let now = Utc::now().fixed_offset();
        values.push(now.into());
        let now_placeholder = format!("${}", values.len());

        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                format!(
                    r#"
                    UPDATE files
                    SET deleted_at = {now_placeholder}
                    WHERE id IN ({candidates})
                      AND deleted_at IS NULL
                    "#
                ),
                values,
            ))
            .await
            .map_err(Self::map_db_err)?;

        Ok(BulkDeleteOutcome {
            matched: matched as u64,
            deleted: result.rows_affected(),
        })
    }

    async fn list(&self, query: &ListFilesQuery) -> Result<FileListPage, FileRepositoryError> {
        let mut conditions = vec!["deleted_at IS NULL".to_string()];
        let mut values: Vec<sea_orm::Value> = Vec::new();

        let mut bind = |value: String| {
            values.push(value.into());
            format!("${}", values.len())
        };

        if let Some(q) = query.q.as_deref().filter(|s| !s.trim().is_empty()) {
            let placeholder = bind(format!("%{}%", q.trim()));
            conditions.push(format!("filename ILIKE {placeholder}"));
        }
        if let Some(mime) = query.mime_type.as_deref().filter(|s| !s.trim().is_empty()) {
            let placeholder = bind(format!("{}%", mime.trim()));
            conditions.push(format!("mime_type LIKE {placeholder}"));
        }
        if let Some(app_id) = query.tags.app_id.as_deref().filter(|s| !s.trim().is_empty()) {
            let placeholder = bind(app_id.to_string());
            conditions.push(format!("app_id = {placeholder}"));
        }
        if let Some(user_id) = query.tags.user_id.as_deref().filter(|s| !s.trim().is_empty()) {
            let placeholder = bind(user_id.to_string());
            conditions.push(format!("user_id = {placeholder}"));
        }
        if let Some(purpose) = query.tags.purpose.as_deref().filter(|s| !s.trim().is_empty()) {
            let placeholder = bind(purpose.to_string());
            conditions.push(format!("purpose = {placeholder}"));
        }

        let where_clause = conditions.join(" AND ");

        let count_row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                format!("SELECT COUNT(*) AS total FROM files WHERE {where_clause}"),
                values.clone(),
            ))
            .await
            .map_err(Self::map_db_err)?;

        let total: i64 = count_row
            .as_ref()
            .map(|row| row.try_get("", "total"))
            .transpose()
            .map_err(|e| FileRepositoryError::DatabaseError(e.to_string()))?
            .unwrap_or(0);

        let sort_column = match query.sort_by {
            FileSortBy::CreatedAt => "created_at",
            FileSortBy::Size => "size",
            FileSortBy::Filename => "filename",
        };
        let direction = match query.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        let items = self
            .query_files(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                format!(
                    r#"
                    SELECT {FILE_COLUMNS} FROM files
                    WHERE {where_clause}
                    ORDER BY {sort_column} {direction}
                    LIMIT {} OFFSET {}
                    "#,
                    query.limit, query.offset
                ),
                values,
            ))
            .await?;

        Ok(FileListPage {
            items,
            total: total as u64,
        })
    }

    async fn set_exif(
        &self,
        id: Uuid,
        exif: serde_json::Value,
    ) -> Result<(), FileRepositoryError> {
        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "UPDATE files SET exif = $2 WHERE id = $1",
                vec![id.into(), exif.into()],
            ))
            .await
            .map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn claim_optimization(
        &self,
        id: Uuid,
        from: OptimizationStatus,
        to: OptimizationStatus,
    ) -> Result<bool, FileRepositoryError> {
        let now = Utc::now().fixed_offset();

        let stmt = if to == OptimizationStatus::Processing {
            Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                format!(
                    r#"
                    UPDATE files
                    SET optimization_status = '{}'::optimization_status,
                        optimization_started_at = $2
                    WHERE id = $1
                      AND optimization_status = '{}'
                    "#,
                    to.as_str(),
                    from.as_str()
                ),
                vec![id.into(), now.into()],
            )
        } else {
            Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                format!(
                    r#"
                    UPDATE files
                    SET optimization_status = '{}'::optimization_status
                    WHERE id = $1
                      AND optimization_status = '{}'
                    "#,
                    to.as_str(),
                    from.as_str()
                ),
                vec![id.into()],
            )
        };

        let result = self.db.execute(stmt).await.map_err(Self::map_db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete_optimization(
        &self,
        data: CompleteOptimization,
    ) -> Result<FileRecord, FileRepositoryError> {
        let now = Utc::now().fixed_offset();
        let row = self
            .db
            .query_one(Self::complete_optimization_stmt(&data, now))
            .await
            .map_err(Self::map_db_err)?
            .ok_or(FileRepositoryError::NotFound)?;

        Self::map_row(&row)
    }

    async fn fail_optimization(&self, id: Uuid, error: &str) -> Result<(), FileRepositoryError> {
        let now = Utc::now().fixed_offset();
        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                r#"
                UPDATE files
                SET status = 'failed'::file_status,
                    optimization_status = 'failed'::optimization_status,
                    optimization_error = $2,
                    status_changed_at = $3
                WHERE id = $1
                "#,
                vec![id.into(), error.into(), now.into()],
            ))
            .await
            .map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn hard_delete(&self, id: Uuid) -> Result<(), FileRepositoryError> {
        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "DELETE FROM files WHERE id = $1",
                vec![id.into()],
            ))
            .await
            .map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn hard_delete_with_thumbnails(
        &self,
        id: Uuid,
        thumbnail_ids: &[Uuid],
        delete_file_row: bool,
    ) -> Result<(), FileRepositoryError> {
        let txn = self.db.begin().await.map_err(Self::map_db_err)?;

        for thumbnail_id in thumbnail_ids {
            txn.execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "DELETE FROM thumbnails WHERE id = $1",
                vec![(*thumbnail_id).into()],
            ))
            .await
            .map_err(Self::map_db_err)?;
        }

        if delete_file_row {
            txn.execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "DELETE FROM files WHERE id = $1",
                vec![id.into()],
            ))
            .await
            .map_err(Self::map_db_err)?;
        }

        txn.commit().await.map_err(Self::map_db_err)
    }

    async fn count_other_live_refs(
        &self,
        checksum: &str,
        mime_type: &str,
        exclude_id: Uuid,
    ) -> Result<u64, FileRepositoryError> {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                r#"
                SELECT COUNT(*) AS refs FROM files
                WHERE checksum = $1
                  AND mime_type = $2
                  AND deleted_at IS NULL
                  AND id <> $3
                "#,
                vec![checksum.into(), mime_type.into(), exclude_id.into()],
            ))
            .await
            .map_err(Self::map_db_err)?;

        let refs: i64 = row
            .as_ref()
            .map(|r| r.try_get("", "refs"))
            .transpose()
            .map_err(|e| FileRepositoryError::DatabaseError(e.to_string()))?
            .unwrap_or(0);

        Ok(refs as u64)
    }

    async fn select_soft_deleted(
        &self,
        retry_cutoff: DateTime<FixedOffset>,
        batch: u64,
    ) -> Result<Vec<FileRecord>, FileRepositoryError> {
        self.query_files(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            format!(
                r#"
                SELECT {FILE_COLUMNS} FROM files
                WHERE deleted_at IS NOT NULL
                  AND deleted_at < $1
                ORDER BY deleted_at ASC
                LIMIT {batch}
                "#
            ),
            vec![retry_cutoff.into()],
        ))
        .await
    }

    async fn select_corrupted(&self, batch: u64) -> Result<Vec<FileRecord>, FileRepositoryError> {
        // `ready` with an empty key is legitimate while an optimization is
        // in flight; only rows outside that window are inconsistent.
        self.query_files(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            format!(
                r#"
                SELECT {FILE_COLUMNS} FROM files
                WHERE (status = 'deleting' AND deleted_at IS NULL)
                   OR (
                        status = 'ready'
                        AND (s3_key = '' OR mime_type = '')
                        AND (optimization_status IS NULL
                             OR optimization_status NOT IN ('pending', 'processing'))
                      )
                LIMIT {batch}
                "#
            ),
            vec![],
        ))
        .await
    }

    async fn select_stale_status(
        &self,
        statuses: &[FileStatus],
        cutoff: DateTime<FixedOffset>,
        batch: u64,
    ) -> Result<Vec<FileRecord>, FileRepositoryError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        self.query_files(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            format!(
                r#"
                SELECT {FILE_COLUMNS} FROM files
                WHERE status IN ({})
                  AND status_changed_at < $1
                ORDER BY status_changed_at ASC
                LIMIT {batch}
                "#,
                Self::status_list(statuses)
            ),
            vec![cutoff.into()],
        ))
        .await
    }

    async fn select_stuck_optimizations(
        &self,
        cutoff: DateTime<FixedOffset>,
        batch: u64,
    ) -> Result<Vec<FileRecord>, FileRepositoryError> {
        self.query_files(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            format!(
                r#"
                SELECT {FILE_COLUMNS} FROM files
                WHERE optimization_status IN ('pending', 'processing')
                  AND COALESCE(optimization_started_at, created_at) < $1
                ORDER BY created_at ASC
                LIMIT {batch}
                "#
            ),
            vec![cutoff.into()],
        ))
        .await
    }

    async fn select_orphaned_uploads(
        &self,
        cutoff: DateTime<FixedOffset>,
        batch: u64,
    ) -> Result<Vec<FileRecord>, FileRepositoryError> {
        self.query_files(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            format!(
                r#"
                SELECT {FILE_COLUMNS} FROM files
                WHERE (status = 'uploading' AND created_at < $1)
                   OR (
                        status = 'failed'
                        AND (s3_key LIKE 'tmp/%'
                             OR s3_key LIKE 'originals/%'
                             OR original_s3_key LIKE 'originals/%')
                      )
                ORDER BY created_at ASC
                LIMIT {batch}
                "#
            ),
            vec![cutoff.into()],
        ))
        .await
    }

    async fn claim_for_deletion(
        &self,
        id: Uuid,
        expected: &[FileStatus],
    ) -> Result<bool, FileRepositoryError> {
        if expected.is_empty() {
            return Ok(false);
        }

        let now = Utc::now().fixed_offset();
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                format!(
                    r#"
                    UPDATE files
                    SET status = 'deleting'::file_status,
                        deleted_at = COALESCE(deleted_at, $2),
                        status_changed_at = $2
                    WHERE id = $1
                      AND status IN ({})
                    "#,
                    Self::status_list(expected)
                ),
                vec![id.into(), now.into()],
            ))
            .await
            .map_err(Self::map_db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_deleted(&self, id: Uuid) -> Result<(), FileRepositoryError> {
        let now = Utc::now().fixed_offset();
        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                r#"
                UPDATE files
                SET status = 'deleted'::file_status, status_changed_at = $2
                WHERE id = $1
                "#,
                vec![id.into(), now.into()],
            ))
            .await
            .map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), FileRepositoryError> {
        self.db
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                "SELECT 1",
            ))
            .await
            .map_err(Self::map_db_err)?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::collections::BTreeMap;

    fn make_row(data: Vec<(&str, Value)>) -> BTreeMap<String, Value> {
        data.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    /// A full `files` row in `ready` state.
    fn ready_row(id: Uuid) -> BTreeMap<String, Value> {
        let now = Utc::now().fixed_offset();
        make_row(vec![
            ("id", Value::Uuid(Some(Box::new(id)))),
            (
                "filename",
                Value::String(Some(Box::new("photo.png".to_string()))),
            ),
            ("app_id", Value::String(None)),
            ("user_id", Value::String(None)),
            ("purpose", Value::String(None)),
            (
                "mime_type",
                Value::String(Some(Box::new("image/png".to_string()))),
            ),
            ("size", Value::BigInt(Some(42))),
            (
                "checksum",
                Value::String(Some(Box::new("sha256:ab".to_string()))),
            ),
            (
                "s3_key",
                Value::String(Some(Box::new("ab/cd/abcd.png".to_string()))),
            ),
            (
                "s3_bucket",
                Value::String(Some(Box::new("media".to_string()))),
            ),
            ("original_mime_type", Value::String(None)),
            ("original_size", Value::BigInt(None)),
            ("original_checksum", Value::String(None)),
            ("original_s3_key", Value::String(None)),
            (
                "status",
                Value::String(Some(Box::new("ready".to_string()))),
            ),
            ("optimization_status", Value::String(None)),
            ("optimization_params", Value::Json(None)),
            ("optimization_error", Value::String(None)),
            ("optimization_started_at", Value::ChronoDateTimeWithTimeZone(None)),
            (
                "optimization_completed_at",
                Value::ChronoDateTimeWithTimeZone(None),
            ),
            (
                "metadata",
                Value::Json(Some(Box::new(serde_json::json!({})))),
            ),
            ("exif", Value::Json(None)),
            (
                "created_at",
                Value::ChronoDateTimeWithTimeZone(Some(Box::new(now))),
            ),
            (
                "status_changed_at",
                Value::ChronoDateTimeWithTimeZone(Some(Box::new(now))),
            ),
            (
                "uploaded_at",
                Value::ChronoDateTimeWithTimeZone(Some(Box::new(now))),
            ),
            ("deleted_at", Value::ChronoDateTimeWithTimeZone(None)),
        ])
    }

    #[tokio::test]
    async fn test_find_by_id_maps_full_row() {
        let id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![ready_row(id)]])
            .into_connection();

        let repo = FileRepositoryPostgres::new(Arc::new(db));
        let file = repo.find_by_id(id).await.unwrap().unwrap();

        assert_eq!(file.id, id);
        assert_eq!(file.status, FileStatus::Ready);
        assert_eq!(file.mime_type, "image/png");
        assert_eq!(file.size, Some(42));
        assert_eq!(file.checksum.as_deref(), Some("sha256:ab"));
        assert_eq!(file.optimization_status, None);
        assert!(!file.is_soft_deleted());
    }

    #[tokio::test]
    async fn test_find_by_id_absent_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![Vec::<BTreeMap<String, Value>>::new()])
            .into_connection();

        let repo = FileRepositoryPostgres::new(Arc::new(db));
        assert!(repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_promote_to_ready_lost_claim_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![Vec::<BTreeMap<String, Value>>::new()])
            .into_connection();

        let repo = FileRepositoryPostgres::new(Arc::new(db));
        let err = repo
            .promote_to_ready(PromoteToReady {
                id: Uuid::new_v4(),
                checksum: "sha256:ab".to_string(),
                size: 1,
                s3_key: "ab/cd/abcd".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FileRepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_promote_to_ready_duplicate_content() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors(vec![DbErr::Custom(
                "duplicate key value violates unique constraint \"uq_files_checksum_mime_ready\""
                    .to_string(),
            )])
            .into_connection();

        let repo = FileRepositoryPostgres::new(Arc::new(db));
        let err = repo
            .promote_to_ready(PromoteToReady {
                id: Uuid::new_v4(),
                checksum: "sha256:ab".to_string(),
                size: 1,
                s3_key: "ab/cd/abcd".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FileRepositoryError::DuplicateContent));
    }

    #[tokio::test]
    async fn test_claim_optimization_row_count_is_the_lock() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();

        let repo = FileRepositoryPostgres::new(Arc::new(db));
        let id = Uuid::new_v4();

        let won = repo
            .claim_optimization(id, OptimizationStatus::Pending, OptimizationStatus::Processing)
            .await
            .unwrap();
        assert!(won);

        let lost = repo
            .claim_optimization(id, OptimizationStatus::Pending, OptimizationStatus::Processing)
            .await
            .unwrap();
        assert!(!lost);
    }

    #[tokio::test]
    async fn test_soft_delete_idempotent() {
        let id = Uuid::new_v4();
        let mut deleted = ready_row(id);
        deleted.insert(
            "deleted_at".to_string(),
            Value::ChronoDateTimeWithTimeZone(Some(Box::new(Utc::now().fixed_offset()))),
        );

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // first call: transition happens
            .append_exec_results(vec![
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                // second call: no row matched the IS NULL guard
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            // follow-up lookup for the second call
            .append_query_results(vec![vec![deleted]])
            .into_connection();

        let repo = FileRepositoryPostgres::new(Arc::new(db));

        assert_eq!(
            repo.soft_delete(id).await.unwrap(),
            SoftDeleteOutcome::Deleted
        );
        assert_eq!(
            repo.soft_delete(id).await.unwrap(),
            SoftDeleteOutcome::AlreadyDeleted
        );
    }

    #[tokio::test]
    async fn test_soft_delete_missing_row_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .append_query_results(vec![Vec::<BTreeMap<String, Value>>::new()])
            .into_connection();

        let repo = FileRepositoryPostgres::new(Arc::new(db));
        let err = repo.soft_delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, FileRepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_bulk_soft_delete_dry_run_only_counts() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![make_row(vec![(
                "matched",
                Value::BigInt(Some(7)),
            )])]])
            .into_connection();

        let repo = FileRepositoryPostgres::new(Arc::new(db));
        let outcome = repo
            .bulk_soft_delete(
                &FileTags {
                    app_id: Some("app-1".to_string()),
                    user_id: None,
                    purpose: None,
                },
                100,
                true,
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            BulkDeleteOutcome {
                matched: 7,
                deleted: 0
            }
        );
    }

    #[tokio::test]
    async fn test_bulk_soft_delete_reports_update_count() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![make_row(vec![(
                "matched",
                Value::BigInt(Some(5)),
            )])]])
            .append_exec_results(vec![MockExecResult {
                last_insert_id: 0,
                // one row lost to a concurrent soft delete
                rows_affected: 4,
            }])
            .into_connection();

        let repo = FileRepositoryPostgres::new(Arc::new(db));
        let outcome = repo
            .bulk_soft_delete(
                &FileTags {
                    app_id: None,
                    user_id: Some("u-9".to_string()),
                    purpose: None,
                },
                10,
                false,
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            BulkDeleteOutcome {
                matched: 5,
                deleted: 4
            }
        );
    }

    #[tokio::test]
    async fn test_count_other_live_refs() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![make_row(vec![("refs", Value::BigInt(Some(2)))])]])
            .into_connection();

        let repo = FileRepositoryPostgres::new(Arc::new(db));
        let refs = repo
            .count_other_live_refs("sha256:ab", "image/png", Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(refs, 2);
    }

    #[test]
    fn test_status_list_renders_quoted_literals() {
        let rendered = FileRepositoryPostgres::status_list(&[
            FileStatus::Uploading,
            FileStatus::Failed,
        ]);
        assert_eq!(rendered, "'uploading', 'failed'");
    }
}
