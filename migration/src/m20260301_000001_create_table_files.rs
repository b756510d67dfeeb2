//! # Files Table Migration
//!
//! The `files` table is the single source of truth for every stored object.
//! A row tracks the currently-served blob identity (`s3_key`, `checksum`,
//! `mime_type`, `size`) and, while an image optimization is in flight or has
//! completed, the pre-optimization identity (`original_*` columns).
//!
//! ## Key design points
//! - **Soft delete**: `deleted_at` is the only thing a delete writes. Blob
//!   reclamation happens later in the cleanup job, which is why the partial
//!   dedup index excludes soft-deleted rows: re-uploading content that was
//!   just deleted must be able to become `ready` again.
//! - **Dedup conflict point**: `uq_files_checksum_mime_ready` makes
//!   "one `ready` row per (checksum, mime_type)" a database guarantee.
//!   Writers racing on the same content hit a unique violation and collapse
//!   onto the surviving row.
//! - **Compare-and-set transitions**: status flips are `UPDATE ... WHERE`
//!   with the affected-row count as the lock, so the indexes on
//!   `(status, status_changed_at)` also serve the cleanup job's claim scans.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // =====================================================
        // Enum types
        // =====================================================
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DO $$
                BEGIN
                    IF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = 'file_status') THEN
                        CREATE TYPE file_status AS ENUM
                            ('uploading', 'ready', 'deleting', 'deleted', 'failed', 'missing');
                    END IF;
                END$$;
                "#,
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DO $$
                BEGIN
                    IF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = 'optimization_status') THEN
                        CREATE TYPE optimization_status AS ENUM
                            ('pending', 'processing', 'ready', 'failed');
                    END IF;
                END$$;
                "#,
            )
            .await?;

        // =====================================================
        // Create files table
        // =====================================================
        manager
            .create_table(
                Table::create()
                    .table(Files::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Files::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    // Advisory display name, already sanitized
                    .col(ColumnDef::new(Files::Filename).string_len(255).not_null())
                    // Free-form tag triple used for bulk operations and listing filters
                    .col(ColumnDef::new(Files::AppId).string_len(255))
                    .col(ColumnDef::new(Files::UserId).string_len(255))
                    .col(ColumnDef::new(Files::Purpose).string_len(255))
                    // =========================================
                    // Currently-served blob identity
                    // =========================================
                    // `checksum` and `size` stay NULL until the row reaches
                    // `ready`; during an optimization upload `s3_key` holds
                    // the empty-string sentinel until the optimized blob lands.
                    .col(ColumnDef::new(Files::MimeType).string_len(127).not_null())
                    .col(ColumnDef::new(Files::Size).big_integer())
                    .col(ColumnDef::new(Files::Checksum).string_len(80))
                    .col(ColumnDef::new(Files::S3Key).string_len(1024).not_null())
                    .col(ColumnDef::new(Files::S3Bucket).string_len(255).not_null())
                    // =========================================
                    // Pre-optimization identity (nullable)
                    // =========================================
                    .col(ColumnDef::new(Files::OriginalMimeType).string_len(127))
                    .col(ColumnDef::new(Files::OriginalSize).big_integer())
                    .col(ColumnDef::new(Files::OriginalChecksum).string_len(80))
                    .col(ColumnDef::new(Files::OriginalS3Key).string_len(1024))
                    // =========================================
                    // Lifecycle state
                    // =========================================
                    .col(
                        ColumnDef::new(Files::Status)
                            .custom(Alias::new("file_status"))
                            .not_null()
                            .default(Expr::cust("'uploading'::file_status")),
                    )
                    .col(
                        ColumnDef::new(Files::OptimizationStatus)
                            .custom(Alias::new("optimization_status")),
                    )
                    .col(ColumnDef::new(Files::OptimizationParams).json_binary())
                    .col(ColumnDef::new(Files::OptimizationError).text())
                    .col(ColumnDef::new(Files::OptimizationStartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Files::OptimizationCompletedAt).timestamp_with_time_zone())
                    // =========================================
                    // Opaque bags
                    // =========================================
                    .col(
                        ColumnDef::new(Files::Metadata)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(ColumnDef::new(Files::Exif).json_binary())
                    // =========================================
                    // Audit timestamps
                    // =========================================
                    .col(
                        ColumnDef::new(Files::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Files::StatusChangedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Files::UploadedAt).timestamp_with_time_zone())
                    // Soft delete - blob reclamation happens async in cleanup
                    .col(ColumnDef::new(Files::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // =====================================================
        // Indexes
        // =====================================================

        // Dedup conflict point: one ready, non-deleted row per content identity
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE UNIQUE INDEX uq_files_checksum_mime_ready
                ON files (checksum, mime_type)
                WHERE status = 'ready' AND deleted_at IS NULL;
                "#,
            )
            .await?;

        // Cleanup scan: soft-deleted rows awaiting physical reclamation
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE INDEX idx_files_deleted_at
                ON files (deleted_at)
                WHERE deleted_at IS NOT NULL;
                "#,
            )
            .await?;

        // Cleanup scan: bad-status aging and claim compare-and-set
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE INDEX idx_files_status_changed
                ON files (status, status_changed_at);
                "#,
            )
            .await?;

        // Bulk delete and listing filters
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE INDEX idx_files_tags
                ON files (app_id, user_id, purpose)
                WHERE deleted_at IS NULL;
                "#,
            )
            .await?;

        // Listing default ordering
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE INDEX idx_files_created_at
                ON files (created_at DESC)
                WHERE deleted_at IS NULL;
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DROP INDEX IF EXISTS uq_files_checksum_mime_ready;
                DROP INDEX IF EXISTS idx_files_deleted_at;
                DROP INDEX IF EXISTS idx_files_status_changed;
                DROP INDEX IF EXISTS idx_files_tags;
                DROP INDEX IF EXISTS idx_files_created_at;
                "#,
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Files::Table).to_owned())
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DROP TYPE IF EXISTS optimization_status;
                DROP TYPE IF EXISTS file_status;
                "#,
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Files {
    Table,
    Id,
    Filename,
    AppId,
    UserId,
    Purpose,
    MimeType,
    Size,
    Checksum,
    S3Key,
    S3Bucket,
    OriginalMimeType,
    OriginalSize,
    OriginalChecksum,
    OriginalS3Key,
    Status,
    OptimizationStatus,
    OptimizationParams,
    OptimizationError,
    OptimizationStartedAt,
    OptimizationCompletedAt,
    Metadata,
    Exif,
    CreatedAt,
    StatusChangedAt,
    UploadedAt,
    DeletedAt,
}
