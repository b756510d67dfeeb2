//! # Thumbnails Table Migration
//!
//! Derived-image cache rows. A thumbnail exists only while its parent file
//! does (FK cascade) and its blob is never shared, so cleanup may delete the
//! object without a reference-count check. `last_accessed_at` drives age-out.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Thumbnails::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Thumbnails::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Thumbnails::FileId).uuid().not_null())
                    // Generation parameters; params_hash is the cache key
                    .col(ColumnDef::new(Thumbnails::Width).integer().not_null())
                    .col(ColumnDef::new(Thumbnails::Height).integer().not_null())
                    .col(ColumnDef::new(Thumbnails::Quality).integer().not_null())
                    .col(
                        ColumnDef::new(Thumbnails::ParamsHash)
                            .string_len(64)
                            .not_null(),
                    )
                    // Storage location of the derived blob
                    .col(ColumnDef::new(Thumbnails::S3Key).string_len(1024).not_null())
                    .col(ColumnDef::new(Thumbnails::S3Bucket).string_len(255).not_null())
                    .col(ColumnDef::new(Thumbnails::Size).big_integer().not_null())
                    .col(ColumnDef::new(Thumbnails::MimeType).string_len(127).not_null())
                    .col(
                        ColumnDef::new(Thumbnails::LastAccessedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Thumbnails::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_thumbnails_file_id")
                            .from(Thumbnails::Table, Thumbnails::FileId)
                            .to(Files::Table, Files::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One cached rendition per (file, parameter set)
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE UNIQUE INDEX uq_thumbnails_file_params
                ON thumbnails (file_id, params_hash);
                "#,
            )
            .await?;

        // Age-out scan
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE INDEX idx_thumbnails_last_accessed
                ON thumbnails (last_accessed_at);
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
                DROP INDEX IF EXISTS uq_thumbnails_file_params;
                DROP INDEX IF EXISTS idx_thumbnails_last_accessed;
                "#,
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Thumbnails::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Thumbnails {
    Table,
    Id,
    FileId,
    Width,
    Height,
    Quality,
    ParamsHash,
    S3Key,
    S3Bucket,
    Size,
    MimeType,
    LastAccessedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Files {
    Table,
    Id,
}
