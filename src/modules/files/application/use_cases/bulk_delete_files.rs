use async_trait::async_trait;
use tracing::info;

use crate::files::application::domain::entities::FileTags;
use crate::files::application::ports::outgoing::db::{BulkDeleteOutcome, FileRepository};

const DEFAULT_LIMIT: u64 = 100;
const MAX_LIMIT: u64 = 1000;

#[derive(Debug, Clone)]
pub enum BulkDeleteError {
    /// At least one of appId / userId / purpose must carry a value.
    MissingTagFilter,
    RepositoryError(String),
}

#[derive(Debug, Clone)]
pub struct BulkDeleteCommand {
    pub tags: FileTags,
    pub limit: Option<u64>,
    pub dry_run: bool,
}

/// An interface for tag-scoped mass soft-deletion.
#[async_trait]
pub trait IBulkDeleteFilesUseCase: Send + Sync {
    async fn execute(&self, command: BulkDeleteCommand)
        -> Result<BulkDeleteOutcome, BulkDeleteError>;
}

pub struct BulkDeleteFilesUseCase<R>
where
    R: FileRepository,
{
    files: R,
}

impl<R> BulkDeleteFilesUseCase<R>
where
    R: FileRepository,
{
    pub fn new(files: R) -> Self {
        Self { files }
    }
}

#[async_trait]
impl<R> IBulkDeleteFilesUseCase for BulkDeleteFilesUseCase<R>
where
    R: FileRepository + Sync + Send,
{
    async fn execute(
        &self,
        command: BulkDeleteCommand,
    ) -> Result<BulkDeleteOutcome, BulkDeleteError> {
        // an empty filter would soft-delete the whole store
        if command.tags.is_empty() {
            return Err(BulkDeleteError::MissingTagFilter);
        }

        let limit = command.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

        let outcome = self
            .files
            .bulk_soft_delete(&command.tags, limit, command.dry_run)
            .await
            .map_err(|e| BulkDeleteError::RepositoryError(e.to_string()))?;

        if !command.dry_run && outcome.deleted > 0 {
            info!(
                matched = outcome.matched,
                deleted = outcome.deleted,
                "bulk soft-delete"
            );
        }
        Ok(outcome)
    }
}
