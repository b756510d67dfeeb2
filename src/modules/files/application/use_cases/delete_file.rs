use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::files::application::ports::outgoing::db::{
    FileRepository, FileRepositoryError, SoftDeleteOutcome,
};

#[derive(Debug, Clone)]
pub enum DeleteFileError {
    NotFound,
    RepositoryError(String),
}

/// An interface for soft-deleting a file. Idempotent: repeating the call on
/// an already-deleted file succeeds without a second transition.
#[async_trait]
pub trait IDeleteFileUseCase: Send + Sync {
    async fn execute(&self, id: Uuid) -> Result<(), DeleteFileError>;
}

pub struct DeleteFileUseCase<R>
where
    R: FileRepository,
{
    files: R,
}

impl<R> DeleteFileUseCase<R>
where
    R: FileRepository,
{
    pub fn new(files: R) -> Self {
        Self { files }
    }
}

#[async_trait]
impl<R> IDeleteFileUseCase for DeleteFileUseCase<R>
where
    R: FileRepository + Sync + Send,
{
    async fn execute(&self, id: Uuid) -> Result<(), DeleteFileError> {
        match self.files.soft_delete(id).await {
            Ok(SoftDeleteOutcome::Deleted) => {
                info!(file_id = %id, "file soft-deleted");
                Ok(())
            }
            Ok(SoftDeleteOutcome::AlreadyDeleted) => Ok(()),
            Err(FileRepositoryError::NotFound) => Err(DeleteFileError::NotFound),
            Err(e) => Err(DeleteFileError::RepositoryError(e.to_string())),
        }
    }
}
