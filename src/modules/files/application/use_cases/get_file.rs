use async_trait::async_trait;
use uuid::Uuid;

use crate::files::application::domain::entities::FileRecord;
use crate::files::application::ports::outgoing::db::FileRepository;

#[derive(Debug, Clone)]
pub enum GetFileError {
    NotFound,
    RepositoryError(String),
}

/// An interface for fetching one file's metadata.
#[async_trait]
pub trait IGetFileUseCase: Send + Sync {
    async fn execute(&self, id: Uuid) -> Result<FileRecord, GetFileError>;
}

pub struct GetFileUseCase<R>
where
    R: FileRepository,
{
    files: R,
}

impl<R> GetFileUseCase<R>
where
    R: FileRepository,
{
    pub fn new(files: R) -> Self {
        Self { files }
    }
}

#[async_trait]
impl<R> IGetFileUseCase for GetFileUseCase<R>
where
    R: FileRepository + Sync + Send,
{
    async fn execute(&self, id: Uuid) -> Result<FileRecord, GetFileError> {
        let record = self
            .files
            .find_by_id(id)
            .await
            .map_err(|e| GetFileError::RepositoryError(e.to_string()))?;

        // soft-deleted rows are invisible to reads
        match record {
            Some(record) if !record.is_soft_deleted() => Ok(record),
            _ => Err(GetFileError::NotFound),
        }
    }
}
