use async_trait::async_trait;

use crate::files::application::ports::outgoing::db::{
    FileListPage, FileRepository, ListFilesQuery,
};

const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone)]
pub enum ListFilesError {
    RepositoryError(String),
}

/// An interface for listing files with filters and pagination.
#[async_trait]
pub trait IListFilesUseCase: Send + Sync {
    async fn execute(&self, query: ListFilesQuery) -> Result<FileListPage, ListFilesError>;
}

pub struct ListFilesUseCase<R>
where
    R: FileRepository,
{
    files: R,
}

impl<R> ListFilesUseCase<R>
where
    R: FileRepository,
{
    pub fn new(files: R) -> Self {
        Self { files }
    }
}

#[async_trait]
impl<R> IListFilesUseCase for ListFilesUseCase<R>
where
    R: FileRepository + Sync + Send,
{
    async fn execute(&self, mut query: ListFilesQuery) -> Result<FileListPage, ListFilesError> {
        query.limit = query.limit.clamp(1, MAX_PAGE_SIZE);

        self.files
            .list(&query)
            .await
            .map_err(|e| ListFilesError::RepositoryError(e.to_string()))
    }
}
