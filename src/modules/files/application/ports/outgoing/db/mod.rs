mod file_repository;
mod thumbnail_repository;

pub use file_repository::{
    BulkDeleteOutcome, CompleteOptimization, FileListPage, FileRepository, FileRepositoryError,
    FileSortBy, ListFilesQuery, NewFileRecord, PromoteToReady, SoftDeleteOutcome, SortOrder,
};
pub use thumbnail_repository::{NewThumbnail, ThumbnailRepository, ThumbnailRepositoryError};
