pub mod bulk_delete_files;
pub mod delete_file;
pub mod download_file;
pub mod get_exif;
pub mod get_file;
pub mod get_thumbnail;
pub mod list_files;
pub mod list_problems;
pub mod upload_file;
pub mod upload_from_url;

pub use bulk_delete_files::{
    BulkDeleteCommand, BulkDeleteError, BulkDeleteFilesUseCase, IBulkDeleteFilesUseCase,
};
pub use delete_file::{DeleteFileError, DeleteFileUseCase, IDeleteFileUseCase};
pub use download_file::{
    DownloadFileError, DownloadFileUseCase, DownloadPayload, IDownloadFileUseCase,
};
pub use get_exif::{GetExifError, GetExifUseCase, IGetExifUseCase};
pub use get_file::{GetFileError, GetFileUseCase, IGetFileUseCase};
pub use get_thumbnail::{
    GetThumbnailUseCase, IGetThumbnailUseCase, ThumbnailError, ThumbnailPayload, ThumbnailRequest,
};
pub use list_files::{IListFilesUseCase, ListFilesError, ListFilesUseCase};
pub use list_problems::{
    IListProblemsUseCase, ListProblemsError, ListProblemsUseCase, ProblemFile,
};
pub use upload_file::{IUploadFileUseCase, UploadFileUseCase};
pub use upload_from_url::{
    IUploadFromUrlUseCase, UploadFromUrlCommand, UploadFromUrlError, UploadFromUrlUseCase,
};
