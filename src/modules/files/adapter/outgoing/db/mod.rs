pub mod file_repository_postgres;
pub mod thumbnail_repository_postgres;

pub use file_repository_postgres::FileRepositoryPostgres;
pub use thumbnail_repository_postgres::ThumbnailRepositoryPostgres;
