use async_trait::async_trait;
use uuid::Uuid;

use crate::files::application::ports::outgoing::db::FileRepository;

#[derive(Debug, Clone)]
pub enum GetExifError {
    NotFound,
    RepositoryError(String),
}

/// An interface for reading a file's extracted EXIF bag. `None` means
/// extraction has not run or found nothing; both serve as an empty bag.
#[async_trait]
pub trait IGetExifUseCase: Send + Sync {
    async fn execute(&self, id: Uuid) -> Result<Option<serde_json::Value>, GetExifError>;
}

pub struct GetExifUseCase<R>
where
    R: FileRepository,
{
    files: R,
}

impl<R> GetExifUseCase<R>
where
    R: FileRepository,
{
    pub fn new(files: R) -> Self {
        Self { files }
    }
}

#[async_trait]
impl<R> IGetExifUseCase for GetExifUseCase<R>
where
    R: FileRepository + Sync + Send,
{
    async fn execute(&self, id: Uuid) -> Result<Option<serde_json::Value>, GetExifError> {
        let record = self
            .files
            .find_by_id(id)
            .await
            .map_err(|e| GetExifError::RepositoryError(e.to_string()))?;

        match record {
            Some(record) if !record.is_soft_deleted() => Ok(record.exif),
            _ => Err(GetExifError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::application::domain::entities::test_support::ready_file;
    use crate::files::application::services::test_support::InMemoryFileRepository;

    #[tokio::test]
    async fn test_returns_stored_exif() {
        let files = InMemoryFileRepository::new();
        let mut record = ready_file();
        record.exif = Some(serde_json::json!({ "Make": "TestCam" }));
        files.put_record(record.clone());

        let exif = GetExifUseCase::new(files)
            .execute(record.id)
            .await
            .unwrap();
        assert_eq!(exif.unwrap()["Make"], "TestCam");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let use_case = GetExifUseCase::new(InMemoryFileRepository::new());
        assert!(matches!(
            use_case.execute(Uuid::new_v4()).await,
            Err(GetExifError::NotFound)
        ));
    }
}
