use actix_web::{delete, web, Responder};
use uuid::Uuid;

use crate::files::application::use_cases::DeleteFileError;
use crate::shared::api::ApiResponse;
use crate::AppState;

#[delete("/api/v1/files/{id}")]
pub async fn delete_file_handler(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> impl Responder {
    match data.delete_file.execute(path.into_inner()).await {
        Ok(()) => ApiResponse::no_content(),
        Err(DeleteFileError::NotFound) => {
            ApiResponse::not_found("FILE_NOT_FOUND", "File does not exist")
        }
        Err(DeleteFileError::RepositoryError(e)) => {
            tracing::error!(error = %e, "delete file failed");
            ApiResponse::internal_error()
        }
    }
}
