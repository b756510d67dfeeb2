use actix_web::{get, web, Responder};
use uuid::Uuid;

use crate::files::application::use_cases::GetFileError;
use crate::shared::api::ApiResponse;
use crate::AppState;

use super::FileResponse;

#[get("/api/v1/files/{id}")]
pub async fn get_file_handler(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> impl Responder {
    match data.get_file.execute(path.into_inner()).await {
        Ok(record) => ApiResponse::success(FileResponse::from(record)),
        Err(GetFileError::NotFound) => {
            ApiResponse::not_found("FILE_NOT_FOUND", "File does not exist")
        }
        Err(GetFileError::RepositoryError(e)) => {
            tracing::error!(error = %e, "get file failed");
            ApiResponse::internal_error()
        }
    }
}
