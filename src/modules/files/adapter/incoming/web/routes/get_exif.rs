use actix_web::{get, web, Responder};
use serde::Serialize;
use uuid::Uuid;

use crate::files::application::use_cases::GetExifError;
use crate::shared::api::ApiResponse;
use crate::AppState;

#[derive(Serialize)]
struct ExifResponse {
    exif: Option<serde_json::Value>,
}

#[get("/api/v1/files/{id}/exif")]
pub async fn get_exif_handler(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> impl Responder {
    match data.get_exif.execute(path.into_inner()).await {
        Ok(exif) => ApiResponse::success(ExifResponse { exif }),
        Err(GetExifError::NotFound) => {
            ApiResponse::not_found("FILE_NOT_FOUND", "File does not exist")
        }
        Err(GetExifError::RepositoryError(e)) => {
            tracing::error!(error = %e, "get exif failed");
            ApiResponse::internal_error()
        }
    }
}
