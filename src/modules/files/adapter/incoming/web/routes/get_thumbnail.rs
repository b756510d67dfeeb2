use actix_web::http::{header, StatusCode};
use actix_web::{get, web, HttpResponse, Responder};
use serde::Deserialize;
use uuid::Uuid;

use crate::files::application::use_cases::{ThumbnailError, ThumbnailRequest};
use crate::shared::api::ApiResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ThumbnailQuery {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub quality: Option<u8>,
}

#[get("/api/v1/files/{id}/thumbnail")]
pub async fn get_thumbnail_handler(
    path: web::Path<Uuid>,
    query: web::Query<ThumbnailQuery>,
    data: web::Data<AppState>,
) -> impl Responder {
    let query = query.into_inner();

    match data
        .get_thumbnail
        .execute(ThumbnailRequest {
            id: path.into_inner(),
            width: query.width,
            height: query.height,
            quality: query.quality,
        })
        .await
    {
        Ok(payload) => HttpResponse::Ok()
            .insert_header((header::CONTENT_TYPE, payload.mime_type))
            .insert_header((
                header::CACHE_CONTROL,
                format!("public, max-age={}", data.thumbnail_cache_max_age_seconds),
            ))
            .insert_header((header::ETAG, format!("\"{}\"", payload.params_hash)))
            .body(payload.bytes),

        Err(ThumbnailError::NotFound) => {
            ApiResponse::not_found("FILE_NOT_FOUND", "File does not exist")
        }
        Err(ThumbnailError::NotAnImage) => {
            ApiResponse::bad_request("NOT_AN_IMAGE", "Thumbnails exist only for image files")
        }
        Err(ThumbnailError::InvalidDimensions {
            min_width,
            min_height,
            max_width,
            max_height,
        }) => ApiResponse::bad_request(
            "INVALID_DIMENSIONS",
            &format!(
                "width must be {min_width}..={max_width}, height {min_height}..={max_height}"
            ),
        ),
        Err(ThumbnailError::NotReady) => {
            ApiResponse::conflict("FILE_NOT_READY", "File is not ready")
        }
        Err(ThumbnailError::ProcessorUnavailable(message)) => {
            tracing::warn!(error = %message, "thumbnail generation unavailable");
            ApiResponse::error(
                StatusCode::SERVICE_UNAVAILABLE,
                "THUMBNAIL_UNAVAILABLE",
                "Thumbnail generation is currently unavailable",
            )
        }
        Err(ThumbnailError::Storage(message)) => {
            tracing::error!(error = %message, "thumbnail storage error");
            ApiResponse::error(StatusCode::BAD_GATEWAY, "STORAGE_ERROR", "Storage error")
        }
        Err(ThumbnailError::RepositoryError(message)) => {
            tracing::error!(error = %message, "thumbnail repository error");
            ApiResponse::internal_error()
        }
    }
}
