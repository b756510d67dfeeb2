use actix_web::http::StatusCode;
use actix_web::{post, web, Responder};
use serde::Deserialize;

use crate::files::application::domain::entities::FileTags;
use crate::files::application::services::UrlFetchError;
use crate::files::application::use_cases::{UploadFromUrlCommand, UploadFromUrlError};
use crate::shared::api::ApiResponse;
use crate::AppState;

use super::{map_upload_error, FileResponse, OptimizeInput};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFromUrlRequest {
    pub url: String,

    #[serde(default)]
    pub optimize: OptimizeInput,

    #[serde(default)]
    pub metadata: Option<serde_json::Value>,

    #[serde(default)]
    pub tags: Option<FileTags>,
}

#[post("/api/v1/files/from-url")]
pub async fn upload_from_url_handler(
    req: web::Json<UploadFromUrlRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    let req = req.into_inner();

    let compress_params = match req.optimize.into_params() {
        Ok(params) => params,
        Err(message) => return ApiResponse::bad_request("INVALID_OPTIMIZE_PARAMS", &message),
    };

    match data
        .upload_from_url
        .execute(UploadFromUrlCommand {
            url: req.url,
            tags: req.tags.unwrap_or_default(),
            metadata: req.metadata.unwrap_or_else(|| serde_json::json!({})),
            compress_params,
        })
        .await
    {
        Ok(record) => ApiResponse::created(FileResponse::from(record)),

        Err(UploadFromUrlError::Fetch(e)) => match e {
            UrlFetchError::Invalid(message) => {
                ApiResponse::bad_request("INVALID_URL", &message)
            }
            UrlFetchError::Blocked(policy_error) => {
                ApiResponse::bad_request("URL_BLOCKED", &policy_error.to_string())
            }
            UrlFetchError::TooManyRedirects(limit) => ApiResponse::bad_request(
                "TOO_MANY_REDIRECTS",
                &format!("gave up after {limit} redirects"),
            ),
            UrlFetchError::TooLarge(limit) => ApiResponse::bad_request(
                "DOWNLOAD_TOO_LARGE",
                &format!("remote file exceeds the {limit} byte limit"),
            ),
            UrlFetchError::Timeout => {
                ApiResponse::bad_request("DOWNLOAD_TIMEOUT", "remote download timed out")
            }
            UrlFetchError::Http(status) => ApiResponse::bad_request(
                "DOWNLOAD_FAILED",
                &format!("remote returned HTTP {status}"),
            ),
            UrlFetchError::Transport(message) => {
                ApiResponse::bad_request("DOWNLOAD_FAILED", &message)
            }
        },

        // the remote body failed mid-stream (guard trip or disconnect)
        Err(UploadFromUrlError::Upload(e)) => map_upload_error(e, StatusCode::BAD_REQUEST),
    }
}
