pub mod bulk_delete;
pub mod delete_file;
pub mod download_file;
pub mod get_exif;
pub mod get_file;
pub mod get_thumbnail;
pub mod list_files;
pub mod list_problems;
pub mod upload_file;
pub mod upload_from_url;

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::files::application::domain::entities::{
    FileRecord, FileStatus, FileTags, OptimizationStatus,
};
use crate::files::application::ports::outgoing::image_processor::ProcessParams;
use crate::files::application::services::UploadError;
use crate::shared::api::ApiResponse;

pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(upload_file::upload_file_handler)
        .service(upload_from_url::upload_from_url_handler)
        .service(list_problems::list_problems_handler)
        .service(bulk_delete::bulk_delete_handler)
        .service(list_files::list_files_handler)
        .service(get_file::get_file_handler)
        .service(download_file::download_file_handler)
        .service(get_exif::get_exif_handler)
        .service(get_thumbnail::get_thumbnail_handler)
        .service(delete_file::delete_file_handler);
}

//
// ──────────────────────────────────────────────────────────
// Shared response DTO
// ──────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimization_status: Option<OptimizationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimization_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_checksum: Option<String>,
    #[serde(flatten)]
    pub tags: FileTags,
    pub metadata: serde_json::Value,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
}

impl From<FileRecord> for FileResponse {
    fn from(record: FileRecord) -> Self {
        FileResponse {
            id: record.id,
            filename: record.filename,
            mime_type: record.mime_type,
            size: record.size,
            checksum: record.checksum,
            status: record.status,
            optimization_status: record.optimization_status,
            optimization_error: record.optimization_error,
            original_mime_type: record.original_mime_type,
            original_size: record.original_size,
            original_checksum: record.original_checksum,
            tags: record.tags,
            metadata: record.metadata,
            created_at: record.created_at.to_rfc3339(),
            uploaded_at: record.uploaded_at.map(|t| t.to_rfc3339()),
        }
    }
}

//
// ──────────────────────────────────────────────────────────
// Shared request parsing
// ──────────────────────────────────────────────────────────
//

/// The `optimize` input: absent/false opts out, `true` opts in with policy
/// defaults, an object carries explicit parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(untagged)]
pub enum OptimizeInput {
    #[default]
    Unset,
    Flag(bool),
    Params(ProcessParams),
}

impl OptimizeInput {
    pub fn into_params(self) -> Result<Option<ProcessParams>, String> {
        match self {
            OptimizeInput::Unset | OptimizeInput::Flag(false) => Ok(None),
            OptimizeInput::Flag(true) => Ok(Some(ProcessParams::default())),
            OptimizeInput::Params(params) => Ok(Some(params)),
        }
    }

    pub fn parse_json(raw: &str) -> Result<Option<ProcessParams>, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<OptimizeInput>(trimmed)
            .map_err(|e| format!("invalid optimize parameter: {e}"))?
            .into_params()
    }
}

/// The status-code side of the upload error taxonomy; the oversize case
/// differs per route (413 for direct uploads, 400 for URL ingests).
pub(crate) fn map_upload_error(e: UploadError, oversize_status: StatusCode) -> HttpResponse {
    use crate::files::application::domain::policies::upload_policy::UploadPolicyError;

    match e {
        UploadError::Policy(UploadPolicyError::BlockedMimeType(mime)) => ApiResponse::error(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "MIME_TYPE_BLOCKED",
            &format!("MIME type '{mime}' is not accepted"),
        ),
        UploadError::Policy(policy_error @ UploadPolicyError::TooLarge { .. }) => {
            ApiResponse::error(oversize_status, "FILE_TOO_LARGE", &policy_error.to_string())
        }
        UploadError::OptimizerUnavailable => ApiResponse::error(
            StatusCode::SERVICE_UNAVAILABLE,
            "OPTIMIZER_UNAVAILABLE",
            "Image optimization is currently unavailable",
        ),
        UploadError::Source(message) => {
            ApiResponse::bad_request("UPLOAD_ABORTED", &format!("Upload aborted: {message}"))
        }
        UploadError::Storage(message) => {
            tracing::error!(error = %message, "storage error during upload");
            ApiResponse::error(
                StatusCode::BAD_GATEWAY,
                "STORAGE_ERROR",
                "Could not store the file",
            )
        }
        UploadError::Database(message) => {
            tracing::error!(error = %message, "database error during upload");
            ApiResponse::internal_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimize_input_variants() {
        assert!(OptimizeInput::parse_json("").unwrap().is_none());
        assert!(OptimizeInput::parse_json("false").unwrap().is_none());
        assert_eq!(
            OptimizeInput::parse_json("true").unwrap(),
            Some(ProcessParams::default())
        );

        let params = OptimizeInput::parse_json(r#"{"quality": 70, "format": "webp"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(params.quality, Some(70));
        assert_eq!(params.format.as_deref(), Some("webp"));
    }

    #[test]
    fn test_optimize_input_rejects_unknown_fields() {
        assert!(OptimizeInput::parse_json(r#"{"qualty": 70}"#).is_err());
    }

    #[test]
    fn test_file_response_projection() {
        use crate::files::application::domain::entities::test_support::ready_file;

        let record = ready_file();
        let response = FileResponse::from(record.clone());
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["id"], record.id.to_string());
        assert_eq!(json["status"], "ready");
        assert_eq!(json["mimeType"], "image/png");
        // unset optionals are omitted entirely
        assert!(json.get("optimizationStatus").is_none());
        assert!(json.get("originalChecksum").is_none());
    }
}
