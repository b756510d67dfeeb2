use actix_web::http::header;
use actix_web::http::StatusCode;
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use uuid::Uuid;

use crate::files::application::domain::filename;
use crate::files::application::ports::outgoing::blob_storage::ByteRange;
use crate::files::application::use_cases::DownloadFileError;
use crate::shared::api::ApiResponse;
use crate::AppState;

/// `bytes=a-b` or `bytes=a-`. Multi-range and suffix forms degrade to a
/// full response.
fn parse_range(header_value: &str) -> Option<ByteRange> {
    let spec = header_value.strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start_raw, end_raw) = spec.split_once('-')?;
    let start: u64 = start_raw.trim().parse().ok()?;
    let end: u64 = if end_raw.trim().is_empty() {
        u64::MAX
    } else {
        end_raw.trim().parse().ok()?
    };
    if end < start {
        return None;
    }
    Some(ByteRange { start, end })
}

fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if if_none_match.trim() == "*" {
        return true;
    }
    if_none_match
        .split(',')
        .map(|candidate| {
            candidate
                .trim()
                .trim_start_matches("W/")
                .trim_matches('"')
        })
        .any(|candidate| candidate == etag)
}

#[get("/api/v1/files/{id}/download")]
pub async fn download_file_handler(
    path: web::Path<Uuid>,
    req: HttpRequest,
    data: web::Data<AppState>,
) -> impl Responder {
    let range = req
        .headers()
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_range);

    let payload = match data.download_file.execute(path.into_inner(), range).await {
        Ok(payload) => payload,
        Err(DownloadFileError::NotFound) => {
            return ApiResponse::not_found("FILE_NOT_FOUND", "File does not exist")
        }
        Err(DownloadFileError::Gone) => {
            return ApiResponse::error(StatusCode::GONE, "FILE_DELETED", "File has been deleted")
        }
        Err(DownloadFileError::NotReady) => {
            return ApiResponse::conflict("FILE_NOT_READY", "File is not ready for download")
        }
        Err(DownloadFileError::OptimizationFailed(message)) => {
            return ApiResponse::conflict("OPTIMIZATION_FAILED", &message)
        }
        Err(DownloadFileError::WaitTimeout) => {
            return ApiResponse::error(
                StatusCode::REQUEST_TIMEOUT,
                "OPTIMIZATION_PENDING",
                "Timed out waiting for optimization to finish",
            )
        }
        Err(DownloadFileError::Storage(message)) => {
            tracing::error!(error = %message, "download storage error");
            return ApiResponse::error(
                StatusCode::BAD_GATEWAY,
                "STORAGE_ERROR",
                "Could not read the file from storage",
            );
        }
        Err(DownloadFileError::RepositoryError(message)) => {
            tracing::error!(error = %message, "download repository error");
            return ApiResponse::internal_error();
        }
    };

    let etag = payload.record.etag().unwrap_or_default().to_string();

    // conditional GET resolves after the optimization wait so the etag
    // reflects the served blob
    if let Some(if_none_match) = req
        .headers()
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
    {
        if !etag.is_empty() && etag_matches(if_none_match, &etag) {
            return HttpResponse::NotModified()
                .insert_header((header::ETAG, format!("\"{etag}\"")))
                .finish();
        }
    }

    let status = if payload.range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut response = HttpResponse::build(status);
    response
        .insert_header((header::CONTENT_TYPE, payload.record.mime_type.clone()))
        .insert_header((header::ACCEPT_RANGES, "bytes"))
        .insert_header((
            header::CACHE_CONTROL,
            "public, max-age=31536000, immutable",
        ))
        .insert_header((header::ETAG, format!("\"{etag}\"")))
        .insert_header((
            header::CONTENT_DISPOSITION,
            filename::content_disposition(&payload.record.filename),
        ))
        .no_chunking(payload.content_length as u64);

    if let Some(range) = payload.range {
        response.insert_header((
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", range.start, range.end, payload.total_size),
        ));
    }

    response.streaming(payload.stream)
}
