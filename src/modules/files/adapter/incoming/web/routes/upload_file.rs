use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{post, web, Responder};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use std::io;
use tokio_stream::wrappers::ReceiverStream;
use tracing::error;

use crate::files::application::domain::entities::FileTags;
use crate::files::application::ports::outgoing::blob_storage::BlobByteStream;
use crate::files::application::services::UploadRequest;
use crate::shared::api::ApiResponse;
use crate::AppState;

use super::{map_upload_error, FileResponse, OptimizeInput};

/// Multipart upload. Text fields (`optimize`, `metadata`, `appId`, `userId`,
/// `purpose`) must precede the `file` part; the body is consumed in order
/// and the upload starts the moment the file part is reached.
#[post("/api/v1/files")]
pub async fn upload_file_handler(
    mut multipart: Multipart,
    data: web::Data<AppState>,
) -> impl Responder {
    let mut optimize_raw: Option<String> = None;
    let mut metadata: serde_json::Value = serde_json::json!({});
    let mut tags = FileTags::default();

    while let Ok(Some(mut field)) = multipart.try_next().await {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let filename = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .unwrap_or("file")
                .to_string();
            let mime_type = field
                .content_type()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());

            let compress_params =
                match OptimizeInput::parse_json(optimize_raw.as_deref().unwrap_or("")) {
                    Ok(params) => params,
                    Err(message) => {
                        return ApiResponse::bad_request("INVALID_OPTIMIZE_PARAMS", &message)
                    }
                };

            // The multipart field is pinned to this worker; bridge it over a
            // channel so the pipeline gets a Send stream, and pump the two
            // concurrently. Dropping the sender ends the stream; the pipeline
            // dropping the receiver aborts the pump (client gone or rejected).
            let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, io::Error>>(8);
            let stream: BlobByteStream = Box::pin(ReceiverStream::new(rx));

            let pump = async move {
                while let Some(chunk) = field.next().await {
                    let item = chunk.map_err(|e| io::Error::other(e.to_string()));
                    let failed = item.is_err();
                    if tx.send(item).await.is_err() || failed {
                        break;
                    }
                }
            };

            let upload = data.upload_file.execute(
                stream,
                UploadRequest {
                    filename,
                    mime_type,
                    tags,
                    metadata,
                    compress_params,
                },
            );

            let (_, result) = futures::join!(pump, upload);

            return match result {
                Ok(record) => ApiResponse::created(FileResponse::from(record)),
                Err(e) => map_upload_error(e, StatusCode::PAYLOAD_TOO_LARGE),
            };
        }

        // buffer small text fields
        let mut value = Vec::new();
        while let Some(chunk) = field.next().await {
            match chunk {
                Ok(bytes) => value.extend_from_slice(&bytes),
                Err(e) => {
                    error!(field = %name, error = %e, "multipart field read failed");
                    return ApiResponse::bad_request(
                        "MALFORMED_MULTIPART",
                        "Malformed multipart body",
                    );
                }
            }
        }
        let value = String::from_utf8_lossy(&value).to_string();

        match name.as_str() {
            "optimize" => optimize_raw = Some(value),
            "metadata" => {
                metadata = match serde_json::from_str(&value) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        return ApiResponse::bad_request(
                            "INVALID_METADATA",
                            &format!("metadata is not valid JSON: {e}"),
                        )
                    }
                }
            }
            "appId" => tags.app_id = Some(value),
            "userId" => tags.user_id = Some(value),
            "purpose" => tags.purpose = Some(value),
            _ => {}
        }
    }

    ApiResponse::bad_request("MISSING_FILE", "Multipart body carries no 'file' part")
}
