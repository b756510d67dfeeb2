use actix_web::{get, web, HttpResponse, Responder};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
struct LivenessResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct QueueStatus {
    size: i64,
    pending: i64,
}

#[derive(Serialize)]
struct ImageProcessingStatus {
    status: String,
    queue: QueueStatus,
}

#[derive(Serialize)]
struct StorageStatus {
    s3: &'static str,
    database: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    storage: StorageStatus,
    #[serde(rename = "imageProcessing")]
    image_processing: ImageProcessingStatus,
}

/// LIVENESS PROBE
/// - No I/O
#[get("/health")]
pub async fn liveness() -> impl Responder {
    HttpResponse::Ok().json(LivenessResponse { status: "ok" })
}

/// Composite health: blob backend, metadata database, image processor.
/// A dead image processor degrades the report but keeps the service up;
/// plain uploads and downloads do not need it.
#[get("/api/v1/health")]
pub async fn health(data: web::Data<AppState>) -> impl Responder {
    let database = match data.health_files.health_check().await {
        Ok(()) => "ok",
        Err(_) => "unhealthy",
    };
    let s3 = match data.health_blobs.health_check().await {
        Ok(()) => "ok",
        Err(_) => "unhealthy",
    };

    let image_processing = match data.health_processor.health().await {
        Ok(processor_health) => ImageProcessingStatus {
            status: processor_health.status,
            queue: QueueStatus {
                size: processor_health.queue_size,
                pending: processor_health.queue_pending,
            },
        },
        Err(e) => ImageProcessingStatus {
            status: e.to_string(),
            queue: QueueStatus {
                size: 0,
                pending: 0,
            },
        },
    };

    let critical_ok = database == "ok" && s3 == "ok";
    let body = HealthResponse {
        status: if critical_ok { "ok" } else { "unhealthy" },
        storage: StorageStatus { s3, database },
        image_processing,
    };

    if critical_ok {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
