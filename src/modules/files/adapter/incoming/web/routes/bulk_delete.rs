use actix_web::{post, web, Responder};
use serde::{Deserialize, Serialize};

use crate::files::application::domain::entities::FileTags;
use crate::files::application::use_cases::{BulkDeleteCommand, BulkDeleteError};
use crate::shared::api::ApiResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Serialize)]
struct BulkDeleteResponse {
    matched: u64,
    deleted: u64,
}

#[post("/api/v1/files/bulk-delete")]
pub async fn bulk_delete_handler(
    req: web::Json<BulkDeleteRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    let req = req.into_inner();

    match data
        .bulk_delete
        .execute(BulkDeleteCommand {
            tags: FileTags {
                app_id: req.app_id,
                user_id: req.user_id,
                purpose: req.purpose,
            },
            limit: req.limit,
            dry_run: req.dry_run,
        })
        .await
    {
        Ok(outcome) => ApiResponse::success(BulkDeleteResponse {
            matched: outcome.matched,
            deleted: outcome.deleted,
        }),
        Err(BulkDeleteError::MissingTagFilter) => ApiResponse::bad_request(
            "MISSING_TAG_FILTER",
            "At least one of appId, userId or purpose is required",
        ),
        Err(BulkDeleteError::RepositoryError(e)) => {
            tracing::error!(error = %e, "bulk delete failed");
            ApiResponse::internal_error()
        }
    }
}
