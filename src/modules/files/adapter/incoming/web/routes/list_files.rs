use actix_web::{get, web, Responder};
use serde::{Deserialize, Serialize};

use crate::files::application::domain::entities::FileTags;
use crate::files::application::ports::outgoing::db::{FileSortBy, ListFilesQuery, SortOrder};
use crate::files::application::use_cases::ListFilesError;
use crate::shared::api::ApiResponse;
use crate::AppState;

use super::FileResponse;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesParams {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
}

fn default_limit() -> u64 {
    20
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListFilesResponse {
    items: Vec<FileResponse>,
    total: u64,
    limit: u64,
    offset: u64,
}

fn parse_sort_by(raw: Option<&str>) -> Result<FileSortBy, String> {
    match raw {
        None | Some("createdAt") => Ok(FileSortBy::CreatedAt),
        Some("size") => Ok(FileSortBy::Size),
        Some("filename") => Ok(FileSortBy::Filename),
        Some(other) => Err(format!("unknown sortBy '{other}'")),
    }
}

fn parse_order(raw: Option<&str>) -> Result<SortOrder, String> {
    match raw {
        None | Some("desc") => Ok(SortOrder::Desc),
        Some("asc") => Ok(SortOrder::Asc),
        Some(other) => Err(format!("unknown order '{other}'")),
    }
}

#[get("/api/v1/files")]
pub async fn list_files_handler(
    params: web::Query<ListFilesParams>,
    data: web::Data<AppState>,
) -> impl Responder {
    let params = params.into_inner();

    let sort_by = match parse_sort_by(params.sort_by.as_deref()) {
        Ok(sort_by) => sort_by,
        Err(message) => return ApiResponse::bad_request("INVALID_SORT", &message),
    };
    let order = match parse_order(params.order.as_deref()) {
        Ok(order) => order,
        Err(message) => return ApiResponse::bad_request("INVALID_SORT", &message),
    };

    let query = ListFilesQuery {
        limit: params.limit,
        offset: params.offset,
        sort_by,
        order,
        q: params.q,
        mime_type: params.mime_type,
        tags: FileTags {
            app_id: params.app_id,
            user_id: params.user_id,
            purpose: params.purpose,
        },
    };

    match data.list_files.execute(query).await {
        Ok(page) => {
            let limit = params.limit.clamp(1, 100);
            ApiResponse::success(ListFilesResponse {
                items: page.items.into_iter().map(FileResponse::from).collect(),
                total: page.total,
                limit,
                offset: params.offset,
            })
        }
        Err(ListFilesError::RepositoryError(e)) => {
            tracing::error!(error = %e, "list files failed");
            ApiResponse::internal_error()
        }
    }
}
