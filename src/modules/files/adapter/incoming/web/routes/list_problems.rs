use actix_web::{get, web, Responder};
use serde::{Deserialize, Serialize};

use crate::files::application::domain::problems::Problem;
use crate::files::application::use_cases::ListProblemsError;
use crate::shared::api::ApiResponse;
use crate::AppState;

use super::FileResponse;

#[derive(Debug, Deserialize)]
pub struct ListProblemsParams {
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Serialize)]
struct ProblemFileResponse {
    #[serde(flatten)]
    file: FileResponse,
    problems: Vec<Problem>,
}

#[derive(Serialize)]
struct ListProblemsResponse {
    items: Vec<ProblemFileResponse>,
}

#[get("/api/v1/files/problems")]
pub async fn list_problems_handler(
    params: web::Query<ListProblemsParams>,
    data: web::Data<AppState>,
) -> impl Responder {
    match data.list_problems.execute(params.limit).await {
        Ok(problem_files) => ApiResponse::success(ListProblemsResponse {
            items: problem_files
                .into_iter()
                .map(|pf| ProblemFileResponse {
                    file: FileResponse::from(pf.file),
                    problems: pf.problems,
                })
                .collect(),
        }),
        Err(ListProblemsError::RepositoryError(e)) => {
            tracing::error!(error = %e, "list problems failed");
            ApiResponse::internal_error()
        }
    }
}
