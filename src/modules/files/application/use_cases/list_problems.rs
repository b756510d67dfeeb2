use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashSet;

use crate::files::application::domain::entities::{FileRecord, FileStatus};
use crate::files::application::domain::problems::{detect_problems, Problem, ProblemCutoffs};
use crate::files::application::ports::outgoing::db::FileRepository;
use crate::shared::config::CleanupConfig;

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 500;

#[derive(Debug, Clone)]
pub enum ListProblemsError {
    RepositoryError(String),
}

#[derive(Debug, Clone)]
pub struct ProblemFile {
    pub file: FileRecord,
    pub problems: Vec<Problem>,
}

/// An interface for surfacing records that violate lifecycle invariants.
#[async_trait]
pub trait IListProblemsUseCase: Send + Sync {
    async fn execute(&self, limit: Option<u64>) -> Result<Vec<ProblemFile>, ListProblemsError>;
}

pub struct ListProblemsUseCase<R>
where
    R: FileRepository,
{
    files: R,
    cleanup: CleanupConfig,
}

impl<R> ListProblemsUseCase<R>
where
    R: FileRepository,
{
    pub fn new(files: R, cleanup: CleanupConfig) -> Self {
        Self { files, cleanup }
    }

    fn cutoffs(&self) -> ProblemCutoffs {
        let now = Utc::now().fixed_offset();
        ProblemCutoffs {
            stuck_uploading_at: now
                - Duration::milliseconds(self.cleanup.stuck_upload_timeout_ms),
            stuck_deleting_at: now
                - Duration::milliseconds(self.cleanup.stuck_delete_timeout_ms),
            stuck_optimization_at: now
                - Duration::milliseconds(self.cleanup.stuck_optimization_timeout_ms),
        }
    }
}

#[async_trait]
impl<R> IListProblemsUseCase for ListProblemsUseCase<R>
where
    R: FileRepository + Sync + Send,
{
    async fn execute(&self, limit: Option<u64>) -> Result<Vec<ProblemFile>, ListProblemsError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let map_err = |e: crate::files::application::ports::outgoing::db::FileRepositoryError| {
            ListProblemsError::RepositoryError(e.to_string())
        };
        let cutoffs = self.cutoffs();

        // Candidates come from three scans; anything a scan misses is by
        // definition not in a problem state.
        let now = Utc::now().fixed_offset();
        let mut candidates = self
            .files
            .select_stale_status(
                &[
                    FileStatus::Uploading,
                    FileStatus::Deleting,
                    FileStatus::Failed,
                    FileStatus::Missing,
                ],
                now,
                limit,
            )
            .await
            .map_err(map_err)?;
        candidates.extend(self.files.select_corrupted(limit).await.map_err(map_err)?);
        candidates.extend(
            self.files
                .select_stuck_optimizations(cutoffs.stuck_optimization_at, limit)
                .await
                .map_err(map_err)?,
        );

        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for file in candidates {
            if !seen.insert(file.id) {
                continue;
            }
            let problems = detect_problems(&file, &cutoffs);
            if problems.is_empty() {
                continue;
            }
            result.push(ProblemFile { file, problems });
            if result.len() as u64 >= limit {
                break;
            }
        }
        Ok(result)
    }
}
