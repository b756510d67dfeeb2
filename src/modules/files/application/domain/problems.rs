//! Classifies records that violate lifecycle invariants into operator-facing
//! `{code, message}` items.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::files::application::domain::entities::{FileRecord, FileStatus, OptimizationStatus};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Problem {
    pub code: &'static str,
    pub message: String,
}

impl Problem {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Problem {
            code,
            message: message.into(),
        }
    }
}

/// Absolute cutoffs: anything older than a cutoff in the matching state is
/// considered stuck.
#[derive(Debug, Clone, Copy)]
pub struct ProblemCutoffs {
    pub stuck_uploading_at: DateTime<FixedOffset>,
    pub stuck_deleting_at: DateTime<FixedOffset>,
    pub stuck_optimization_at: DateTime<FixedOffset>,
}

pub fn detect_problems(file: &FileRecord, cutoffs: &ProblemCutoffs) -> Vec<Problem> {
    let mut problems = Vec::new();

    match file.status {
        FileStatus::Failed => {
            problems.push(Problem::new("status_failed", "file is in failed status"));
        }
        FileStatus::Missing => {
            problems.push(Problem::new(
                "status_missing",
                "file blob was reported missing from storage",
            ));
        }
        FileStatus::Uploading => {
            if file.status_changed_at < cutoffs.stuck_uploading_at {
                problems.push(Problem::new(
                    "upload_stuck",
                    format!("upload started {} and never finished", file.status_changed_at),
                ));
            }
        }
        FileStatus::Deleting => {
            if file.status_changed_at < cutoffs.stuck_deleting_at {
                problems.push(Problem::new(
                    "delete_stuck",
                    format!("deletion claimed {} and never completed", file.status_changed_at),
                ));
            }
            if file.deleted_at.is_none() {
                problems.push(Problem::new(
                    "deleted_at_mismatch",
                    "status is deleting but deleted_at is not set",
                ));
            }
        }
        FileStatus::Deleted => {
            if file.deleted_at.is_none() {
                problems.push(Problem::new(
                    "deleted_at_missing",
                    "status is deleted but deleted_at is not set",
                ));
            }
        }
        FileStatus::Ready => {
            if file.s3_key.is_empty() {
                problems.push(Problem::new(
                    "s3_key_missing",
                    "ready file has an empty storage key",
                ));
            }
            if file.checksum.is_none() {
                problems.push(Problem::new(
                    "checksum_missing",
                    "ready file has no checksum",
                ));
            }
            if file.size.is_none() {
                problems.push(Problem::new("size_missing", "ready file has no size"));
            }
            if file.uploaded_at.is_none() {
                problems.push(Problem::new(
                    "uploaded_at_missing",
                    "ready file has no uploaded_at timestamp",
                ));
            }
        }
    }

    match file.optimization_status {
        Some(OptimizationStatus::Failed) => {
            problems.push(Problem::new(
                "optimization_failed",
                file.optimization_error
                    .clone()
                    .unwrap_or_else(|| "optimization failed".to_string()),
            ));
        }
        Some(OptimizationStatus::Pending) | Some(OptimizationStatus::Processing) => {
            let reference = file.optimization_started_at.unwrap_or(file.created_at);
            if reference < cutoffs.stuck_optimization_at {
                problems.push(Problem::new(
                    "optimization_stuck",
                    format!("optimization has been in flight since {}", reference),
                ));
            }
        }
        _ => {}
    }

    problems
}
