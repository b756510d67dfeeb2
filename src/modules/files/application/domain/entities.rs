use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of a stored file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Uploading,
    Ready,
    Deleting,
    Deleted,
    Failed,
    Missing,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Uploading => "uploading",
            FileStatus::Ready => "ready",
            FileStatus::Deleting => "deleting",
            FileStatus::Deleted => "deleted",
            FileStatus::Failed => "failed",
            FileStatus::Missing => "missing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploading" => Some(FileStatus::Uploading),
            "ready" => Some(FileStatus::Ready),
            "deleting" => Some(FileStatus::Deleting),
            "deleted" => Some(FileStatus::Deleted),
            "failed" => Some(FileStatus::Failed),
            "missing" => Some(FileStatus::Missing),
            _ => None,
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of the asynchronous image optimization attached to a file, if any.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl OptimizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationStatus::Pending => "pending",
            OptimizationStatus::Processing => "processing",
            OptimizationStatus::Ready => "ready",
            OptimizationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OptimizationStatus::Pending),
            "processing" => Some(OptimizationStatus::Processing),
            "ready" => Some(OptimizationStatus::Ready),
            "failed" => Some(OptimizationStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for OptimizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Free-form tag triple attached at upload time. Drives bulk operations and
/// listing filters; no referential meaning inside this service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileTags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

impl FileTags {
    /// True when no tag carries a non-empty value.
    pub fn is_empty(&self) -> bool {
        fn blank(v: &Option<String>) -> bool {
            v.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true)
        }
        blank(&self.app_id) && blank(&self.user_id) && blank(&self.purpose)
    }
}

/// The central entity: one metadata row per stored object.
///
/// `checksum`, `size` and `uploaded_at` are populated on promotion to
/// `ready`. The `original_*` group is set only when an optimization was
/// requested and preserves the pre-optimization blob identity until the
/// optimized blob replaces it.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub id: Uuid,
    pub filename: String,
    pub tags: FileTags,

    pub mime_type: String,
    pub size: Option<i64>,
    pub checksum: Option<String>,
    pub s3_key: String,
    pub s3_bucket: String,

    pub original_mime_type: Option<String>,
    pub original_size: Option<i64>,
    pub original_checksum: Option<String>,
    pub original_s3_key: Option<String>,

    pub status: FileStatus,
    pub optimization_status: Option<OptimizationStatus>,
    pub optimization_params: Option<serde_json::Value>,
    pub optimization_error: Option<String>,
    pub optimization_started_at: Option<DateTime<FixedOffset>>,
    pub optimization_completed_at: Option<DateTime<FixedOffset>>,

    pub metadata: serde_json::Value,
    pub exif: Option<serde_json::Value>,

    pub created_at: DateTime<FixedOffset>,
    pub status_changed_at: DateTime<FixedOffset>,
    pub uploaded_at: Option<DateTime<FixedOffset>>,
    pub deleted_at: Option<DateTime<FixedOffset>>,
}

impl FileRecord {
    pub fn is_soft_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Hex digest without the `sha256:` prefix; used as the HTTP ETag.
    pub fn etag(&self) -> Option<&str> {
        self.checksum
            .as_deref()
            .map(|c| c.strip_prefix("sha256:").unwrap_or(c))
    }

    /// Optimization is still in flight (readers must wait).
    pub fn optimization_in_flight(&self) -> bool {
        matches!(
            self.optimization_status,
            Some(OptimizationStatus::Pending) | Some(OptimizationStatus::Processing)
        )
    }
}

/// One cached derived rendition of a file.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailRecord {
    pub id: Uuid,
    pub file_id: Uuid,
    pub width: i32,
    pub height: i32,
    pub quality: i32,
    pub params_hash: String,
    pub s3_key: String,
    pub s3_bucket: String,
    pub size: i64,
    pub mime_type: String,
    pub last_accessed_at: DateTime<FixedOffset>,
    pub created_at: DateTime<FixedOffset>,
}
