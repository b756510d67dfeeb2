//! Typed configuration, loaded once at startup from the environment
//! (`dotenvy` has already populated it from `.env` by then).
//!
//! Required settings panic at boot with the variable name; everything else
//! carries a default that works against a local minio + postgres setup.

use std::env;
use std::str::FromStr;

use crate::files::application::domain::policies::upload_policy::UploadPolicy;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_required(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} is not set"))
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub force_path_style: bool,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: env_required("S3_ENDPOINT"),
            region: env_string("S3_REGION", "us-east-1"),
            bucket: env_required("S3_BUCKET"),
            access_key_id: env_required("S3_ACCESS_KEY_ID"),
            secret_access_key: env_required("S3_SECRET_ACCESS_KEY"),
            force_path_style: env_bool("S3_FORCE_PATH_STYLE", true),
        }
    }
}

/// Optimizer defaults; user-supplied parameters are clamped against these,
/// and when `force_enabled` is set they win outright.
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    pub force_enabled: bool,
    pub format: String,
    pub max_dimension: u32,
    pub quality: u8,
    pub effort: u8,
    pub lossless: bool,
    pub strip_metadata: bool,
    pub auto_orient: bool,
    pub chroma_subsampling: String,
}

impl CompressionConfig {
    pub fn from_env() -> Self {
        Self {
            force_enabled: env_bool("COMPRESSION_FORCE_ENABLED", false),
            format: env_string("COMPRESSION_FORMAT", "webp"),
            max_dimension: env_or("COMPRESSION_MAX_DIMENSION", 4096),
            quality: env_or("COMPRESSION_QUALITY", 80),
            effort: env_or("COMPRESSION_EFFORT", 4),
            lossless: env_bool("COMPRESSION_LOSSLESS", false),
            strip_metadata: env_bool("COMPRESSION_STRIP_METADATA", true),
            auto_orient: env_bool("COMPRESSION_AUTO_ORIENT", true),
            chroma_subsampling: env_string("COMPRESSION_CHROMA_SUBSAMPLING", "4:2:0"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    pub format: String,
    pub max_width: u32,
    pub max_height: u32,
    pub min_width: u32,
    pub min_height: u32,
    pub quality: u8,
    pub effort: u8,
    pub cache_max_age_seconds: u64,
}

impl ThumbnailConfig {
    pub fn from_env() -> Self {
        Self {
            format: env_string("THUMBNAIL_FORMAT", "webp"),
            max_width: env_or("THUMBNAIL_MAX_WIDTH", 1024),
            max_height: env_or("THUMBNAIL_MAX_HEIGHT", 1024),
            min_width: env_or("THUMBNAIL_MIN_WIDTH", 16),
            min_height: env_or("THUMBNAIL_MIN_HEIGHT", 16),
            quality: env_or("THUMBNAIL_QUALITY", 80),
            effort: env_or("THUMBNAIL_EFFORT", 4),
            cache_max_age_seconds: env_or("THUMBNAIL_CACHE_MAX_AGE_SECONDS", 86_400),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadLimitsConfig {
    pub image_max_bytes_mb: u64,
    pub video_max_bytes_mb: u64,
    pub audio_max_bytes_mb: u64,
    pub document_max_bytes_mb: u64,
    pub block_executable_uploads: bool,
    pub block_archive_uploads: bool,
    pub blocked_mime_types: Vec<String>,
}

impl UploadLimitsConfig {
    pub fn from_env() -> Self {
        let blocked_mime_types = env::var("BLOCKED_MIME_TYPES")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_ascii_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            image_max_bytes_mb: env_or("UPLOAD_IMAGE_MAX_BYTES_MB", 25),
            video_max_bytes_mb: env_or("UPLOAD_VIDEO_MAX_BYTES_MB", 1024),
            audio_max_bytes_mb: env_or("UPLOAD_AUDIO_MAX_BYTES_MB", 256),
            document_max_bytes_mb: env_or("UPLOAD_DOCUMENT_MAX_BYTES_MB", 100),
            block_executable_uploads: env_bool("BLOCK_EXECUTABLE_UPLOADS", true),
            block_archive_uploads: env_bool("BLOCK_ARCHIVE_UPLOADS", false),
            blocked_mime_types,
        }
    }

    pub fn to_policy(&self) -> UploadPolicy {
        const MB: u64 = 1024 * 1024;
        UploadPolicy {
            image_max_bytes: self.image_max_bytes_mb * MB,
            video_max_bytes: self.video_max_bytes_mb * MB,
            audio_max_bytes: self.audio_max_bytes_mb * MB,
            document_max_bytes: self.document_max_bytes_mb * MB,
            block_executables: self.block_executable_uploads,
            block_archives: self.block_archive_uploads,
            blocked_mime_types: self.blocked_mime_types.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub enabled: bool,
    pub cron: String,
    pub bad_status_ttl_days: i64,
    pub soft_deleted_retry_delay_minutes: i64,
    pub thumbnails_ttl_days: i64,
    pub batch_size: u64,
    pub tmp_ttl_days: i64,
    pub originals_ttl_days: i64,
    pub s3_list_page_size: i32,
    pub stuck_upload_timeout_ms: i64,
    pub stuck_delete_timeout_ms: i64,
    pub stuck_optimization_timeout_ms: i64,
}

impl CleanupConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: env_bool("CLEANUP_ENABLED", true),
            // every 15 minutes
            cron: env_string("CLEANUP_CRON", "0 */15 * * * *"),
            bad_status_ttl_days: env_or("CLEANUP_BAD_STATUS_TTL_DAYS", 7),
            soft_deleted_retry_delay_minutes: env_or("CLEANUP_SOFT_DELETED_RETRY_DELAY_MINUTES", 30),
            thumbnails_ttl_days: env_or("CLEANUP_THUMBNAILS_TTL_DAYS", 30),
            batch_size: env_or("CLEANUP_BATCH_SIZE", 100),
            tmp_ttl_days: env_or("CLEANUP_TMP_TTL_DAYS", 1),
            originals_ttl_days: env_or("CLEANUP_ORIGINALS_TTL_DAYS", 7),
            s3_list_page_size: env_or("CLEANUP_S3_LIST_PAGE_SIZE", 1000),
            stuck_upload_timeout_ms: env_or("CLEANUP_STUCK_UPLOAD_TIMEOUT_MS", 3_600_000),
            stuck_delete_timeout_ms: env_or("CLEANUP_STUCK_DELETE_TIMEOUT_MS", 3_600_000),
            stuck_optimization_timeout_ms: env_or(
                "CLEANUP_STUCK_OPTIMIZATION_TIMEOUT_MS",
                1_800_000,
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageProcessingConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub optimization_wait_timeout_ms: u64,
}

impl ImageProcessingConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_string("IMAGE_PROCESSING_BASE_URL", "http://127.0.0.1:8081"),
            request_timeout_ms: env_or("IMAGE_PROCESSING_REQUEST_TIMEOUT_MS", 120_000),
            optimization_wait_timeout_ms: env_or("OPTIMIZATION_WAIT_TIMEOUT_MS", 30_000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UrlUploadConfig {
    pub block_unsafe_connections: bool,
    pub timeout_ms: u64,
    pub max_bytes: u64,
    pub max_redirects: u32,
}

impl UrlUploadConfig {
    pub fn from_env() -> Self {
        Self {
            block_unsafe_connections: env_bool("URL_UPLOAD_BLOCK_UNSAFE", true),
            timeout_ms: env_or("URL_UPLOAD_TIMEOUT_MS", 30_000),
            max_bytes: env_or("URL_UPLOAD_MAX_BYTES", 100 * 1024 * 1024),
            max_redirects: env_or("URL_UPLOAD_MAX_REDIRECTS", 3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub compression: CompressionConfig,
    pub thumbnail: ThumbnailConfig,
    pub upload_limits: UploadLimitsConfig,
    pub cleanup: CleanupConfig,
    pub image_processing: ImageProcessingConfig,
    pub url_upload: UrlUploadConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            storage: StorageConfig::from_env(),
            compression: CompressionConfig::from_env(),
            thumbnail: ThumbnailConfig::from_env(),
            upload_limits: UploadLimitsConfig::from_env(),
            cleanup: CleanupConfig::from_env(),
            image_processing: ImageProcessingConfig::from_env(),
            url_upload: UrlUploadConfig::from_env(),
        }
    }
}
