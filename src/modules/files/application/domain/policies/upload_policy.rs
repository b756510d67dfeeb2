use thiserror::Error;

use crate::files::application::domain::mime::{
    MimeFamily, ARCHIVE_MIME_TYPES, EXECUTABLE_MIME_TYPES,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadPolicyError {
    #[error("MIME type '{0}' is blocked")]
    BlockedMimeType(String),

    #[error("file exceeds the {limit_bytes} byte limit for {family:?} uploads")]
    TooLarge {
        family: MimeFamily,
        limit_bytes: u64,
    },
}

/// Per-MIME-family byte ceilings plus the hard-reject MIME lists.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub image_max_bytes: u64,
    pub video_max_bytes: u64,
    pub audio_max_bytes: u64,
    pub document_max_bytes: u64,
    pub block_executables: bool,
    pub block_archives: bool,
    pub blocked_mime_types: Vec<String>,
}

impl UploadPolicy {
    pub fn max_bytes_for(&self, mime_type: &str) -> u64 {
        match MimeFamily::of(mime_type) {
            MimeFamily::Image => self.image_max_bytes,
            MimeFamily::Video => self.video_max_bytes,
            MimeFamily::Audio => self.audio_max_bytes,
            MimeFamily::Document => self.document_max_bytes,
        }
    }

    /// Deny-list check, run before any byte of the body is consumed.
    pub fn check_mime_type(&self, mime_type: &str) -> Result<(), UploadPolicyError> {
        let lower = mime_type.trim().to_ascii_lowercase();

        if self.block_executables && EXECUTABLE_MIME_TYPES.contains(&lower.as_str()) {
            return Err(UploadPolicyError::BlockedMimeType(lower));
        }
        if self.block_archives && ARCHIVE_MIME_TYPES.contains(&lower.as_str()) {
            return Err(UploadPolicyError::BlockedMimeType(lower));
        }
        if self
            .blocked_mime_types
            .iter()
            .any(|blocked| blocked.eq_ignore_ascii_case(&lower))
        {
            return Err(UploadPolicyError::BlockedMimeType(lower));
        }

        Ok(())
    }

    pub fn too_large_error(&self, mime_type: &str) -> UploadPolicyError {
        let family = MimeFamily::of(mime_type);
        UploadPolicyError::TooLarge {
            family,
            limit_bytes: self.max_bytes_for(mime_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> UploadPolicy {
        UploadPolicy {
            image_max_bytes: 10 * 1024 * 1024,
            video_max_bytes: 500 * 1024 * 1024,
            audio_max_bytes: 50 * 1024 * 1024,
            document_max_bytes: 20 * 1024 * 1024,
            block_executables: true,
            block_archives: true,
            blocked_mime_types: vec!["application/x-custom-bad".to_string()],
        }
    }

    #[test]
    fn test_ceiling_by_family() {
        let p = policy();
        assert_eq!(p.max_bytes_for("image/png"), 10 * 1024 * 1024);
        assert_eq!(p.max_bytes_for("video/mp4"), 500 * 1024 * 1024);
        assert_eq!(p.max_bytes_for("audio/ogg"), 50 * 1024 * 1024);
        assert_eq!(p.max_bytes_for("application/pdf"), 20 * 1024 * 1024);
    }

    #[test]
    fn test_blocks_executables_and_archives() {
        let p = policy();
        assert!(p.check_mime_type("application/x-msdownload").is_err());
        assert!(p.check_mime_type("application/zip").is_err());
        assert!(p.check_mime_type("image/png").is_ok());
    }

    #[test]
    fn test_deny_lists_can_be_disabled() {
        let mut p = policy();
        p.block_executables = false;
        p.block_archives = false;
        assert!(p.check_mime_type("application/x-msdownload").is_ok());
        assert!(p.check_mime_type("application/zip").is_ok());
    }

    #[test]
    fn test_explicit_block_list_is_case_insensitive() {
        let p = policy();
        assert_eq!(
            p.check_mime_type("Application/X-Custom-Bad"),
            Err(UploadPolicyError::BlockedMimeType(
                "application/x-custom-bad".to_string()
            ))
        );
    }
}
