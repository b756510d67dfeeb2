//! Blob storage key layout.
//!
//! - Temporary ingest: `tmp/<uuid>`
//! - Optimization originals: `originals/<uuid>`
//! - Content-addressed final: `<hex[0:2]>/<hex[2:4]>/<hex><ext>`
//! - Thumbnails: `thumbs/<fileId>/<paramsHash>.<format>`
//!
//! The two-level prefix fan-out keeps any single "directory" listing small on
//! backends that shard by key prefix.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::files::application::domain::mime;

pub const TMP_PREFIX: &str = "tmp/";
pub const ORIGINALS_PREFIX: &str = "originals/";
pub const THUMBS_PREFIX: &str = "thumbs/";

pub fn tmp_key() -> String {
    format!("{}{}", TMP_PREFIX, Uuid::new_v4())
}

pub fn originals_key() -> String {
    format!("{}{}", ORIGINALS_PREFIX, Uuid::new_v4())
}

/// True for keys under the reclaimable ingest prefixes.
pub fn is_transient_key(key: &str) -> bool {
    key.starts_with(TMP_PREFIX) || key.starts_with(ORIGINALS_PREFIX)
}

/// Content-addressed key for a finalized blob. Accepts the checksum either
/// bare or with the `sha256:` prefix.
pub fn content_key(checksum: &str, mime_type: &str) -> String {
    let hex = checksum.strip_prefix("sha256:").unwrap_or(checksum);
    format!(
        "{}/{}/{}{}",
        &hex[..2],
        &hex[2..4],
        hex,
        mime::extension_for(mime_type)
    )
}

/// Cache key for one thumbnail parameter set:
/// `sha256(width "x" height "q" quality "f" format)`, lowercase hex.
pub fn thumbnail_params_hash(width: u32, height: u32, quality: u8, format: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}x{}q{}f{}", width, height, quality, format).as_bytes());
    hex::encode(hasher.finalize())
}

pub fn thumbnail_key(file_id: Uuid, params_hash: &str, format: &str) -> String {
    format!("{}{}/{}.{}", THUMBS_PREFIX, file_id, params_hash, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tmp_and_originals_keys_have_prefixes() {
        assert!(tmp_key().starts_with("tmp/"));
        assert!(originals_key().starts_with("originals/"));
        assert!(is_transient_key("tmp/abc"));
        assert!(is_transient_key("originals/abc"));
        assert!(!is_transient_key("ab/cd/abcd.png"));
        assert!(!is_transient_key("thumbs/x/y.webp"));
    }

    #[test]
    fn test_content_key_layout() {
        let checksum = "sha256:9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";
        assert_eq!(
            content_key(checksum, "image/png"),
            "9f/86/9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08.png"
        );
        // bare hex and non-image types work too
        assert_eq!(
            content_key(
                "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08",
                "text/plain"
            ),
            "9f/86/9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_params_hash_is_deterministic_and_parameter_sensitive() {
        let a = thumbnail_params_hash(100, 100, 80, "webp");
        let b = thumbnail_params_hash(100, 100, 80, "webp");
        let c = thumbnail_params_hash(100, 101, 80, "webp");
        let d = thumbnail_params_hash(100, 100, 80, "avif");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_thumbnail_key_layout() {
        let id = Uuid::nil();
        let key = thumbnail_key(id, "abc123", "webp");
        assert_eq!(
            key,
            "thumbs/00000000-0000-0000-0000-000000000000/abc123.webp"
        );
    }
}
