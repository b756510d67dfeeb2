//! MIME classification used by upload ceilings, optimization eligibility and
//! the content-addressed key extension.

/// Coarse family a MIME type belongs to; each family has its own size ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeFamily {
    Image,
    Video,
    Audio,
    Document,
}

impl MimeFamily {
    pub fn of(mime_type: &str) -> Self {
        let lower = mime_type.trim().to_ascii_lowercase();
        if lower.starts_with("image/") {
            MimeFamily::Image
        } else if lower.starts_with("video/") {
            MimeFamily::Video
        } else if lower.starts_with("audio/") {
            MimeFamily::Audio
        } else {
            MimeFamily::Document
        }
    }
}

pub fn is_image(mime_type: &str) -> bool {
    MimeFamily::of(mime_type) == MimeFamily::Image
}

/// Extension appended to content-addressed keys. Only well-known image types
/// get one; everything else stores bare.
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/avif" => ".avif",
        "image/svg+xml" => ".svg",
        _ => "",
    }
}

/// MIME types rejected when executable uploads are blocked.
pub const EXECUTABLE_MIME_TYPES: &[&str] = &[
    "application/x-msdownload",
    "application/x-executable",
    "application/x-elf",
    "application/x-mach-binary",
    "application/x-sh",
    "application/x-bat",
    "application/x-msi",
    "application/vnd.microsoft.portable-executable",
];

/// MIME types rejected when archive uploads are blocked.
pub const ARCHIVE_MIME_TYPES: &[&str] = &[
    "application/zip",
    "application/x-zip-compressed",
    "application/x-rar-compressed",
    "application/vnd.rar",
    "application/x-7z-compressed",
    "application/x-tar",
    "application/gzip",
    "application/x-bzip2",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_classification() {
        assert_eq!(MimeFamily::of("image/png"), MimeFamily::Image);
        assert_eq!(MimeFamily::of("IMAGE/JPEG"), MimeFamily::Image);
        assert_eq!(MimeFamily::of("video/mp4"), MimeFamily::Video);
        assert_eq!(MimeFamily::of("audio/ogg"), MimeFamily::Audio);
        assert_eq!(MimeFamily::of("text/plain"), MimeFamily::Document);
        assert_eq!(MimeFamily::of("application/pdf"), MimeFamily::Document);
    }

    #[test]
    fn test_extension_map() {
        assert_eq!(extension_for("image/jpeg"), ".jpg");
        assert_eq!(extension_for("image/svg+xml"), ".svg");
        assert_eq!(extension_for("text/plain"), "");
        assert_eq!(extension_for("application/pdf"), "");
    }
}
