//! Display-filename handling. Filenames are purely advisory: they are
//! canonicalized once at ingest and echoed back in Content-Disposition.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use unicode_normalization::UnicodeNormalization;

const MAX_FILENAME_CHARS: usize = 255;

/// attr-char per RFC 5987: everything outside the safe set is pct-encoded.
const RFC5987_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Canonicalize an advisory filename: NFKC-normalize, strip control
/// characters (CR/LF included) and path separators, collapse runs of
/// whitespace, cap the length. An empty result falls back to `"file"`.
pub fn sanitize(raw: &str) -> String {
    let normalized: String = raw.nfkc().collect();

    let cleaned: String = normalized
        .chars()
        .map(|c| match c {
            '/' | '\\' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    let capped: String = collapsed.chars().take(MAX_FILENAME_CHARS).collect();
    let trimmed = capped.trim().to_string();

    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed
    }
}

/// Build a Content-Disposition value carrying both the ASCII-safe fallback
/// and the RFC 5987 UTF-8 form:
/// `attachment; filename="<ascii>"; filename*=UTF-8''<pct-encoded>`.
pub fn content_disposition(filename: &str) -> String {
    let ascii_fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let encoded = utf8_percent_encode(filename, RFC5987_ESCAPE).to_string();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_fallback, encoded
    )
}
