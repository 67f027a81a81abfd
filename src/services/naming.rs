//! Naming helpers: blob key generation and download-filename handling.
//!
//! Storage keys keep the uploader's filename verbatim as a readable suffix
//! (blob keys accept arbitrary bytes, so no cleanup happens there). The
//! sanitizer only runs at the HTTP boundary, where a raw filename inside
//! `Content-Disposition` would allow header injection.

use uuid::Uuid;

/// Logical prefix under which all document blobs live in the bucket.
const KEY_NAMESPACE: &str = "admin_documents";

/// Hard cap on a sanitized download filename, in characters.
const MAX_FILENAME_CHARS: usize = 200;

/// An extension is preserved through truncation only when its dot sits
/// within this many characters of the end of the name.
const EXTENSION_WINDOW: usize = 10;

/// Substitute for names that sanitize down to nothing.
const FALLBACK_FILENAME: &str = "downloaded_file";

/// Derive a fresh storage key for an uploaded file.
///
/// Produces `admin_documents/<uuid>_<filename>`. The random 128-bit token
/// makes collisions across the lifetime of the system vanishingly
/// unlikely, and keys are never reused even for identical filenames.
pub fn storage_key_for(filename: &str) -> String {
    format!("{}/{}_{}", KEY_NAMESPACE, Uuid::new_v4(), filename)
}

/// Clean an uploader-supplied filename for use in a response header.
///
/// - drops every Unicode control character (CR/LF included)
/// - replaces characters illegal in common filesystem names, plus the
///   separators `:`, `/` and `\`, with `_`
/// - collapses whitespace runs and trims the ends
/// - drops a leading dot
/// - substitutes [`FALLBACK_FILENAME`] when nothing survives
/// - truncates to [`MAX_FILENAME_CHARS`], keeping a short extension
///
/// Always returns a non-empty string.
pub fn sanitize_download_filename(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_control() {
            continue;
        }
        if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') {
            cleaned.push('_');
        } else {
            cleaned.push(c);
        }
    }

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.strip_prefix('.').unwrap_or(&collapsed);

    if trimmed.is_empty() {
        return FALLBACK_FILENAME.to_string();
    }

    truncate_preserving_extension(trimmed)
}

/// Build the `Content-Disposition` value for a download response.
///
/// Uses the RFC 5987 extended-value form so non-ASCII filenames survive;
/// the legacy `filename=` parameter cannot represent them safely.
pub fn content_disposition_value(original_filename: &str) -> String {
    let safe = sanitize_download_filename(original_filename);
    format!("attachment; filename*=UTF-8''{}", rfc5987_encode(&safe))
}

/// Enforce the length cap, keeping the extension when it is short enough.
fn truncate_preserving_extension(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= MAX_FILENAME_CHARS {
        return name.to_string();
    }

    if let Some(dot) = name.rfind('.') {
        let ext: Vec<char> = name[dot..].chars().collect();
        if ext.len() <= EXTENSION_WINDOW && ext.len() < MAX_FILENAME_CHARS {
            let stem: String = chars[..MAX_FILENAME_CHARS - ext.len()].iter().collect();
            return format!("{}{}", stem, ext.into_iter().collect::<String>());
        }
    }

    chars[..MAX_FILENAME_CHARS].iter().collect()
}

/// Percent-encode a string over the RFC 5987 attr-char set.
fn rfc5987_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{:02X}", b),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_keys_are_unique_per_call() {
        let a = storage_key_for("reporte.pdf");
        let b = storage_key_for("reporte.pdf");
        assert_ne!(a, b);
        assert!(a.starts_with("admin_documents/"));
        assert!(a.ends_with("_reporte.pdf"));
    }

    #[test]
    fn control_characters_are_stripped() {
        let out = sanitize_download_filename("Informe\r\n \u{0} Ético.pdf");
        assert_eq!(out, "Informe Ético.pdf");
        assert!(!out.contains('\r') && !out.contains('\n'));
    }

    #[test]
    fn separators_and_reserved_characters_become_underscores() {
        assert_eq!(
            sanitize_download_filename("a/b\\c:d*e?f\"g<h>i|j.txt"),
            "a_b_c_d_e_f_g_h_i_j.txt"
        );
    }

    #[test]
    fn whitespace_runs_collapse_and_ends_trim() {
        assert_eq!(sanitize_download_filename("  my   report \t .pdf "), "my report .pdf");
    }

    #[test]
    fn leading_dot_is_dropped() {
        assert_eq!(sanitize_download_filename(".bashrc"), "bashrc");
    }

    #[test]
    fn empty_and_whitespace_names_fall_back() {
        assert_eq!(sanitize_download_filename(""), "downloaded_file");
        assert_eq!(sanitize_download_filename("   \t  "), "downloaded_file");
        assert_eq!(sanitize_download_filename("\r\n"), "downloaded_file");
    }

    #[test]
    fn long_names_truncate_but_keep_short_extension() {
        let long = "a".repeat(300) + ".pdf";
        let out = sanitize_download_filename(&long);
        assert_eq!(out.chars().count(), 200);
        assert!(out.ends_with(".pdf"));
    }

    #[test]
    fn long_names_without_extension_hard_truncate() {
        let long = "b".repeat(450);
        let out = sanitize_download_filename(&long);
        assert_eq!(out.chars().count(), 200);
    }

    #[test]
    fn long_extension_is_not_preserved() {
        let long = "c".repeat(250) + ".verylongextension";
        let out = sanitize_download_filename(&long);
        assert_eq!(out.chars().count(), 200);
        assert!(!out.ends_with(".verylongextension"));
    }

    #[test]
    fn disposition_uses_rfc5987_extended_value() {
        let value = content_disposition_value("Informe\r\n Ético.pdf");
        assert_eq!(
            value,
            "attachment; filename*=UTF-8''Informe%20%C3%89tico.pdf"
        );
        assert!(!value.contains('\r') && !value.contains('\n'));
    }

    #[test]
    fn disposition_for_plain_ascii_name() {
        assert_eq!(
            content_disposition_value("report.pdf"),
            "attachment; filename*=UTF-8''report.pdf"
        );
    }
}
