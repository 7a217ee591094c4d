//! Filename sanitization for cross-platform storage safety
//!
//! Reduces arbitrary media titles (spaces, emoji, punctuation) to the safe
//! character set `[A-Za-z0-9._-]` before the downloaded artifact is
//! renamed on disk.

/// Separator that replaces every disallowed character
const SEPARATOR: char = '_';

/// Prefix of the fallback name used when sanitization empties the input
const FALLBACK_PREFIX: &str = "downloaded_file";

/// Sanitize a filename (or file stem) to the safe character set
///
/// Whitespace and every character outside `[A-Za-z0-9._-]` become a single
/// underscore; runs of consecutive underscores collapse to one; leading and
/// trailing underscores are trimmed. An input that sanitizes to nothing
/// yields `downloaded_file_{epoch_secs}` — unique by convention only, two
/// calls within the same second can collide.
///
/// Pure and total: never fails, no side effects.
///
/// # Examples
///
/// ```
/// use media_dl::sanitize::sanitize;
///
/// assert_eq!(sanitize("My Video (1080p)"), "My_Video_1080p");
/// assert_eq!(sanitize("__already--safe.name__"), "already--safe.name");
/// ```
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.chars() {
        let allowed =
            ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-');
        if allowed {
            if pending_separator && !out.is_empty() {
                out.push(SEPARATOR);
            }
            pending_separator = false;
            out.push(ch);
        } else {
            // Whitespace, literal underscores, and disallowed characters
            // all count as separators, so runs collapse to one.
            pending_separator = true;
        }
    }

    if out.is_empty() {
        return format!(
            "{FALLBACK_PREFIX}_{}",
            chrono::Utc::now().timestamp()
        );
    }
    out
}

/// Sanitize the stem of a basename, preserving the extension verbatim
///
/// `"My Video!.mp4"` becomes `"My_Video.mp4"`. A name without an extension
/// is sanitized whole.
pub fn sanitize_basename(basename: &str) -> String {
    let path = std::path::Path::new(basename);
    match (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|e| e.to_str()),
    ) {
        (Some(stem), Some(ext)) => format!("{}.{ext}", sanitize(stem)),
        _ => sanitize(basename),
    }
}
