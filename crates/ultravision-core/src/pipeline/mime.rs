//! Extension-based MIME lookup.

use std::path::Path;

/// Fallback for unknown extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// MIME type for a path, from its extension only.
///
/// Content is never sniffed; an unknown or missing extension yields
/// `application/octet-stream`.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
        .to_string()
}
