//! Extension and MIME lookups for the image types the proxy understands.

/// MIME type reported for extensions missing from the table.
pub const DEFAULT_MIME: &str = "application/octet-stream";

// First entry per MIME type is its canonical extension.
const MEDIA_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("jpe", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("ico", "image/x-icon"),
    ("avif", "image/avif"),
    ("svg", "image/svg+xml"),
];

/// MIME type for `extension` (case-insensitive, optional leading dot).
#[must_use]
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    let extension = extension.trim_start_matches('.');
    MEDIA_TYPES
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(extension))
        .map(|(_, mime)| *mime)
}

/// Canonical extension for `mime`.
#[must_use]
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    MEDIA_TYPES
        .iter()
        .find(|(_, candidate)| candidate.eq_ignore_ascii_case(mime))
        .map(|(extension, _)| *extension)
}

/// Strip parameters from a `Content-Type` value and lowercase the essence.
#[must_use]
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
