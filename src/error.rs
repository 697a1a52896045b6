//! Error types for the docnorm library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DocNormError`]: **Fatal**: the conversion cannot proceed at all
//!   (missing input, parser failure, a rewrite rule that never settles).
//!   Returned as `Err(DocNormError)` from every `normalize*` entry point and
//!   from [`crate::backend::Converter::convert_to_pdf`]. A failed conversion
//!   produces no output file.
//!
//! * [`ImageResolveError`]: **Non-fatal**: one image reference could not be
//!   resolved. The document is still normalised; the failure is recorded in
//!   [`crate::output::NormalizeStats::image_failures`] so callers can decide
//!   whether a missing logo is worth failing a whole batch over.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docnorm library.
#[derive(Debug, Error)]
pub enum DocNormError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is clearly not markup.
    #[error("File is not an HTML document: '{path}' ({detail})")]
    NotHtml { path: PathBuf, detail: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The tolerant parser could not produce any tree.
    #[error("HTML parse failed: {0}")]
    Parse(String),

    /// A rewrite met a tree shape it cannot handle (e.g. a node without a parent).
    #[error("Rewrite '{rule}' hit an unexpected tree shape: {detail}")]
    MalformedTree { rule: &'static str, detail: String },

    /// A fixed-point rule kept matching after its iteration budget ran out.
    #[error("Rewrite '{rule}' did not reach a fixed point within {limit} iterations")]
    FixedPointNotReached { rule: &'static str, limit: usize },

    // ── Dispatch errors ───────────────────────────────────────────────────
    /// The worker was asked to convert a MIME type it does not know.
    #[error("Unsupported MIME type '{mime}'")]
    UnsupportedMimeType { mime: String },

    /// A converter kind was requested but none is registered for it.
    #[error("No converter registered for {kind}")]
    ConverterMissing { kind: String },

    /// The typesetting backend rejected the normalised document.
    #[error("Typesetting failed: {0}")]
    Typesetting(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image reference.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageResolveError {
    /// Local image file does not exist or could not be read.
    #[error("Image '{src}' not found at {path}")]
    NotFound { src: String, path: String },

    /// Remote image could not be downloaded.
    #[error("Image '{src}' could not be fetched: {reason}")]
    FetchFailed { src: String, reason: String },

    /// The bytes were read but are not a recognised image format.
    #[error("Image '{src}' is not a supported image format")]
    UnsupportedFormat { src: String },

    /// A `data:` URI was malformed or not base64-encoded.
    #[error("Image '{src}' has an invalid data URI: {reason}")]
    InvalidDataUri { src: String, reason: String },
}

impl ImageResolveError {
    /// The image reference that failed.
    pub fn src(&self) -> &str {
        match self {
            ImageResolveError::NotFound { src, .. }
            | ImageResolveError::FetchFailed { src, .. }
            | ImageResolveError::UnsupportedFormat { src }
            | ImageResolveError::InvalidDataUri { src, .. } => src,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_point_display() {
        let e = DocNormError::FixedPointNotReached {
            rule: "u>div",
            limit: 41,
        };
        let msg = e.to_string();
        assert!(msg.contains("u>div"), "got: {msg}");
        assert!(msg.contains("41"), "got: {msg}");
    }

    #[test]
    fn malformed_tree_display() {
        let e = DocNormError::MalformedTree {
            rule: "div>img",
            detail: "div has no parent".into(),
        };
        assert!(e.to_string().contains("div has no parent"));
    }

    #[test]
    fn not_html_display() {
        let e = DocNormError::NotHtml {
            path: PathBuf::from("/tmp/scan.pdf"),
            detail: "starts with %PDF".into(),
        };
        assert!(e.to_string().contains("scan.pdf"));
    }

    #[test]
    fn image_error_exposes_src() {
        let e = ImageResolveError::UnsupportedFormat {
            src: "logo.xyz".into(),
        };
        assert_eq!(e.src(), "logo.xyz");
        assert!(e.to_string().contains("logo.xyz"));
    }

    #[test]
    fn image_error_roundtrips_through_json() {
        let e = ImageResolveError::FetchFailed {
            src: "https://example.com/a.png".into(),
            reason: "HTTP 404".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: ImageResolveError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
