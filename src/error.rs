//! Error types for the pdfview library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ViewerError`] — **Fatal for its operation**: the upload cannot
//!   proceed (wrong file type, network failure, malformed server body) or
//!   the document cannot be opened at all. Each is terminal for the
//!   operation that produced it; the user re-selects a file to retry.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed to rasterise but
//!   every other page is fine. Stored inside the failing page's
//!   [`crate::renderer::PageSurface`] so callers can inspect partial
//!   success rather than losing the whole document to one bad page.
//!
//! Nothing here retries automatically. A validation failure is
//! user-correctable, a network failure is surfaced verbatim, and a page
//! failure is recorded exactly where it happened.

use std::path::PathBuf;
use thiserror::Error;

/// All operation-fatal errors produced by the pdfview library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::renderer::PageSurface`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ViewerError {
    // ── Selection / validation errors ─────────────────────────────────────
    /// The selected file's declared MIME type does not indicate PDF content.
    ///
    /// No network call is made for this error; the file picker's `accept`
    /// constraint is advisory only, so the declared type is checked again.
    #[error("Please select a PDF file")]
    NotAPdf { name: String, mime: String },

    // ── Upload (network) errors ───────────────────────────────────────────
    /// The upload request itself failed (connection refused, timeout, TLS…).
    #[error("Upload failed: {reason}")]
    UploadFailed { reason: String },

    /// The server answered with a non-2xx status.
    #[error("Upload rejected by server: HTTP {status}")]
    UploadRejected { status: u16 },

    /// The server answered 2xx but the body was not a valid upload receipt.
    #[error("Malformed upload response: {detail}")]
    MalformedResponse { detail: String },

    // ── Source / document errors ──────────────────────────────────────────
    /// A URL source could not be downloaded.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The source bytes do not start with the `%PDF` magic.
    #[error("Source is not a valid PDF: '{path}' (first bytes: {magic:?})")]
    NotPdfBytes { path: PathBuf, magic: [u8; 4] },

    /// The rendering capability could not open the source as a document.
    #[error("Failed to open document: {detail}")]
    DocumentOpenFailed { detail: String },

    // ── Health probe errors ───────────────────────────────────────────────
    /// The liveness endpoint failed or returned an unreadable body.
    #[error("Health check failed: {reason}")]
    HealthCheckFailed { reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored in the affected [`crate::renderer::PageSurface`] when a page
/// fails. The overall render sequence still reaches its terminal state;
/// sibling pages are unaffected.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The page's default viewport dimensions could not be read.
    #[error("Page {page}: viewport lookup failed: {detail}")]
    ViewportFailed { page: usize, detail: String },

    /// The draw operation for this page failed.
    #[error("Page {page}: render failed: {detail}")]
    RenderFailed { page: usize, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_pdf_display_matches_ui_copy() {
        let e = ViewerError::NotAPdf {
            name: "test.txt".into(),
            mime: "text/plain".into(),
        };
        assert_eq!(e.to_string(), "Please select a PDF file");
    }

    #[test]
    fn upload_rejected_display() {
        let e = ViewerError::UploadRejected { status: 500 };
        assert!(e.to_string().contains("500"));
    }

    #[test]
    fn upload_failed_carries_reason() {
        let e = ViewerError::UploadFailed {
            reason: "Upload failed".into(),
        };
        assert!(e.to_string().contains("Upload failed"));
    }

    #[test]
    fn page_error_display_names_page() {
        let e = PageError::RenderFailed {
            page: 2,
            detail: "bitmap allocation".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Page 2"), "got: {msg}");
        assert!(msg.contains("bitmap allocation"));
    }
}
