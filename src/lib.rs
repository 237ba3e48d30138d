//! # pdfview
//!
//! Upload a PDF to a backend and rasterise every page locally.
//!
//! The crate is the asynchronous state machine between a file-selection
//! event and a set of rendered page surfaces: validate the declared type,
//! upload the bytes, then open the document and draw each page — with
//! stale-result suppression at every async seam so a superseded selection
//! can never overwrite a newer one.
//!
//! ## Pipeline Overview
//!
//! ```text
//! selection
//!  │
//!  ├─ 1. Validate  declared MIME must indicate PDF (no network on reject)
//!  ├─ 2. Reference local object reference created over the raw bytes
//!  ├─ 3. Upload    POST /api/upload/ → { upload_id, pages }
//!  ├─ 4. Open      document handle for the local reference (pdfium)
//!  └─ 5. Draw      one surface per page, independent per-page outcomes
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfview::{
//!     HttpUploadTransport, PdfiumBackend, SelectedFile, UploadController, ViewerConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ViewerConfig::default();
//!     let controller = UploadController::new(
//!         Arc::new(HttpUploadTransport::new(&config)?),
//!         Arc::new(PdfiumBackend::default()),
//!         config,
//!     );
//!
//!     let bytes = std::fs::read("document.pdf")?;
//!     let file = SelectedFile::new("document.pdf", "application/pdf", bytes);
//!     let state = controller.on_file_selected(Some(file)).await;
//!     println!("{state}");
//!     Ok(())
//! }
//! ```
//!
//! ## Collaborators are injected
//!
//! The controller takes an [`UploadTransport`] and the renderer a
//! [`RenderBackend`] at construction time. Tests substitute in-memory
//! implementations; nothing in the crate patches global state.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfview` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod probe;
pub mod renderer;
pub mod source;
pub mod state;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{DocumentHandle, PdfiumBackend, RenderBackend, Viewport};
pub use config::{ViewerConfig, ViewerConfigBuilder};
pub use controller::{UploadController, UploadState};
pub use error::{PageError, ViewerError};
pub use probe::StatusProbe;
pub use renderer::{DocumentRenderer, PageSurface, RenderPhase, SurfaceState};
pub use source::{LocalFileRef, SelectedFile, SourceRef};
pub use state::UiState;
pub use transport::{HttpUploadTransport, PageDescriptor, UploadReceipt, UploadTransport};
