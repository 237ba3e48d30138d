//! The rendering capability: open a source, expose pages, draw them.
//!
//! The renderer never talks to pdfium directly; it is handed a
//! [`RenderBackend`] whose [`DocumentHandle`] is the opaque capability
//! "given bytes, produce N pages; given a page and a target size, draw it".
//! Tests substitute an in-memory backend; production uses
//! [`PdfiumBackend`].
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto the
//! blocking thread pool so Tokio worker threads never stall during
//! CPU-heavy rendering.
//!
//! ## Why re-open per draw?
//!
//! A pdfium document borrows its `Pdfium` binding and cannot be held
//! across await points. Opening the file once to read page count and
//! viewports, then re-opening per page draw, keeps the handle `Send` and
//! each draw independent — one bad page cannot poison its siblings.

use crate::error::{PageError, ViewerError};
use crate::source::{check_pdf_magic, LocalFileRef, SourceRef};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Default page dimensions in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

/// An opened document: page count plus per-page viewport and draw access.
///
/// A handle is bound to the source it was opened from. Whenever the source
/// changes the handle must be discarded (dropped), never reused.
pub trait DocumentHandle: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Default viewport dimensions of a page, 0-indexed.
    fn viewport(&self, index: usize) -> Result<Viewport, PageError>;

    /// Draw a page into a surface of exactly `width × height` pixels.
    fn render(
        &self,
        index: usize,
        width: u32,
        height: u32,
    ) -> impl Future<Output = Result<DynamicImage, PageError>> + Send;
}

/// The capability of opening a [`SourceRef`] as a document.
pub trait RenderBackend: Send + Sync {
    type Handle: DocumentHandle + Send + Sync + 'static;

    fn open(
        &self,
        source: &SourceRef,
    ) -> impl Future<Output = Result<Self::Handle, ViewerError>> + Send;
}

// ── pdfium implementation ────────────────────────────────────────────────

/// Production backend over the pdfium library.
pub struct PdfiumBackend {
    download_timeout_secs: u64,
}

impl PdfiumBackend {
    pub fn new(download_timeout_secs: u64) -> Self {
        Self {
            download_timeout_secs,
        }
    }
}

impl Default for PdfiumBackend {
    fn default() -> Self {
        Self::new(120)
    }
}

/// Keeps the opened source's backing storage alive for the handle's
/// lifetime, so a draw can never observe a deleted file.
#[derive(Debug)]
enum SourceKeepalive {
    Local(#[allow(dead_code)] LocalFileRef),
    Downloaded(#[allow(dead_code)] tempfile::NamedTempFile),
}

/// A pdfium-backed document handle.
///
/// Page count and viewports are read once at open time; each draw re-opens
/// the file inside `spawn_blocking` (see module docs).
#[derive(Debug)]
pub struct PdfiumDocument {
    path: PathBuf,
    viewports: Vec<Viewport>,
    _keepalive: SourceKeepalive,
}

impl RenderBackend for PdfiumBackend {
    type Handle = PdfiumDocument;

    async fn open(&self, source: &SourceRef) -> Result<Self::Handle, ViewerError> {
        let (path, keepalive) = self.resolve(source).await?;

        // Magic-byte check up front: a meaningful error beats a pdfium
        // crash. Only the first four bytes are read, never the whole file.
        let mut head = Vec::with_capacity(4);
        {
            use std::io::Read;
            std::fs::File::open(&path)
                .map_err(|e| ViewerError::DocumentOpenFailed {
                    detail: format!("reading '{}': {e}", path.display()),
                })?
                .take(4)
                .read_to_end(&mut head)
                .map_err(|e| ViewerError::DocumentOpenFailed {
                    detail: format!("reading '{}': {e}", path.display()),
                })?;
        }
        if let Err(magic) = check_pdf_magic(&head) {
            return Err(ViewerError::NotPdfBytes { path, magic });
        }

        let blocking_path = path.clone();
        let viewports = tokio::task::spawn_blocking(move || open_blocking(&blocking_path))
            .await
            .map_err(|e| ViewerError::Internal(format!("open task panicked: {e}")))??;

        info!("document opened: {} pages from {}", viewports.len(), path.display());

        Ok(PdfiumDocument {
            path,
            viewports,
            _keepalive: keepalive,
        })
    }
}

impl PdfiumBackend {
    /// Normalise the source to a local path, downloading URL sources to a
    /// tempfile first.
    async fn resolve(&self, source: &SourceRef) -> Result<(PathBuf, SourceKeepalive), ViewerError> {
        match source {
            SourceRef::Local(r) => Ok((r.path().to_path_buf(), SourceKeepalive::Local(r.clone()))),
            SourceRef::Url(url) => {
                info!("downloading document from {}", url);
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(self.download_timeout_secs))
                    .build()
                    .map_err(|e| ViewerError::DownloadFailed {
                        url: url.clone(),
                        reason: e.to_string(),
                    })?;

                let response =
                    client
                        .get(url)
                        .send()
                        .await
                        .map_err(|e| ViewerError::DownloadFailed {
                            url: url.clone(),
                            reason: e.to_string(),
                        })?;
                if !response.status().is_success() {
                    return Err(ViewerError::DownloadFailed {
                        url: url.clone(),
                        reason: format!("HTTP {}", response.status()),
                    });
                }

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ViewerError::DownloadFailed {
                        url: url.clone(),
                        reason: e.to_string(),
                    })?;

                use std::io::Write;
                let mut temp = tempfile::NamedTempFile::new()
                    .map_err(|e| ViewerError::Internal(format!("tempfile: {e}")))?;
                temp.write_all(&bytes)
                    .map_err(|e| ViewerError::Internal(format!("tempfile write: {e}")))?;
                debug!("downloaded {} bytes to {}", bytes.len(), temp.path().display());

                Ok((
                    temp.path().to_path_buf(),
                    SourceKeepalive::Downloaded(temp),
                ))
            }
        }
    }
}

impl DocumentHandle for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.viewports.len()
    }

    fn viewport(&self, index: usize) -> Result<Viewport, PageError> {
        self.viewports
            .get(index)
            .copied()
            .ok_or_else(|| PageError::ViewportFailed {
                page: index,
                detail: format!("index out of range (document has {} pages)", self.viewports.len()),
            })
    }

    async fn render(
        &self,
        index: usize,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, PageError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || render_blocking(&path, index, width, height))
            .await
            .map_err(|e| PageError::RenderFailed {
                page: index,
                detail: format!("render task panicked: {e}"),
            })?
    }
}

/// Blocking open: load the document and read every page's default size.
fn open_blocking(path: &std::path::Path) -> Result<Vec<Viewport>, ViewerError> {
    let pdfium = Pdfium::default();
    let document =
        pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| ViewerError::DocumentOpenFailed {
                detail: format!("{e:?}"),
            })?;

    let viewports = document
        .pages()
        .iter()
        .map(|page| Viewport {
            width: page.width().value,
            height: page.height().value,
        })
        .collect();

    Ok(viewports)
}

/// Blocking draw of one page into a `width × height` bitmap.
fn render_blocking(
    path: &std::path::Path,
    index: usize,
    width: u32,
    height: u32,
) -> Result<DynamicImage, PageError> {
    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| PageError::RenderFailed {
            page: index,
            detail: format!("reopen: {e:?}"),
        })?;

    let page = document
        .pages()
        .get(index as u16)
        .map_err(|e| PageError::RenderFailed {
            page: index,
            detail: format!("{e:?}"),
        })?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(width as i32)
        .set_maximum_height(height as i32);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| PageError::RenderFailed {
            page: index,
            detail: format!("{e:?}"),
        })?;

    let image = bitmap.as_image();
    debug!("rendered page {} → {}x{} px", index, image.width(), image.height());
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The magic check runs before any pdfium call, so these tests need no
    // pdfium library on the machine.

    #[tokio::test]
    async fn open_rejects_non_pdf_bytes() {
        let r = LocalFileRef::new("fake.pdf", b"this is not a pdf").unwrap();
        let backend = PdfiumBackend::default();
        let err = backend.open(&SourceRef::Local(r)).await.unwrap_err();
        assert!(matches!(err, ViewerError::NotPdfBytes { .. }));
    }

    #[tokio::test]
    async fn open_rejects_truncated_header() {
        let r = LocalFileRef::new("short.pdf", b"%P").unwrap();
        let backend = PdfiumBackend::default();
        let err = backend.open(&SourceRef::Local(r)).await.unwrap_err();
        assert!(matches!(err, ViewerError::NotPdfBytes { .. }));
    }

    #[tokio::test]
    async fn open_rejects_unreachable_url() {
        let backend = PdfiumBackend::new(1);
        let err = backend
            .open(&SourceRef::Url("http://127.0.0.1:1/doc.pdf".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ViewerError::DownloadFailed { .. }));
    }
}
