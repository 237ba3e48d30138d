//! Selected files and document sources.
//!
//! ## Why a tempfile-backed local reference?
//!
//! pdfium requires a file-system path — it cannot stream from a byte
//! buffer. [`LocalFileRef`] writes the selected bytes to a
//! [`tempfile::NamedTempFile`] once and hands out cheap `Arc` clones, so
//! the renderer can address the original bytes without re-uploading or
//! copying them. Dropping the last clone deletes the file, which means the
//! reference is released exactly once and only after the last draw that
//! could use it — the in-process equivalent of `URL.revokeObjectURL`.

use crate::error::ViewerError;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Weak};
use tempfile::NamedTempFile;
use tracing::debug;

/// A file the user picked, between selection and upload.
///
/// Ephemeral: it exists only until the selection is rejected or the upload
/// completes. `mime` is the *declared* type from the picker; it is
/// validated but never content-sniffed beyond the declared value.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Whether the declared MIME type indicates PDF content.
    pub fn is_pdf(&self) -> bool {
        self.mime
            .split(';')
            .next()
            .map(str::trim)
            .is_some_and(|t| t.eq_ignore_ascii_case("application/pdf"))
    }
}

struct LocalFileInner {
    name: String,
    // Holding the NamedTempFile keeps the file on disk; dropping it deletes.
    temp: NamedTempFile,
}

/// A short-lived opaque handle over raw bytes, addressable by path.
///
/// Cloning shares identity: every clone points at the same on-disk bytes,
/// and [`LocalFileRef::same_ref`] compares identity rather than content.
/// The file is removed when the last clone is dropped.
#[derive(Clone)]
pub struct LocalFileRef(Arc<LocalFileInner>);

impl LocalFileRef {
    /// Materialise `bytes` as an addressable local reference.
    pub fn new(name: impl Into<String>, bytes: &[u8]) -> Result<Self, ViewerError> {
        let name = name.into();
        let mut temp = NamedTempFile::new()
            .map_err(|e| ViewerError::Internal(format!("tempfile: {e}")))?;
        temp.write_all(bytes)
            .map_err(|e| ViewerError::Internal(format!("tempfile write: {e}")))?;
        temp.flush()
            .map_err(|e| ViewerError::Internal(format!("tempfile flush: {e}")))?;
        debug!("local ref '{}' → {}", name, temp.path().display());
        Ok(Self(Arc::new(LocalFileInner { name, temp })))
    }

    /// The original file name the reference was created from.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Path to the on-disk bytes. Valid as long as any clone is alive.
    pub fn path(&self) -> &Path {
        self.0.temp.path()
    }

    /// Identity comparison: do both references share the same bytes handle?
    pub fn same_ref(a: &LocalFileRef, b: &LocalFileRef) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// A weak handle for observing release without keeping the file alive.
    pub fn downgrade(&self) -> WeakLocalFileRef {
        WeakLocalFileRef(Arc::downgrade(&self.0))
    }
}

impl std::fmt::Debug for LocalFileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileRef")
            .field("name", &self.0.name)
            .field("path", &self.path())
            .finish()
    }
}

/// Weak counterpart of [`LocalFileRef`]; `is_released` flips to true once
/// every strong clone has been dropped.
#[derive(Clone)]
pub struct WeakLocalFileRef(Weak<LocalFileInner>);

impl WeakLocalFileRef {
    pub fn is_released(&self) -> bool {
        self.0.upgrade().is_none()
    }
}

/// What the renderer opens: a remote URL or a local object reference.
#[derive(Debug, Clone)]
pub enum SourceRef {
    /// An HTTP/HTTPS URL; downloaded to a tempfile before opening.
    Url(String),
    /// Bytes already on this machine, addressed via a [`LocalFileRef`].
    Local(LocalFileRef),
}

impl SourceRef {
    /// The local reference, when this source is one.
    pub fn as_local(&self) -> Option<&LocalFileRef> {
        match self {
            SourceRef::Local(r) => Some(r),
            SourceRef::Url(_) => None,
        }
    }
}

/// Check the `%PDF` magic at the start of `bytes`.
///
/// Returns the first four bytes on mismatch so the error can show what the
/// file actually started with.
pub(crate) fn check_pdf_magic(bytes: &[u8]) -> Result<(), [u8; 4]> {
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    if &magic == b"%PDF" {
        Ok(())
    } else {
        Err(magic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_mime_detection() {
        assert!(SelectedFile::new("a.pdf", "application/pdf", vec![]).is_pdf());
        assert!(SelectedFile::new("a.pdf", "APPLICATION/PDF", vec![]).is_pdf());
        assert!(SelectedFile::new("a.pdf", "application/pdf; charset=binary", vec![]).is_pdf());
        assert!(!SelectedFile::new("a.txt", "text/plain", vec![]).is_pdf());
        assert!(!SelectedFile::new("a", "", vec![]).is_pdf());
        // Extension never matters, only the declared type.
        assert!(!SelectedFile::new("a.pdf", "text/plain", vec![]).is_pdf());
    }

    #[test]
    fn local_ref_roundtrips_bytes() {
        let r = LocalFileRef::new("test.pdf", b"%PDF-1.4 hello").unwrap();
        let on_disk = std::fs::read(r.path()).unwrap();
        assert_eq!(on_disk, b"%PDF-1.4 hello");
        assert_eq!(r.name(), "test.pdf");
    }

    #[test]
    fn clones_share_identity() {
        let a = LocalFileRef::new("x.pdf", b"%PDF").unwrap();
        let b = a.clone();
        let other = LocalFileRef::new("x.pdf", b"%PDF").unwrap();
        assert!(LocalFileRef::same_ref(&a, &b));
        assert!(!LocalFileRef::same_ref(&a, &other));
    }

    #[test]
    fn released_when_last_clone_drops() {
        let a = LocalFileRef::new("x.pdf", b"%PDF").unwrap();
        let weak = a.downgrade();
        let path = a.path().to_path_buf();
        let b = a.clone();
        drop(a);
        assert!(!weak.is_released(), "still referenced by b");
        drop(b);
        assert!(weak.is_released());
        assert!(!path.exists(), "tempfile should be deleted on release");
    }

    #[test]
    fn magic_check() {
        assert!(check_pdf_magic(b"%PDF-1.7").is_ok());
        assert_eq!(check_pdf_magic(b"hello").unwrap_err(), *b"hell");
        assert_eq!(check_pdf_magic(b"").unwrap_err(), [0u8; 4]);
    }
}
