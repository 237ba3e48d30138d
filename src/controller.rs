//! The file-selection lifecycle: validate, upload, hand off to the renderer.
//!
//! [`UploadController`] owns one upload slot. Each selection supersedes the
//! previous one: the controller tags every attempt with a generation number
//! and commits an upload outcome only if its generation is still current at
//! completion time. A fast second upload finishing before a slow first one
//! therefore can never be overwritten by the stale first result — the
//! mandatory defence against out-of-order completion, with no reliance on
//! cancelling the stale request.
//!
//! The controller also owns the renderer it mounts: a successful upload
//! mounts (or re-binds) a [`DocumentRenderer`] fed with the *same*
//! [`LocalFileRef`] that was created from the selected bytes — identity,
//! not a copy — so the document is rendered without waiting on the network
//! a second time. A failed or superseded attempt drops its reference,
//! which releases it exactly once.

use crate::backend::RenderBackend;
use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::renderer::DocumentRenderer;
use crate::source::{LocalFileRef, SelectedFile, SourceRef};
use crate::state::UiState;
use crate::transport::{UploadReceipt, UploadTransport};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// The controller's user-visible state.
pub type UploadState = UiState<UploadReceipt>;

struct ControllerInner<R: RenderBackend> {
    seq: u64,
    state: UploadState,
    /// The reference currently handed to the mounted renderer, if any.
    local_ref: Option<LocalFileRef>,
    renderer: Option<Arc<DocumentRenderer<R>>>,
}

/// Owns the upload slot and the renderer mounted for the last success.
pub struct UploadController<T: UploadTransport, R: RenderBackend> {
    transport: Arc<T>,
    backend: Arc<R>,
    config: ViewerConfig,
    inner: Mutex<ControllerInner<R>>,
}

impl<T: UploadTransport, R: RenderBackend> UploadController<T, R> {
    pub fn new(transport: Arc<T>, backend: Arc<R>, config: ViewerConfig) -> Self {
        Self {
            transport,
            backend,
            config,
            inner: Mutex::new(ControllerInner {
                seq: 0,
                state: UiState::Idle,
                local_ref: None,
                renderer: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner<R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current upload state.
    pub fn state(&self) -> UploadState {
        self.lock().state.clone()
    }

    /// The renderer mounted for the last successful upload, if any.
    pub fn renderer(&self) -> Option<Arc<DocumentRenderer<R>>> {
        self.lock().renderer.clone()
    }

    /// The local reference handed to the mounted renderer, if any.
    pub fn local_ref(&self) -> Option<LocalFileRef> {
        self.lock().local_ref.clone()
    }

    /// Handle a file-selection event carrying zero or one file.
    ///
    /// Runs the full pipeline for the selection: validate → local ref →
    /// upload → mount renderer → render pages. Returns the state as
    /// committed for this attempt — or the current (newer) state when this
    /// attempt was superseded mid-flight.
    pub async fn on_file_selected(&self, selection: Option<SelectedFile>) -> UploadState {
        let Some(file) = selection else {
            // Zero-file event (picker dismissed): nothing to do.
            return self.state();
        };

        // Declared-type validation only; the picker's accept filter is
        // advisory and content sniffing is out of scope.
        if !file.is_pdf() {
            info!("rejected '{}': declared type '{}'", file.name, file.mime);
            let err = ViewerError::NotAPdf {
                name: file.name,
                mime: file.mime,
            };
            let mut inner = self.lock();
            inner.seq += 1; // this selection supersedes any in-flight upload
            inner.state = UiState::Error(err.to_string());
            inner.renderer = None;
            inner.local_ref = None;
            return inner.state.clone();
        }

        let generation = {
            let mut inner = self.lock();
            inner.seq += 1;
            inner.state = UiState::Loading;
            inner.seq
        };

        // Create the local reference before the network call so a later
        // hand-off to the renderer never has to wait on the bytes again.
        let pending_ref = match LocalFileRef::new(&file.name, &file.bytes) {
            Ok(r) => r,
            Err(e) => {
                let mut inner = self.lock();
                if inner.seq == generation {
                    inner.state = UiState::Error(e.to_string());
                }
                return inner.state.clone();
            }
        };

        info!("uploading '{}' ({} bytes)", file.name, file.bytes.len());
        let outcome = self.transport.upload(&file).await;

        let (receipt, bound, renderer) = {
            let mut inner = self.lock();
            if inner.seq != generation {
                // Superseded while in flight: drop this attempt's outcome
                // and its reference, keep the newer state untouched.
                debug!("upload outcome for '{}' superseded, discarding", file.name);
                return inner.state.clone();
            }

            match outcome {
                Ok(receipt) => {
                    inner.state = UiState::Success(receipt.clone());
                    inner.local_ref = Some(pending_ref.clone());
                    let renderer = inner.renderer.get_or_insert_with(|| {
                        Arc::new(DocumentRenderer::new(
                            Arc::clone(&self.backend),
                            self.config.clone(),
                        ))
                    });
                    // Bind while still holding the lock: renderer
                    // supersession order then matches commit order even
                    // when two successes overlap across worker threads.
                    let bound = renderer.bind_source(SourceRef::Local(pending_ref));
                    (receipt, bound, Arc::clone(renderer))
                }
                Err(e) => {
                    warn!("upload of '{}' failed: {e}", file.name);
                    inner.state = UiState::Error(e.to_string());
                    inner.renderer = None;
                    inner.local_ref = None;
                    // pending_ref dropped below: released exactly once.
                    return inner.state.clone();
                }
            }
        };

        // The renderer was bound to the same reference the upload was made
        // from; run its sequence outside the lock. Its own generation
        // check discards this sequence if a newer selection has landed.
        renderer.render_bound(bound, Some(&receipt.pages)).await;

        self.state()
    }
}
