//! Per-page document rendering with stale-result suppression.
//!
//! [`DocumentRenderer`] owns the document handle's lifetime: whenever the
//! source reference changes it discards the old handle and surfaces, opens
//! a new handle, allocates one surface per page in order, and draws each
//! page independently. Page draws may overlap (bounded by
//! `render_concurrency`) and one page's failure never touches its
//! siblings.
//!
//! ## Generations
//!
//! A source change while a previous open/render sequence is still in
//! flight must not let the stale sequence write into the new surfaces.
//! Every `set_source` call takes the next generation number; every commit
//! (phase change, surface sizing, draw result) re-checks that its
//! generation is still current and silently drops the result otherwise.
//! This is the only defence required — no true cancellation of in-flight
//! draws is assumed.

use crate::backend::{DocumentHandle, RenderBackend};
use crate::config::ViewerConfig;
use crate::error::PageError;
use crate::source::SourceRef;
use crate::transport::PageDescriptor;
use futures::StreamExt;
use image::DynamicImage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Document-level lifecycle of one render sequence.
///
/// Terminal states are `Rendered` (every page was attempted, each with its
/// own outcome) and `OpenFailed`. A per-page failure never moves the
/// document away from `Rendered`.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPhase {
    /// No source has been set yet.
    Unopened,
    /// A document handle is being opened for the current source.
    Opening,
    /// Pages are being drawn.
    Rendering { completed: usize, total: usize },
    /// Every page was attempted; inspect the surfaces for per-page results.
    Rendered,
    /// The source could not be opened as a document.
    OpenFailed(String),
}

/// Outcome slot of a single page's surface.
#[derive(Debug, Clone)]
pub enum SurfaceState {
    /// Allocated, not yet drawn.
    Blank,
    /// Draw completed; the surface holds the page's pixels.
    Drawn(DynamicImage),
    /// Viewport lookup or draw failed for this page only.
    Failed(PageError),
}

/// One drawing surface, owned by the renderer, per page index.
#[derive(Debug, Clone)]
pub struct PageSurface {
    pub index: usize,
    /// Surface pixel dimensions; sized from the page's default viewport
    /// before the draw is issued. Zero until sizing happens.
    pub width: u32,
    pub height: u32,
    pub state: SurfaceState,
}

impl PageSurface {
    fn blank(index: usize) -> Self {
        Self {
            index,
            width: 0,
            height: 0,
            state: SurfaceState::Blank,
        }
    }

    pub fn is_drawn(&self) -> bool {
        matches!(self.state, SurfaceState::Drawn(_))
    }

    pub fn failure(&self) -> Option<&PageError> {
        match &self.state {
            SurfaceState::Failed(e) => Some(e),
            _ => None,
        }
    }
}

struct RendererInner {
    seq: u64,
    phase: RenderPhase,
    surfaces: Vec<PageSurface>,
    source: Option<SourceRef>,
}

/// Renders every page of a document into owned image surfaces.
pub struct DocumentRenderer<R: RenderBackend> {
    backend: Arc<R>,
    config: ViewerConfig,
    inner: Mutex<RendererInner>,
}

impl<R: RenderBackend> DocumentRenderer<R> {
    pub fn new(backend: Arc<R>, config: ViewerConfig) -> Self {
        Self {
            backend,
            config,
            inner: Mutex::new(RendererInner {
                seq: 0,
                phase: RenderPhase::Unopened,
                surfaces: Vec::new(),
                source: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RendererInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Document-level phase of the current render sequence.
    pub fn phase(&self) -> RenderPhase {
        self.lock().phase.clone()
    }

    /// Snapshot of the surfaces, in page order.
    pub fn surfaces(&self) -> Vec<PageSurface> {
        self.lock().surfaces.clone()
    }

    /// The source the renderer is currently bound to.
    pub fn source(&self) -> Option<SourceRef> {
        self.lock().source.clone()
    }

    /// Bind to a new source, reserving the generation that supersedes all
    /// earlier sequences. Hand the returned generation to
    /// [`render_bound`](Self::render_bound) to run the open/render
    /// sequence it reserved.
    ///
    /// Synchronous, so a caller can bind while holding its own lock and
    /// thereby fix the supersession order before any rendering starts,
    /// even when its sequences race across worker threads.
    pub fn bind_source(&self, source: SourceRef) -> u64 {
        let mut inner = self.lock();
        inner.seq += 1;
        inner.phase = RenderPhase::Opening;
        inner.surfaces.clear();
        inner.source = Some(source);
        inner.seq
    }

    /// Bind to a new source and run the full open/render sequence for it.
    ///
    /// `pages_hint` is the server-supplied descriptor list, if any; the
    /// document's own viewports always win, the hint is only checked for
    /// consistency.
    ///
    /// Returns when every page of this generation has been attempted, or
    /// earlier if the sequence was superseded by a newer binding.
    pub async fn set_source(&self, source: SourceRef, pages_hint: Option<&[PageDescriptor]>) {
        let generation = self.bind_source(source);
        self.render_bound(generation, pages_hint).await;
    }

    /// Run the open/render sequence reserved by [`bind_source`](Self::bind_source).
    ///
    /// A no-op when `generation` has already been superseded by a newer
    /// binding.
    pub async fn render_bound(&self, generation: u64, pages_hint: Option<&[PageDescriptor]>) {
        let source = {
            let inner = self.lock();
            if inner.seq != generation {
                debug!("bound render superseded before opening, discarding");
                return;
            }
            match &inner.source {
                Some(s) => s.clone(),
                None => return,
            }
        };

        let handle = match self.backend.open(&source).await {
            Ok(h) => Arc::new(h),
            Err(e) => {
                error!("Error loading PDF: {e}");
                let mut inner = self.lock();
                if inner.seq == generation {
                    inner.phase = RenderPhase::OpenFailed(e.to_string());
                }
                return;
            }
        };

        let total = handle.page_count();
        if let Some(hint) = pages_hint {
            if !hint.is_empty() && hint.len() != total {
                warn!(
                    "server reported {} pages but document has {}",
                    hint.len(),
                    total
                );
            }
        }

        {
            let mut inner = self.lock();
            if inner.seq != generation {
                debug!("open result superseded, discarding");
                return;
            }
            inner.surfaces = (0..total).map(PageSurface::blank).collect();
            inner.phase = RenderPhase::Rendering {
                completed: 0,
                total,
            };
        }
        info!("rendering {total} pages");

        futures::stream::iter(0..total)
            .for_each_concurrent(Some(self.config.render_concurrency), |index| {
                let handle = Arc::clone(&handle);
                async move {
                    self.render_page(generation, handle, index).await;
                }
            })
            .await;

        let mut inner = self.lock();
        if inner.seq == generation {
            inner.phase = RenderPhase::Rendered;
            let failed = inner.surfaces.iter().filter(|s| s.failure().is_some()).count();
            info!("render sequence complete: {}/{} pages ok", total - failed, total);
        }
    }

    /// Size and draw one page, committing only if `generation` is current.
    async fn render_page(&self, generation: u64, handle: Arc<R::Handle>, index: usize) {
        let viewport = match handle.viewport(index) {
            Ok(v) => v,
            Err(e) => {
                warn!("{e}");
                self.commit_page(generation, index, 0, 0, SurfaceState::Failed(e));
                return;
            }
        };

        let (width, height) =
            surface_dimensions(viewport.width, viewport.height, self.config.max_render_pixels);

        // Size the surface before issuing the draw, as a separate commit:
        // a caller polling mid-sequence sees sized-but-blank surfaces.
        {
            let mut inner = self.lock();
            if inner.seq != generation {
                return;
            }
            if let Some(surface) = inner.surfaces.get_mut(index) {
                surface.width = width;
                surface.height = height;
            }
        }

        match handle.render(index, width, height).await {
            Ok(image) => {
                debug!("page {index} drawn at {width}x{height}");
                self.commit_page(generation, index, width, height, SurfaceState::Drawn(image));
            }
            Err(e) => {
                warn!("{e}");
                self.commit_page(generation, index, width, height, SurfaceState::Failed(e));
            }
        }
    }

    fn commit_page(
        &self,
        generation: u64,
        index: usize,
        width: u32,
        height: u32,
        state: SurfaceState,
    ) {
        let mut inner = self.lock();
        if inner.seq != generation {
            debug!("page {index} result superseded, discarding");
            return;
        }
        if let Some(surface) = inner.surfaces.get_mut(index) {
            surface.width = width;
            surface.height = height;
            surface.state = state;
        }
        if let RenderPhase::Rendering { completed, total } = inner.phase {
            inner.phase = RenderPhase::Rendering {
                completed: completed + 1,
                total,
            };
        }
    }
}

/// Map a viewport (in points) onto surface pixel dimensions.
///
/// One point maps to one pixel until the longest edge exceeds `max_px`;
/// past that the surface scales down proportionally.
pub fn surface_dimensions(width: f32, height: f32, max_px: u32) -> (u32, u32) {
    let w = width.max(1.0);
    let h = height.max(1.0);
    let longest = w.max(h);
    let scale = if longest > max_px as f32 {
        max_px as f32 / longest
    } else {
        1.0
    };
    (
        (w * scale).round().max(1.0) as u32,
        (h * scale).round().max(1.0) as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Viewport;
    use crate::error::ViewerError;
    use crate::source::LocalFileRef;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    // ── In-memory backend ────────────────────────────────────────────────

    struct MockHandle {
        pages: usize,
        failing: HashSet<usize>,
        render_calls: Arc<Mutex<Vec<usize>>>,
    }

    impl DocumentHandle for MockHandle {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn viewport(&self, _index: usize) -> Result<Viewport, PageError> {
            Ok(Viewport {
                width: 800.0,
                height: 600.0,
            })
        }

        async fn render(
            &self,
            index: usize,
            width: u32,
            height: u32,
        ) -> Result<DynamicImage, PageError> {
            self.render_calls.lock().unwrap().push(index);
            if self.failing.contains(&index) {
                Err(PageError::RenderFailed {
                    page: index,
                    detail: "mock failure".into(),
                })
            } else {
                Ok(DynamicImage::new_rgba8(width, height))
            }
        }
    }

    struct MockBackend {
        pages: usize,
        failing: HashSet<usize>,
        fail_open: bool,
        opens: AtomicUsize,
        render_calls: Arc<Mutex<Vec<usize>>>,
        /// When set, the first open blocks until notified.
        first_open_gate: Option<Arc<Notify>>,
    }

    impl MockBackend {
        fn with_pages(pages: usize) -> Self {
            Self {
                pages,
                failing: HashSet::new(),
                fail_open: false,
                opens: AtomicUsize::new(0),
                render_calls: Arc::new(Mutex::new(Vec::new())),
                first_open_gate: None,
            }
        }
    }

    impl RenderBackend for MockBackend {
        type Handle = MockHandle;

        async fn open(&self, _source: &SourceRef) -> Result<MockHandle, ViewerError> {
            let n = self.opens.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                if let Some(gate) = &self.first_open_gate {
                    gate.notified().await;
                }
            }
            if self.fail_open {
                return Err(ViewerError::DocumentOpenFailed {
                    detail: "Failed to load PDF".into(),
                });
            }
            Ok(MockHandle {
                pages: self.pages,
                failing: self.failing.clone(),
                render_calls: Arc::clone(&self.render_calls),
            })
        }
    }

    fn local_source() -> SourceRef {
        SourceRef::Local(LocalFileRef::new("test.pdf", b"%PDF-1.4").unwrap())
    }

    fn renderer_with(backend: MockBackend) -> (DocumentRenderer<MockBackend>, Arc<Mutex<Vec<usize>>>) {
        let calls = Arc::clone(&backend.render_calls);
        let r = DocumentRenderer::new(Arc::new(backend), ViewerConfig::default());
        (r, calls)
    }

    #[tokio::test]
    async fn two_pages_give_two_surfaces_with_one_draw_each() {
        let (renderer, calls) = renderer_with(MockBackend::with_pages(2));

        renderer.set_source(local_source(), None).await;

        assert_eq!(renderer.phase(), RenderPhase::Rendered);
        let surfaces = renderer.surfaces();
        assert_eq!(surfaces.len(), 2);
        for (i, s) in surfaces.iter().enumerate() {
            assert_eq!(s.index, i);
            assert_eq!((s.width, s.height), (800, 600));
            assert!(s.is_drawn());
        }

        let mut recorded = calls.lock().unwrap().clone();
        recorded.sort_unstable();
        assert_eq!(recorded, vec![0, 1], "exactly one draw per page");
    }

    #[tokio::test]
    async fn page_failure_does_not_block_siblings() {
        let mut backend = MockBackend::with_pages(3);
        backend.failing.insert(1);
        let (renderer, _) = renderer_with(backend);

        renderer.set_source(local_source(), None).await;

        // Per-page failure leaves the document-level state at Rendered.
        assert_eq!(renderer.phase(), RenderPhase::Rendered);
        let surfaces = renderer.surfaces();
        assert!(surfaces[0].is_drawn());
        assert!(surfaces[1].failure().is_some());
        assert!(surfaces[2].is_drawn());
    }

    #[tokio::test]
    async fn open_failure_is_terminal_with_no_surfaces() {
        let mut backend = MockBackend::with_pages(2);
        backend.fail_open = true;
        let (renderer, calls) = renderer_with(backend);

        renderer.set_source(local_source(), None).await;

        match renderer.phase() {
            RenderPhase::OpenFailed(msg) => assert!(msg.contains("Failed to load PDF")),
            other => panic!("expected OpenFailed, got {other:?}"),
        }
        assert!(renderer.surfaces().is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_document_goes_straight_to_rendered() {
        tokio_test::block_on(async {
            let (renderer, _) = renderer_with(MockBackend::with_pages(0));
            renderer.set_source(local_source(), None).await;
            assert_eq!(renderer.phase(), RenderPhase::Rendered);
            assert!(renderer.surfaces().is_empty());
        });
    }

    #[tokio::test]
    async fn stale_open_never_overwrites_newer_sequence() {
        let gate = Arc::new(Notify::new());
        let mut backend = MockBackend::with_pages(1);
        backend.first_open_gate = Some(Arc::clone(&gate));
        let (renderer, _) = renderer_with(backend);

        let first = renderer.set_source(local_source(), None);
        let second = async {
            // Runs while the first open is parked on the gate.
            renderer.set_source(local_source(), None).await;
            gate.notify_waiters();
        };
        tokio::join!(first, second);

        // The first sequence's open resolved last, but its generation is
        // stale; the second sequence's result must stand.
        assert_eq!(renderer.phase(), RenderPhase::Rendered);
        assert_eq!(renderer.surfaces().len(), 1);
    }

    #[tokio::test]
    async fn render_of_an_older_binding_is_discarded() {
        let (renderer, calls) = renderer_with(MockBackend::with_pages(1));

        let stale = renderer.bind_source(local_source());
        let current = renderer.bind_source(local_source());

        // The older binding resolves first but must not open or draw.
        renderer.render_bound(stale, None).await;
        assert_eq!(renderer.phase(), RenderPhase::Opening);
        assert!(calls.lock().unwrap().is_empty());

        renderer.render_bound(current, None).await;
        assert_eq!(renderer.phase(), RenderPhase::Rendered);
        assert_eq!(renderer.surfaces().len(), 1);
    }

    #[test]
    fn surface_dimensions_pass_through_and_cap() {
        assert_eq!(surface_dimensions(800.0, 600.0, 2000), (800, 600));
        assert_eq!(surface_dimensions(4000.0, 2000.0, 2000), (2000, 1000));
        assert_eq!(surface_dimensions(100.0, 4000.0, 2000), (50, 2000));
        assert_eq!(surface_dimensions(0.0, 0.0, 2000), (1, 1));
    }
}
