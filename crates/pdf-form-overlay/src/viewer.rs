//! Viewer state machine
//!
//! Sequences document load, page/field load, render passes and saves:
//!
//! ```text
//! Idle -> DocumentLoading -> DocumentReady -> PagesLoading -> PagesReady
//!             ^                                                 |
//!             +--------------- source change (unload) ----------+
//! ```
//!
//! Loads run outside the viewer. Each one is tagged with the generation that
//! started it, and completions from an older generation are dropped.

use std::rc::Rc;

use crate::backend::{
    Backend, DocumentHandle, FormModel, PageHandle, PrintJob, PrintTarget, Source, WorkerLocator,
};
use crate::controls::{ControlId, ControlStore, LiveControl};
use crate::geometry::place_overlay;
use crate::options::ViewerOptions;
use crate::raster::{PAPER, RasterSurface};
use crate::reconcile::apply_values;
use crate::save::{Delivery, SaveOutcome, SaveSink, derive_file_name};
use crate::types::*;
use crate::zoom::ZoomController;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewerState {
    #[default]
    Idle,
    DocumentLoading,
    DocumentReady,
    PagesLoading,
    PagesReady,
    /// A load failed. The viewer stays here until the source changes.
    Failed(String),
}

/// Everything needed to open the document for one generation
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub generation: Generation,
    pub source: Source,
    pub worker: WorkerLocator,
}

/// Outcome of one render pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderReport {
    pub scale: f32,
    pub rendered: Vec<usize>,
    pub skipped_destroyed: Vec<usize>,
    pub failed: Vec<(usize, String)>,
}

type PageOf<B> = <<B as Backend>::Document as DocumentHandle>::Page;

pub struct FormViewer<B: Backend> {
    options: ViewerOptions,
    state: ViewerState,
    generation: Generation,
    source: Option<Source>,
    document: Option<Rc<B::Document>>,
    pages: Vec<PageEntry<PageOf<B>>>,
    surfaces: Vec<RasterSurface>,
    zoom: ZoomController,
    /// Widest page at 1.0x, captured by the first render pass of a load
    max_native_width: Option<f32>,
    controls: ControlStore,
    saving: bool,
}

impl<B: Backend> FormViewer<B> {
    pub fn new(options: ViewerOptions) -> Result<Self> {
        options.validate()?;
        let zoom = options.zoom_controller()?;
        Ok(Self {
            options,
            state: ViewerState::Idle,
            generation: Generation::default(),
            source: None,
            document: None,
            pages: Vec::new(),
            surfaces: Vec::new(),
            zoom,
            max_native_width: None,
            controls: ControlStore::new(),
            saving: false,
        })
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ViewerState::PagesReady
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    pub fn zoom(&self) -> &ZoomController {
        &self.zoom
    }

    pub fn max_native_page_width(&self) -> Option<f32> {
        self.max_native_width
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_entries(&self) -> &[PageEntry<PageOf<B>>] {
        &self.pages
    }

    /// Raster of a 1-based page from the latest render pass
    pub fn surface(&self, page_number: usize) -> Option<&RasterSurface> {
        page_number
            .checked_sub(1)
            .and_then(|i| self.surfaces.get(i))
            .filter(|s| !s.is_empty())
    }

    pub fn controls(&self) -> &ControlStore {
        &self.controls
    }

    /// Write access for UI layers pushing user edits
    pub fn controls_mut(&mut self) -> &mut ControlStore {
        &mut self.controls
    }

    /// Controls placed on a 1-based page
    pub fn overlays(&self, page_number: usize) -> Vec<&LiveControl> {
        self.controls.on_page(page_number).collect()
    }

    /// Current value of every live field
    pub fn form_fields(&self) -> FieldValues {
        self.controls.snapshot()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// File name a save of the current source would use
    pub fn save_file_name(&self) -> String {
        derive_file_name(self.source.as_ref(), &self.options.fallback_file_name)
    }

    /// Switch to a new source. The previous document is released right
    /// away and any load still in flight for it becomes stale.
    pub fn set_source(&mut self, source: Source) -> OpenRequest {
        if self.state != ViewerState::Idle {
            log::debug!("Unloading generation {}", self.generation.0);
        }
        self.unload();
        self.generation = self.generation.next();
        self.source = Some(source.clone());
        self.transition(ViewerState::DocumentLoading);
        OpenRequest {
            generation: self.generation,
            source,
            worker: self.options.worker_locator(),
        }
    }

    /// Tear down the current document and return to idle
    pub fn close(&mut self) {
        self.unload();
        self.generation = self.generation.next();
        self.source = None;
        self.transition(ViewerState::Idle);
    }

    fn transition(&mut self, next: ViewerState) {
        log::debug!(
            "Viewer {:?} -> {:?} (generation {})",
            self.state,
            next,
            self.generation.0
        );
        self.state = next;
    }

    fn unload(&mut self) {
        if let Some(document) = self.document.take() {
            document.release();
        }
        self.pages.clear();
        self.surfaces.clear();
        self.controls.clear();
        self.max_native_width = None;
    }

    /// Feed back the result of an [`OpenRequest`]. Returns the document to
    /// load pages from, or `None` if the result is stale or failed. Stale
    /// documents are released immediately.
    pub fn document_opened(
        &mut self,
        generation: Generation,
        result: Result<B::Document>,
    ) -> Option<Rc<B::Document>> {
        if generation != self.generation || self.state != ViewerState::DocumentLoading {
            log::debug!(
                "Discarding document from stale generation {} (current {})",
                generation.0,
                self.generation.0
            );
            if let Ok(document) = result {
                document.release();
            }
            return None;
        }

        match result {
            Ok(document) => {
                let document = Rc::new(document);
                log::debug!("Document ready with {} pages", document.page_count());
                self.document = Some(Rc::clone(&document));
                self.transition(ViewerState::DocumentReady);
                self.transition(ViewerState::PagesLoading);
                Some(document)
            }
            Err(e) => {
                log::warn!("Document load failed: {}", e);
                self.state = ViewerState::Failed(e.to_string());
                None
            }
        }
    }

    /// Feed back the result of loading page entries. Returns true if the
    /// entries were published and a render pass is due.
    pub fn pages_loaded(
        &mut self,
        generation: Generation,
        result: Result<Vec<PageEntry<PageOf<B>>>>,
    ) -> bool {
        if generation != self.generation || self.state != ViewerState::PagesLoading {
            log::debug!(
                "Discarding pages from stale generation {} (current {})",
                generation.0,
                self.generation.0
            );
            return false;
        }

        match result {
            Ok(pages) => {
                self.controls.rebuild(
                    pages
                        .iter()
                        .map(|entry| (entry.page.number(), entry.fields.as_slice())),
                );
                self.surfaces = vec![RasterSurface::new(); pages.len()];
                self.pages = pages;
                self.transition(ViewerState::PagesReady);
                log::info!(
                    "Loaded {} pages with {} fields",
                    self.pages.len(),
                    self.controls.len()
                );
                true
            }
            Err(e) => {
                log::warn!("Page load failed: {}", e);
                self.state = ViewerState::Failed(e.to_string());
                false
            }
        }
    }

    /// Step one zoom level up. Returns true if a render pass is due.
    pub fn zoom_in(&mut self) -> bool {
        self.is_ready() && self.zoom.zoom_in()
    }

    /// Step one zoom level down. Returns true if a render pass is due.
    pub fn zoom_out(&mut self) -> bool {
        self.is_ready() && self.zoom.zoom_out()
    }

    /// Pick the zoom level that best fits the widest page into
    /// `container_width`. Returns true if a render pass is due.
    ///
    /// The widest page is measured once per load, so documents with mixed
    /// page sizes fit against the first measurement only.
    pub fn resize(&mut self, container_width: f32) -> bool {
        if !self.is_ready() {
            return false;
        }
        let Some(max_width) = self.max_native_width.filter(|w| *w > 0.0) else {
            return false;
        };
        self.zoom.snap_to(container_width / max_width)
    }

    /// Render every live page at the current zoom and move each control to
    /// its overlay position. Pages of a released document are skipped.
    pub async fn render(&mut self) -> Result<RenderReport> {
        if !self.is_ready() {
            return Err(FormError::NotReady("pages are not loaded"));
        }

        let scale = self.zoom.scale();
        let ratio = self.options.device_pixel_ratio;

        if self.max_native_width.is_none() {
            self.max_native_width = self
                .pages
                .iter()
                .filter(|entry| !entry.page.is_destroyed())
                .map(|entry| entry.page.viewport(1.0).width)
                .reduce(f32::max);
            log::debug!("Widest page at 1.0x: {:?}", self.max_native_width);
        }

        let mut report = RenderReport {
            scale,
            ..Default::default()
        };

        for (entry, surface) in self.pages.iter().zip(self.surfaces.iter_mut()) {
            let number = entry.page.number();
            if entry.page.is_destroyed() {
                log::debug!("Skipping destroyed page {}", number);
                report.skipped_destroyed.push(number);
                continue;
            }

            let viewport = entry.page.viewport(scale);
            surface.resize(&viewport, ratio);
            match entry.page.render(surface, &viewport).await {
                Ok(()) => report.rendered.push(number),
                Err(e) => {
                    log::warn!("Failed to render page {}: {}", number, e);
                    surface.fill(PAPER);
                    report.failed.push((number, e.to_string()));
                }
            }

            for (slot, field) in entry.fields.iter().enumerate() {
                let placement = place_overlay(&field.rect, viewport.height, scale);
                let id = ControlId {
                    page_number: number,
                    slot,
                };
                if !self.controls.place(id, &field.name, placement) {
                    log::debug!("No live control for '{}' on page {}", field.name, number);
                }
            }
        }

        Ok(report)
    }

    /// Hand the rendered pages to a print collaborator
    pub async fn print<T: PrintTarget>(&self, target: &T) -> Result<()> {
        if !self.is_ready() {
            return Err(FormError::NotReady("nothing to print"));
        }
        let pages: Vec<&RasterSurface> = self.surfaces.iter().filter(|s| !s.is_empty()).collect();
        let title = self.save_file_name();
        target
            .print(PrintJob {
                title: &title,
                pages: &pages,
            })
            .await
    }

    /// Start a save. Fails with [`FormError::SaveInProgress`] while another
    /// save is running; the caller must pass the outcome to
    /// [`finish_save`](Self::finish_save).
    pub fn begin_save(&mut self) -> Result<SaveJob<B::Document>> {
        if self.saving {
            log::debug!("Ignoring save request, a save is already running");
            return Err(FormError::SaveInProgress);
        }
        let Some(document) = self.document.clone().filter(|_| self.is_ready()) else {
            return Err(FormError::NotReady("no document to save"));
        };
        self.saving = true;
        Ok(SaveJob {
            document,
            values: self.controls.snapshot(),
            file_name: self.save_file_name(),
        })
    }

    pub fn finish_save(&mut self, outcome: &SaveOutcome) {
        self.saving = false;
        match outcome {
            SaveOutcome::Delivered { file_name, .. } => log::info!("Saved {}", file_name),
            SaveOutcome::Cancelled => log::info!("Save cancelled"),
            SaveOutcome::Failed(_) => {}
        }
    }

    /// Run a whole save inline
    pub async fn save<S: SaveSink>(&mut self, backend: &B, sink: &S) -> Result<SaveOutcome> {
        let job = self.begin_save()?;
        let outcome = job.run(backend, sink).await;
        self.finish_save(&outcome);
        Ok(outcome)
    }
}

/// A save detached from the viewer, so the viewer keeps handling events
/// while bytes are produced
pub struct SaveJob<D> {
    document: Rc<D>,
    values: FieldValues,
    file_name: String,
}

impl<D: DocumentHandle> SaveJob<D> {
    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Re-parse the original bytes, apply the snapshot, serialize and
    /// deliver. Errors are logged and reported in the outcome.
    pub async fn run<B, S>(self, backend: &B, sink: &S) -> SaveOutcome
    where
        B: Backend<Document = D>,
        S: SaveSink,
    {
        let result = self.execute(backend, sink).await;
        match result {
            Ok(Delivery::Delivered(destination)) => SaveOutcome::Delivered {
                file_name: self.file_name,
                destination,
            },
            Ok(Delivery::Cancelled) => SaveOutcome::Cancelled,
            Err(e) => {
                log::error!("Failed to save {}: {}", self.file_name, e);
                SaveOutcome::Failed(e.to_string())
            }
        }
    }

    async fn execute<B, S>(&self, backend: &B, sink: &S) -> Result<Delivery>
    where
        B: Backend<Document = D>,
        S: SaveSink,
    {
        let original = self.document.bytes().await?;
        let mut model = backend.load_form(&original).await?;
        let report = apply_values(&mut model, &self.values)?;
        log::debug!(
            "Applied {} values, {} left at default",
            report.applied.len(),
            report.unsupported.len()
        );
        let bytes = model.save().await?;
        sink.deliver(&self.file_name, bytes, &self.values).await
    }
}
