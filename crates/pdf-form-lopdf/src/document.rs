//! Document and page handles backed by lopdf

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use lopdf::Document;
use pdf_form_overlay::{
    Backend, DocumentHandle, FieldMetadata, FormError, PageHandle, RasterSurface, Source,
    Viewport, WorkerLocator,
};

use crate::acroform::collect_fields;
use crate::error::*;
use crate::metadata::{PageGeometry, build_metadata, page_geometry};
use crate::model::LopdfFormModel;
use crate::raster::rasterize;

/// Backend that parses documents with lopdf and rasterizes with pdfium
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfBackend;

impl LopdfBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Read the raw bytes a source refers to. Only `file://` URLs resolve.
pub async fn read_source(source: &Source) -> Result<Arc<[u8]>> {
    match source {
        Source::Path(path) => Ok(tokio::fs::read(path).await?.into()),
        Source::Url(url) => {
            let path = url.strip_prefix("file://").ok_or_else(|| {
                LopdfBackendError::UnsupportedSource(format!("cannot fetch {}", url))
            })?;
            Ok(tokio::fs::read(PathBuf::from(path)).await?.into())
        }
        Source::Bytes(bytes) => Ok(Arc::clone(bytes)),
        Source::Init(init) => match (&init.data, &init.path) {
            (Some(data), _) => Ok(Arc::clone(data)),
            (None, Some(path)) => Ok(tokio::fs::read(path).await?.into()),
            (None, None) => Err(LopdfBackendError::UnsupportedSource(
                "source has neither data nor path".to_string(),
            )),
        },
    }
}

struct Shared {
    bytes: Arc<[u8]>,
    pages: Vec<PageGeometry>,
    metadata: FieldMetadata,
    worker: WorkerLocator,
    released: Cell<bool>,
}

impl Shared {
    fn check_live(&self) -> Result<()> {
        if self.released.get() {
            return Err(LopdfBackendError::Released);
        }
        Ok(())
    }
}

pub struct LopdfDocument {
    shared: Rc<Shared>,
}

pub struct LopdfPage {
    number: usize,
    shared: Rc<Shared>,
}

impl LopdfDocument {
    /// Parse `bytes`, collecting page geometry and field metadata up front
    pub async fn parse(bytes: Arc<[u8]>, worker: WorkerLocator) -> Result<Self> {
        let parsed = Arc::clone(&bytes);
        let (pages, metadata) = tokio::task::spawn_blocking(move || {
            let doc = Document::load_mem(&parsed)?;
            let pages = page_geometry(&doc);
            let fields = collect_fields(&doc)?;
            let metadata = build_metadata(&doc, &fields, &pages);
            Ok::<_, LopdfBackendError>((pages, metadata))
        })
        .await??;

        log::info!(
            "Parsed document: {} pages, {} field groups",
            pages.len(),
            metadata.len()
        );
        Ok(Self {
            shared: Rc::new(Shared {
                bytes,
                pages,
                metadata,
                worker,
                released: Cell::new(false),
            }),
        })
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.get()
    }
}

impl Backend for LopdfBackend {
    type Document = LopdfDocument;
    type Model = LopdfFormModel;

    async fn open(
        &self,
        source: &Source,
        worker: &WorkerLocator,
    ) -> pdf_form_overlay::Result<LopdfDocument> {
        let bytes = read_source(source)
            .await
            .map_err(|e| FormError::Load(e.to_string()))?;
        LopdfDocument::parse(bytes, worker.clone())
            .await
            .map_err(|e| FormError::Load(e.to_string()))
    }

    async fn load_form(&self, bytes: &[u8]) -> pdf_form_overlay::Result<LopdfFormModel> {
        let bytes = bytes.to_vec();
        let model = tokio::task::spawn_blocking(move || LopdfFormModel::parse(&bytes)).await??;
        Ok(model)
    }
}

impl DocumentHandle for LopdfDocument {
    type Page = LopdfPage;

    fn page_count(&self) -> usize {
        self.shared.pages.len()
    }

    async fn page(&self, number: usize) -> pdf_form_overlay::Result<LopdfPage> {
        if self.shared.released.get() {
            return Err(FormError::PageDestroyed(number));
        }
        if number == 0 || number > self.page_count() {
            return Err(FormError::PageUnavailable(number));
        }
        Ok(LopdfPage {
            number,
            shared: Rc::clone(&self.shared),
        })
    }

    async fn field_metadata(&self) -> pdf_form_overlay::Result<FieldMetadata> {
        self.shared.check_live()?;
        Ok(self.shared.metadata.clone())
    }

    async fn bytes(&self) -> pdf_form_overlay::Result<Arc<[u8]>> {
        self.shared.check_live()?;
        Ok(Arc::clone(&self.shared.bytes))
    }

    fn release(&self) {
        if !self.shared.released.replace(true) {
            log::debug!("Released document ({} pages)", self.shared.pages.len());
        }
    }
}

impl PageHandle for LopdfPage {
    fn number(&self) -> usize {
        self.number
    }

    fn viewport(&self, scale: f32) -> Viewport {
        let page = &self.shared.pages[self.number - 1];
        Viewport::from_native(page.width(), page.height(), scale)
    }

    fn is_destroyed(&self) -> bool {
        self.shared.released.get()
    }

    async fn render(
        &self,
        surface: &mut RasterSurface,
        _viewport: &Viewport,
    ) -> pdf_form_overlay::Result<()> {
        if self.is_destroyed() {
            return Err(FormError::PageDestroyed(self.number));
        }
        rasterize(
            Arc::clone(&self.shared.bytes),
            &self.shared.worker,
            self.number - 1,
            surface,
        )
        .await?;
        Ok(())
    }
}
