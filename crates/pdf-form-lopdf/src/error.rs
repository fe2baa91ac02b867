use pdf_form_overlay::FormError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LopdfBackendError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),
    #[error("Document has been released")]
    Released,
    #[error("Field error: {0}")]
    Field(String),
    #[error("Rasterizer error: {0}")]
    Rasterizer(String),
}

pub type Result<T> = std::result::Result<T, LopdfBackendError>;

impl From<LopdfBackendError> for FormError {
    fn from(e: LopdfBackendError) -> Self {
        match e {
            LopdfBackendError::Io(e) => FormError::Io(e),
            LopdfBackendError::TaskJoin(e) => FormError::TaskJoin(e),
            LopdfBackendError::Field(msg) => FormError::FormModel(msg),
            LopdfBackendError::Rasterizer(msg) => FormError::Render(msg),
            other => FormError::Backend(other.to_string()),
        }
    }
}

#[cfg(all(feature = "pdfium", not(target_arch = "wasm32")))]
impl From<pdfium_render::prelude::PdfiumError> for LopdfBackendError {
    fn from(e: pdfium_render::prelude::PdfiumError) -> Self {
        LopdfBackendError::Rasterizer(e.to_string())
    }
}
