//! lopdf-backed document, field metadata and form model for
//! `pdf-form-overlay`, with optional pdfium rasterization

pub mod acroform;
pub mod document;
mod error;
pub mod metadata;
pub mod model;
pub mod raster;

pub use document::{LopdfBackend, LopdfDocument, LopdfPage, read_source};
pub use error::*;
pub use metadata::{PageGeometry, build_metadata, page_geometry};
pub use model::LopdfFormModel;

#[cfg(all(feature = "pdfium", not(target_arch = "wasm32")))]
pub use raster::init_pdfium;
