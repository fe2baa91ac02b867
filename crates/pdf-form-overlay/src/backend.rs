//! Contracts with the document, rasterization, form-model and print
//! collaborators.
//!
//! The engine runs on a single-threaded executor, so none of these traits
//! require `Send` and handles are free to share state through `Rc`.

#![allow(async_fn_in_trait)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::geometry::Viewport;
use crate::raster::RasterSurface;
use crate::types::{FieldMetadata, Result};

/// Where a document comes from
#[derive(Debug, Clone)]
pub enum Source {
    Path(PathBuf),
    Url(String),
    Bytes(Arc<[u8]>),
    Init(SourceInit),
}

/// Structured source parameters
#[derive(Debug, Clone, Default)]
pub struct SourceInit {
    pub data: Option<Arc<[u8]>>,
    pub path: Option<PathBuf>,
    /// Name to save under when the source has no path of its own
    pub file_name: Option<String>,
}

impl Source {
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Source::Bytes(bytes.into())
    }

    /// Trailing path segment of the source reference, if it has one
    pub fn file_name(&self) -> Option<String> {
        match self {
            Source::Path(path) => file_name_of(path),
            Source::Url(url) => {
                let trimmed = url.split(['?', '#']).next().unwrap_or("");
                trimmed
                    .rsplit('/')
                    .next()
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            }
            Source::Bytes(_) => None,
            Source::Init(init) => init
                .file_name
                .clone()
                .filter(|s| !s.is_empty())
                .or_else(|| init.path.as_deref().and_then(file_name_of)),
        }
    }
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}

/// Location of the rasterizer worker (for pdfium: the shared library),
/// handed explicitly to every document acquisition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerLocator {
    pub path: Option<PathBuf>,
}

impl WorkerLocator {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

/// Document and form-model factory
pub trait Backend {
    type Document: DocumentHandle;
    type Model: FormModel;

    /// Parse a document from its source
    async fn open(&self, source: &Source, worker: &WorkerLocator) -> Result<Self::Document>;

    /// Parse an independent form model from raw document bytes
    async fn load_form(&self, bytes: &[u8]) -> Result<Self::Model>;
}

/// A parsed document
pub trait DocumentHandle {
    type Page: PageHandle;

    fn page_count(&self) -> usize;

    /// Acquire a page by its 1-based number
    async fn page(&self, number: usize) -> Result<Self::Page>;

    /// All field metadata, grouped by a backend-defined key
    async fn field_metadata(&self) -> Result<FieldMetadata>;

    /// The original document bytes
    async fn bytes(&self) -> Result<Arc<[u8]>>;

    /// Free the document. Page handles acquired from it become destroyed.
    fn release(&self);
}

/// One page of a parsed document
pub trait PageHandle {
    /// 1-based page number
    fn number(&self) -> usize;

    fn viewport(&self, scale: f32) -> Viewport;

    /// True once the owning document has been released
    fn is_destroyed(&self) -> bool;

    /// Render into `surface`, which is already sized for `viewport`
    async fn render(&self, surface: &mut RasterSurface, viewport: &Viewport) -> Result<()>;
}

/// Field kinds a form model can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFieldKind {
    Text,
    Checkbox,
    Choice,
    OptionList,
    RadioGroup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelField {
    pub name: String,
    pub kind: ModelFieldKind,
}

/// Mutable in-memory form used to write values back into document bytes
pub trait FormModel {
    fn fields(&self) -> Vec<ModelField>;
    fn set_text(&mut self, name: &str, value: &str) -> Result<()>;
    fn set_checked(&mut self, name: &str, checked: bool) -> Result<()>;
    fn select(&mut self, name: &str, export_value: &str) -> Result<()>;
    async fn save(&self) -> Result<Vec<u8>>;
}

/// Rendered overlay content handed to the print collaborator
#[derive(Debug, Clone, Copy)]
pub struct PrintJob<'a> {
    pub title: &'a str,
    pub pages: &'a [&'a RasterSurface],
}

pub trait PrintTarget {
    async fn print(&self, job: PrintJob<'_>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_path() {
        let source = Source::Path(PathBuf::from("/tmp/forms/w9.pdf"));
        assert_eq!(source.file_name().as_deref(), Some("w9.pdf"));
    }

    #[test]
    fn test_file_name_from_url() {
        let source = Source::Url("https://example.com/a/b/tax.pdf?x=1#page=2".to_string());
        assert_eq!(source.file_name().as_deref(), Some("tax.pdf"));

        let source = Source::Url("https://example.com/".to_string());
        assert_eq!(source.file_name(), None);
    }

    #[test]
    fn test_file_name_from_init() {
        let source = Source::Init(SourceInit {
            path: Some(PathBuf::from("in/form.pdf")),
            ..Default::default()
        });
        assert_eq!(source.file_name().as_deref(), Some("form.pdf"));

        let source = Source::Init(SourceInit {
            path: Some(PathBuf::from("in/form.pdf")),
            file_name: Some("named.pdf".to_string()),
            ..Default::default()
        });
        assert_eq!(source.file_name().as_deref(), Some("named.pdf"));
    }

    #[test]
    fn test_bytes_have_no_file_name() {
        assert_eq!(Source::from_bytes(vec![1u8, 2, 3]).file_name(), None);
    }
}
