//! Field-overlay synchronization for interactive PDF forms
//!
//! Keeps rendered page rasters, a set of live form controls and the
//! document's field coordinate space in step across zoom changes, container
//! resizes and reloads, and writes edited values back into document bytes.

pub mod backend;
pub mod controls;
pub mod geometry;
pub mod loader;
mod options;
pub mod raster;
pub mod reconcile;
pub mod save;
mod types;
pub mod viewer;
pub mod zoom;

pub use backend::{
    Backend, DocumentHandle, FormModel, ModelField, ModelFieldKind, PageHandle, PrintJob,
    PrintTarget, Source, SourceInit, WorkerLocator,
};
pub use controls::{ControlId, ControlStore, ControlValue, LiveControl};
pub use geometry::{OverlayRect, Viewport, field_rect_from_overlay, place_overlay};
pub use loader::load_page_entries;
pub use options::*;
pub use raster::{PAPER, RasterSurface};
pub use reconcile::{ApplyReport, apply_values};
pub use save::{
    CallbackSink, Delivery, DownloadSink, FilePicker, NoPicker, OnSave, PickerResult,
    PlatformSink, SaveDestination, SaveOutcome, SaveRoute, SaveSink, derive_file_name,
};
pub use types::*;
pub use viewer::{FormViewer, OpenRequest, RenderReport, SaveJob, ViewerState};
pub use zoom::ZoomController;
