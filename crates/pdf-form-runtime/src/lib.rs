//! Messages between a host UI and the form worker, and the worker itself

use pdf_form_overlay::{ControlId, FieldValues, Generation, LiveControl, SaveOutcome, Source};

mod worker;

pub use worker::{spawn_worker_thread, worker_task};

/// Commands sent from UI to worker
#[derive(Debug)]
pub enum FormCommand {
    Open {
        source: Source,
    },
    Close,
    ZoomIn,
    ZoomOut,
    /// The page container changed width; queued resizes coalesce
    Resize {
        container_width: f32,
    },
    SetText {
        id: ControlId,
        text: String,
    },
    SetChecked {
        id: ControlId,
        checked: bool,
    },
    Select {
        id: ControlId,
        export_value: String,
    },
    /// Ask for the current value snapshot
    Snapshot,
    Save,
    Print,
}

/// Rendered page pixels
#[derive(Debug, Clone)]
pub struct PageImage {
    pub pixel_width: usize,
    pub pixel_height: usize,
    pub css_width: f32,
    pub css_height: f32,
    pub rgba: Vec<u8>,
}

/// Updates sent from worker to UI
#[derive(Debug, Clone)]
pub enum FormUpdate {
    Loading {
        generation: Generation,
    },
    Loaded {
        page_count: usize,
        controls: Vec<LiveControl>,
    },
    PageRendered {
        page_number: usize,
        scale: f32,
        image: PageImage,
        /// Controls of this page with their placement at `scale`
        overlays: Vec<LiveControl>,
    },
    ZoomChanged {
        scale: f32,
        can_zoom_in: bool,
        can_zoom_out: bool,
    },
    FormFields {
        values: FieldValues,
    },
    SaveStarted {
        file_name: String,
    },
    SaveFinished {
        outcome: SaveOutcome,
    },
    Printed {
        pages: usize,
    },
    Closed,
    Error {
        message: String,
    },
}
