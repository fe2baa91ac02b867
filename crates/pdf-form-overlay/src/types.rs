use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Failed to load document: {0}")]
    Load(String),
    #[error("Page {0} is not available")]
    PageUnavailable(usize),
    #[error("Page {0} belongs to a released document")]
    PageDestroyed(usize),
    #[error("Render error: {0}")]
    Render(String),
    #[error("Form model error: {0}")]
    FormModel(String),
    #[error("Save error: {0}")]
    Save(String),
    #[error("A save is already in progress")]
    SaveInProgress,
    #[error("Viewer is not ready: {0}")]
    NotReady(&'static str),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, FormError>;

/// Field kinds surfaced to the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FieldKind {
    Text,
    Checkbox,
    Choice,
}

/// Field rectangle in page space: `[left, bottom, right, top]`, origin bottom-left
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldRect {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl FieldRect {
    pub fn new(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }
}

/// One entry of a choice field: the value written back to the document and
/// the label shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChoiceItem {
    pub export_value: String,
    pub display_value: String,
}

impl ChoiceItem {
    pub fn new(export_value: impl Into<String>, display_value: impl Into<String>) -> Self {
        Self {
            export_value: export_value.into(),
            display_value: display_value.into(),
        }
    }
}

/// Immutable metadata for one form field widget
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDescriptor {
    /// Unique within a page, not guaranteed unique across the document
    pub name: String,
    pub kind: FieldKind,
    /// 0-indexed page the widget sits on
    pub page_index: usize,
    pub rect: FieldRect,
    pub editable: bool,
    pub hidden: bool,
    pub default_value: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub items: Vec<ChoiceItem>,
}

impl FieldDescriptor {
    /// Only editable, visible fields are ever handed to the overlay
    pub fn is_surfaced(&self) -> bool {
        self.editable && !self.hidden
    }

    /// Whether this descriptor belongs to the given 1-based page number
    pub fn belongs_to_page(&self, page_number: usize) -> bool {
        page_number >= 1 && self.page_index == page_number - 1
    }
}

/// Field metadata as reported by a document, grouped by a backend-defined key
pub type FieldMetadata = BTreeMap<String, Vec<FieldDescriptor>>;

/// Snapshot of field values keyed by field name
pub type FieldValues = BTreeMap<String, String>;

/// Checkbox value strings used in snapshots
pub const CHECKBOX_ON: &str = "On";
pub const CHECKBOX_OFF: &str = "Off";

/// Interpret a snapshot value as a checkbox state
pub fn parse_checked(value: &str) -> bool {
    let value = value.trim();
    if value == CHECKBOX_ON {
        return true;
    }
    if value == CHECKBOX_OFF || value.is_empty() {
        return false;
    }
    matches!(
        value.to_ascii_lowercase().as_str(),
        "yes" | "true" | "1" | "on" | "checked"
    )
}

/// Page handle paired with the descriptors surfaced on that page
#[derive(Debug, Clone)]
pub struct PageEntry<P> {
    pub page: P,
    pub fields: Vec<FieldDescriptor>,
}

/// Monotonic tag used to discard results of superseded loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}
