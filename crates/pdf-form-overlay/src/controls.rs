//! Live overlay controls
//!
//! Every surfaced field gets one control. UI layers write user edits through
//! the store, and snapshots read the store instead of the presentation layer.

use crate::geometry::OverlayRect;
use crate::types::{
    CHECKBOX_OFF, CHECKBOX_ON, ChoiceItem, FieldDescriptor, FieldKind, FieldValues, FormError,
    Result, parse_checked,
};

/// Identifies a control by page and its slot in that page's field list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlId {
    pub page_number: usize,
    pub slot: usize,
}

/// Current state of a control
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlValue {
    Text(String),
    Checkbox(bool),
    /// Export value of the selected item
    Choice(Option<String>),
}

impl ControlValue {
    /// Value as written into a snapshot
    pub fn as_snapshot(&self) -> String {
        match self {
            ControlValue::Text(text) => text.clone(),
            ControlValue::Checkbox(true) => CHECKBOX_ON.to_string(),
            ControlValue::Checkbox(false) => CHECKBOX_OFF.to_string(),
            ControlValue::Choice(selected) => selected.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LiveControl {
    pub id: ControlId,
    pub name: String,
    pub kind: FieldKind,
    pub value: ControlValue,
    pub items: Vec<ChoiceItem>,
    /// Set by the most recent render pass
    pub placement: Option<OverlayRect>,
}

impl LiveControl {
    /// Build a control initialised from the descriptor's default value
    pub fn from_descriptor(id: ControlId, descriptor: &FieldDescriptor) -> Self {
        let value = match descriptor.kind {
            FieldKind::Text => ControlValue::Text(descriptor.default_value.clone()),
            FieldKind::Checkbox => ControlValue::Checkbox(parse_checked(&descriptor.default_value)),
            FieldKind::Choice => {
                ControlValue::Choice(initial_choice(&descriptor.default_value, &descriptor.items))
            }
        };
        Self {
            id,
            name: descriptor.name.clone(),
            kind: descriptor.kind,
            value,
            items: descriptor.items.clone(),
            placement: None,
        }
    }
}

/// Like a native select box: the default if it names an item, else the
/// first item
fn initial_choice(default: &str, items: &[ChoiceItem]) -> Option<String> {
    items
        .iter()
        .find(|item| item.export_value == default)
        .or_else(|| items.iter().find(|item| item.display_value == default))
        .or_else(|| items.first())
        .map(|item| item.export_value.clone())
        .or_else(|| (!default.is_empty()).then(|| default.to_string()))
}

#[derive(Debug, Clone, Default)]
pub struct ControlStore {
    controls: Vec<LiveControl>,
}

impl ControlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every control with fresh ones for the given pages
    pub fn rebuild<'a>(
        &mut self,
        pages: impl IntoIterator<Item = (usize, &'a [FieldDescriptor])>,
    ) {
        self.controls.clear();
        for (page_number, fields) in pages {
            for (slot, descriptor) in fields.iter().enumerate() {
                let id = ControlId { page_number, slot };
                self.controls
                    .push(LiveControl::from_descriptor(id, descriptor));
            }
        }
    }

    pub fn clear(&mut self) {
        self.controls.clear();
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LiveControl> {
        self.controls.iter()
    }

    pub fn get(&self, id: ControlId) -> Option<&LiveControl> {
        self.controls.iter().find(|c| c.id == id)
    }

    pub fn on_page(&self, page_number: usize) -> impl Iterator<Item = &LiveControl> {
        self.controls
            .iter()
            .filter(move |c| c.id.page_number == page_number)
    }

    /// Move the control in `id`'s slot if it still carries `name`. Returns
    /// false, without error, when no such control is live.
    pub fn place(&mut self, id: ControlId, name: &str, placement: OverlayRect) -> bool {
        match self
            .controls
            .iter_mut()
            .find(|c| c.id == id && c.name == name)
        {
            Some(control) => {
                control.placement = Some(placement);
                true
            }
            None => false,
        }
    }

    pub fn set_text(&mut self, id: ControlId, text: impl Into<String>) -> Result<()> {
        let control = self.get_mut(id)?;
        match &mut control.value {
            ControlValue::Text(value) => {
                *value = text.into();
                Ok(())
            }
            _ => Err(kind_mismatch(control, "text")),
        }
    }

    pub fn set_checked(&mut self, id: ControlId, checked: bool) -> Result<()> {
        let control = self.get_mut(id)?;
        match &mut control.value {
            ControlValue::Checkbox(value) => {
                *value = checked;
                Ok(())
            }
            _ => Err(kind_mismatch(control, "checkbox")),
        }
    }

    /// Select a choice item by export value
    pub fn select(&mut self, id: ControlId, export_value: &str) -> Result<()> {
        let control = self.get_mut(id)?;
        if !control.items.is_empty()
            && !control.items.iter().any(|i| i.export_value == export_value)
        {
            return Err(FormError::FormModel(format!(
                "'{}' is not an option of field '{}'",
                export_value, control.name
            )));
        }
        match &mut control.value {
            ControlValue::Choice(value) => {
                *value = Some(export_value.to_string());
                Ok(())
            }
            _ => Err(kind_mismatch(control, "choice")),
        }
    }

    /// Fold every control into a name → value map. Later controls with the
    /// same name overwrite earlier ones.
    pub fn snapshot(&self) -> FieldValues {
        let mut values = FieldValues::new();
        for control in &self.controls {
            values.insert(control.name.clone(), control.value.as_snapshot());
        }
        values
    }

    fn get_mut(&mut self, id: ControlId) -> Result<&mut LiveControl> {
        self.controls
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| {
                FormError::FormModel(format!(
                    "No control in slot {} of page {}",
                    id.slot, id.page_number
                ))
            })
    }
}

fn kind_mismatch(control: &LiveControl, expected: &str) -> FormError {
    FormError::FormModel(format!(
        "Field '{}' is a {:?} control, not {}",
        control.name, control.kind, expected
    ))
}
