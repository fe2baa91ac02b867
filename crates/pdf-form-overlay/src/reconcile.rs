//! Writing snapshot values into a form model

use crate::backend::{FormModel, ModelFieldKind};
use crate::types::{FieldValues, Result, parse_checked};

/// What an [`apply_values`] call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Fields whose value was written
    pub applied: Vec<String>,
    /// Fields with a value whose kind is left at its parsed default
    pub unsupported: Vec<String>,
}

/// Write `values` into `model` by field name.
///
/// Model fields missing from `values` keep their parsed default. Option
/// lists and radio groups are left untouched.
pub fn apply_values<M: FormModel>(model: &mut M, values: &FieldValues) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();
    for field in model.fields() {
        let Some(value) = values.get(&field.name) else {
            continue;
        };
        match field.kind {
            ModelFieldKind::Text => model.set_text(&field.name, value)?,
            ModelFieldKind::Checkbox => model.set_checked(&field.name, parse_checked(value))?,
            ModelFieldKind::Choice => model.select(&field.name, value)?,
            ModelFieldKind::OptionList | ModelFieldKind::RadioGroup => {
                log::debug!(
                    "Leaving {:?} field '{}' at its default",
                    field.kind,
                    field.name
                );
                report.unsupported.push(field.name);
                continue;
            }
        }
        report.applied.push(field.name);
    }
    Ok(report)
}
