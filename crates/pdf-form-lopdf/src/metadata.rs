//! Page geometry and field descriptors

use std::collections::HashMap;

use lopdf::{Document, ObjectId};
use pdf_form_overlay::{
    CHECKBOX_OFF, CHECKBOX_ON, FieldDescriptor, FieldKind, FieldMetadata, FieldRect,
    ModelFieldKind,
};

use crate::acroform::{F_HIDDEN, F_NO_VIEW, FieldNode, FieldType, rect_entry, resolve};

/// US Letter, used when a page has no readable MediaBox
pub const DEFAULT_MEDIA_BOX: FieldRect = FieldRect {
    left: 0.0,
    bottom: 0.0,
    right: 612.0,
    top: 792.0,
};

const MAX_INHERIT_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub id: ObjectId,
    pub media_box: FieldRect,
    /// Visible region: the CropBox clipped to the MediaBox. Rendering and
    /// overlay placement both measure from this box.
    pub crop_box: FieldRect,
}

impl PageGeometry {
    pub fn width(&self) -> f32 {
        self.crop_box.width()
    }

    pub fn height(&self) -> f32 {
        self.crop_box.height()
    }
}

/// Geometry of every page in page order
pub fn page_geometry(doc: &Document) -> Vec<PageGeometry> {
    doc.get_pages()
        .into_values()
        .map(|id| {
            let media_box = inherited_box(doc, id, b"MediaBox").unwrap_or(DEFAULT_MEDIA_BOX);
            let crop_box = inherited_box(doc, id, b"CropBox")
                .and_then(|crop| intersect(&crop, &media_box))
                .unwrap_or(media_box);
            PageGeometry {
                id,
                media_box,
                crop_box,
            }
        })
        .collect()
}

/// A page box, inherited through the page tree
fn inherited_box(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<FieldRect> {
    let mut current = page_id;
    for _ in 0..MAX_INHERIT_DEPTH {
        let dict = doc.get_dictionary(current).ok()?;
        if let Some(rect) = rect_entry(doc, dict, key) {
            return Some(rect);
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

/// Overlap of two boxes, `None` when it is empty
fn intersect(a: &FieldRect, b: &FieldRect) -> Option<FieldRect> {
    let rect = FieldRect::new(
        a.left.max(b.left),
        a.bottom.max(b.bottom),
        a.right.min(b.right),
        a.top.min(b.top),
    );
    (rect.width() > 0.0 && rect.height() > 0.0).then_some(rect)
}

/// Widget annotation id -> 0-based page index, from the pages' `/Annots`
fn annotation_pages(doc: &Document, pages: &[PageGeometry]) -> HashMap<ObjectId, usize> {
    let mut map = HashMap::new();
    for (index, page) in pages.iter().enumerate() {
        let Some(annots) = doc
            .get_dictionary(page.id)
            .ok()
            .and_then(|dict| dict.get(b"Annots").ok())
            .and_then(|obj| resolve(doc, obj).ok())
            .and_then(|obj| obj.as_array().ok())
        else {
            continue;
        };
        for annot in annots {
            if let Ok(id) = annot.as_reference() {
                map.entry(id).or_insert(index);
            }
        }
    }
    map
}

/// Overlay kind for a field, `None` for kinds that are never surfaced
pub fn descriptor_kind(node: &FieldNode) -> Option<FieldKind> {
    match node.field_type? {
        FieldType::Text => Some(FieldKind::Text),
        FieldType::Button if node.is_checkbox() => Some(FieldKind::Checkbox),
        FieldType::Choice if node.is_combo() => Some(FieldKind::Choice),
        _ => None,
    }
}

/// Form model kind for a field, `None` for push buttons and signatures
pub fn model_kind(node: &FieldNode) -> Option<ModelFieldKind> {
    match node.field_type? {
        FieldType::Text => Some(ModelFieldKind::Text),
        FieldType::Button if node.is_checkbox() => Some(ModelFieldKind::Checkbox),
        FieldType::Button if node.is_radio() => Some(ModelFieldKind::RadioGroup),
        FieldType::Choice if node.is_combo() => Some(ModelFieldKind::Choice),
        FieldType::Choice => Some(ModelFieldKind::OptionList),
        FieldType::Button | FieldType::Signature => None,
    }
}

/// One descriptor per widget of every surfaceable field, grouped by the
/// top-level field name
pub fn build_metadata(doc: &Document, fields: &[FieldNode], pages: &[PageGeometry]) -> FieldMetadata {
    let page_index: HashMap<ObjectId, usize> = pages
        .iter()
        .enumerate()
        .map(|(index, page)| (page.id, index))
        .collect();
    let annots = annotation_pages(doc, pages);

    let mut metadata = FieldMetadata::new();
    for node in fields {
        let Some(kind) = descriptor_kind(node) else {
            log::debug!("Not surfacing field '{}' ({:?})", node.name, node.field_type);
            continue;
        };
        let default_value = match kind {
            FieldKind::Checkbox if node.is_checked() => CHECKBOX_ON.to_string(),
            FieldKind::Checkbox => CHECKBOX_OFF.to_string(),
            FieldKind::Text | FieldKind::Choice => node.value_text(),
        };

        for widget in &node.widgets {
            let index = widget
                .page
                .and_then(|p| page_index.get(&p))
                .or_else(|| annots.get(&widget.id))
                .copied();
            let (Some(index), Some(rect)) = (index, widget.rect) else {
                log::debug!("Widget of '{}' has no page or rect", node.name);
                continue;
            };
            let origin = pages[index].crop_box;
            metadata
                .entry(node.top_level.clone())
                .or_default()
                .push(FieldDescriptor {
                    name: node.name.clone(),
                    kind,
                    page_index: index,
                    rect: FieldRect::new(
                        rect.left - origin.left,
                        rect.bottom - origin.bottom,
                        rect.right - origin.left,
                        rect.top - origin.bottom,
                    ),
                    editable: !node.is_read_only(),
                    hidden: widget.flags & (F_HIDDEN | F_NO_VIEW) != 0,
                    default_value: default_value.clone(),
                    items: node.options.clone(),
                });
        }
    }
    metadata
}
