//! AcroForm field tree walking
//!
//! Fields form a tree under the catalog's `/AcroForm /Fields` array. Names
//! are qualified by their ancestors (`parent.child`) and `/FT`, `/Ff`, `/V`,
//! `/DV` are inherited from the nearest ancestor defining them. A terminal
//! field owns one or more widget annotations; a field without `/Kids` is its
//! own widget.

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use pdf_form_overlay::{ChoiceItem, FieldRect};

use crate::error::*;

// Field flags (/Ff), bit positions are 1-based in the PDF reference
pub const FF_READ_ONLY: u32 = 1;
pub const FF_RADIO: u32 = 1 << 15;
pub const FF_PUSHBUTTON: u32 = 1 << 16;
pub const FF_COMBO: u32 = 1 << 17;

// Annotation flags (/F)
pub const F_HIDDEN: u32 = 1 << 1;
pub const F_NO_VIEW: u32 = 1 << 5;

const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Button,
    Choice,
    Signature,
}

impl FieldType {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"Tx" => Some(FieldType::Text),
            b"Btn" => Some(FieldType::Button),
            b"Ch" => Some(FieldType::Choice),
            b"Sig" => Some(FieldType::Signature),
            _ => None,
        }
    }
}

/// A widget annotation of a terminal field
#[derive(Debug, Clone)]
pub struct Widget {
    pub id: ObjectId,
    pub rect: Option<FieldRect>,
    /// Annotation flags
    pub flags: u32,
    /// Page object from the widget's `/P` entry
    pub page: Option<ObjectId>,
    /// Appearance state name for "checked", from `/AP /N`
    pub on_state: Option<Vec<u8>>,
    /// Current appearance state (`/AS`)
    pub appearance_state: Option<Vec<u8>>,
}

/// A terminal field with its inherited attributes resolved
#[derive(Debug, Clone)]
pub struct FieldNode {
    pub id: ObjectId,
    pub name: String,
    /// Name of the root of this field's subtree
    pub top_level: String,
    pub field_type: Option<FieldType>,
    pub flags: u32,
    pub value: Option<Object>,
    pub default_value: Option<Object>,
    pub options: Vec<ChoiceItem>,
    pub widgets: Vec<Widget>,
}

impl FieldNode {
    pub fn is_read_only(&self) -> bool {
        self.flags & FF_READ_ONLY != 0
    }

    pub fn is_text(&self) -> bool {
        self.field_type == Some(FieldType::Text)
    }

    pub fn is_checkbox(&self) -> bool {
        self.field_type == Some(FieldType::Button)
            && self.flags & (FF_RADIO | FF_PUSHBUTTON) == 0
    }

    pub fn is_radio(&self) -> bool {
        self.field_type == Some(FieldType::Button)
            && self.flags & FF_RADIO != 0
            && self.flags & FF_PUSHBUTTON == 0
    }

    pub fn is_combo(&self) -> bool {
        self.field_type == Some(FieldType::Choice) && self.flags & FF_COMBO != 0
    }

    pub fn is_list_box(&self) -> bool {
        self.field_type == Some(FieldType::Choice) && self.flags & FF_COMBO == 0
    }

    /// Appearance name used when the checkbox is on
    pub fn on_state(&self) -> Vec<u8> {
        self.widgets
            .iter()
            .find_map(|w| w.on_state.clone())
            .unwrap_or_else(|| b"Yes".to_vec())
    }

    /// `/V` if set, else `/DV`
    pub fn effective_value(&self) -> Option<&Object> {
        self.value.as_ref().or(self.default_value.as_ref())
    }

    /// Checkbox state: the value names a non-Off state, or with no value at
    /// all, a widget shows its on appearance
    pub fn is_checked(&self) -> bool {
        match self.effective_value() {
            Some(Object::Name(name)) => name.as_slice() != b"Off",
            Some(_) => false,
            None => self.widgets.iter().any(|w| {
                w.appearance_state
                    .as_deref()
                    .is_some_and(|state| state != b"Off")
            }),
        }
    }

    /// Text form of the effective value
    pub fn value_text(&self) -> String {
        self.effective_value()
            .and_then(value_to_string)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
struct Inherited {
    name: String,
    top_level: Option<String>,
    field_type: Option<FieldType>,
    flags: u32,
    value: Option<Object>,
    default_value: Option<Object>,
    options: Vec<ChoiceItem>,
}

/// Resolve a possibly indirect object
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    Ok(doc.dereference(obj)?.1)
}

/// The interactive form dictionary, if the document has one
pub fn acro_form(doc: &Document) -> Result<Option<&Dictionary>> {
    let catalog = doc.catalog()?;
    match catalog.get(b"AcroForm") {
        Ok(obj) => Ok(Some(resolve(doc, obj)?.as_dict()?)),
        Err(_) => Ok(None),
    }
}

/// Every terminal field of the document in tree order
pub fn collect_fields(doc: &Document) -> Result<Vec<FieldNode>> {
    let Some(form) = acro_form(doc)? else {
        log::debug!("Document has no AcroForm");
        return Ok(Vec::new());
    };
    let Ok(roots) = form
        .get(b"Fields")
        .and_then(|obj| doc.dereference(obj))
        .and_then(|(_, obj)| obj.as_array())
    else {
        return Ok(Vec::new());
    };

    let mut fields = Vec::new();
    let mut visited = HashSet::new();
    for root in roots {
        match root.as_reference() {
            Ok(id) => walk(doc, id, &Inherited::default(), 0, &mut visited, &mut fields),
            Err(_) => log::debug!("Skipping inline field dictionary"),
        }
    }
    Ok(fields)
}

fn walk(
    doc: &Document,
    id: ObjectId,
    parent: &Inherited,
    depth: usize,
    visited: &mut HashSet<ObjectId>,
    out: &mut Vec<FieldNode>,
) {
    if depth > MAX_DEPTH || !visited.insert(id) {
        log::warn!("Field tree cycle or excessive depth at {:?}", id);
        return;
    }
    let dict = match doc.get_dictionary(id) {
        Ok(dict) => dict,
        Err(e) => {
            log::warn!("Skipping unreadable field {:?}: {}", id, e);
            return;
        }
    };

    let mut state = parent.clone();
    if let Some(partial) = text_entry(doc, dict, b"T") {
        state.name = if state.name.is_empty() {
            partial
        } else {
            format!("{}.{}", state.name, partial)
        };
        if state.top_level.is_none() {
            state.top_level = Some(state.name.clone());
        }
    }
    if let Some(ft) = name_entry(doc, dict, b"FT").and_then(|n| FieldType::from_name(&n)) {
        state.field_type = Some(ft);
    }
    if let Some(ff) = int_entry(doc, dict, b"Ff") {
        state.flags = ff as u32;
    }
    if let Some(v) = owned_entry(doc, dict, b"V") {
        state.value = Some(v);
    }
    if let Some(dv) = owned_entry(doc, dict, b"DV") {
        state.default_value = Some(dv);
    }
    if let Ok(opt) = dict.get(b"Opt") {
        state.options = parse_options(doc, opt);
    }

    let kids: Vec<ObjectId> = dict
        .get(b"Kids")
        .and_then(|obj| doc.dereference(obj))
        .and_then(|(_, obj)| obj.as_array())
        .map(|kids| kids.iter().filter_map(|k| k.as_reference().ok()).collect())
        .unwrap_or_default();

    let mut widgets = Vec::new();
    if kids.is_empty() {
        widgets.push(read_widget(doc, id, dict));
    } else {
        for kid in kids {
            match doc.get_dictionary(kid) {
                Ok(kid_dict) if kid_dict.has(b"T") => {
                    walk(doc, kid, &state, depth + 1, visited, out)
                }
                Ok(kid_dict) => widgets.push(read_widget(doc, kid, kid_dict)),
                Err(e) => log::warn!("Skipping unreadable kid {:?}: {}", kid, e),
            }
        }
    }

    if widgets.is_empty() || state.name.is_empty() {
        return;
    }
    out.push(FieldNode {
        id,
        top_level: state.top_level.clone().unwrap_or_else(|| state.name.clone()),
        name: state.name,
        field_type: state.field_type,
        flags: state.flags,
        value: state.value,
        default_value: state.default_value,
        options: state.options,
        widgets,
    });
}

fn read_widget(doc: &Document, id: ObjectId, dict: &Dictionary) -> Widget {
    Widget {
        id,
        rect: rect_entry(doc, dict, b"Rect"),
        flags: int_entry(doc, dict, b"F").unwrap_or(0) as u32,
        page: dict.get(b"P").and_then(Object::as_reference).ok(),
        on_state: on_state(doc, dict),
        appearance_state: name_entry(doc, dict, b"AS"),
    }
}

/// First `/AP /N` state other than `/Off`
fn on_state(doc: &Document, dict: &Dictionary) -> Option<Vec<u8>> {
    let ap = resolve(doc, dict.get(b"AP").ok()?).ok()?.as_dict().ok()?;
    let normal = resolve(doc, ap.get(b"N").ok()?).ok()?.as_dict().ok()?;
    normal
        .iter()
        .map(|(key, _)| key)
        .find(|key| key.as_slice() != b"Off")
        .cloned()
}

fn parse_options(doc: &Document, opt: &Object) -> Vec<ChoiceItem> {
    let Some(entries) = resolve(doc, opt).ok().and_then(|o| o.as_array().ok()) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match resolve(doc, entry).ok()? {
            Object::Array(pair) if pair.len() >= 2 => {
                let export = value_to_string(resolve(doc, &pair[0]).ok()?)?;
                let display = value_to_string(resolve(doc, &pair[1]).ok()?)?;
                Some(ChoiceItem::new(export, display))
            }
            other => {
                let text = value_to_string(other)?;
                Some(ChoiceItem::new(text.clone(), text))
            }
        })
        .collect()
}

fn text_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    let obj = resolve(doc, dict.get(key).ok()?).ok()?;
    obj.as_str().ok().map(decode_text)
}

fn name_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<Vec<u8>> {
    let obj = resolve(doc, dict.get(key).ok()?).ok()?;
    obj.as_name().ok().map(<[u8]>::to_vec)
}

fn int_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    resolve(doc, dict.get(key).ok()?).ok()?.as_i64().ok()
}

fn owned_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<Object> {
    resolve(doc, dict.get(key).ok()?).ok().cloned()
}

/// A rectangle entry, normalized so that left <= right and bottom <= top
pub fn rect_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<FieldRect> {
    let array = resolve(doc, dict.get(key).ok()?).ok()?.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut n = [0.0f32; 4];
    for (slot, obj) in n.iter_mut().zip(array) {
        *slot = resolve(doc, obj).ok()?.as_float().ok()?;
    }
    Some(FieldRect::new(
        n[0].min(n[2]),
        n[1].min(n[3]),
        n[0].max(n[2]),
        n[1].max(n[3]),
    ))
}

/// Text of a name, string or (first element of an) array value
pub fn value_to_string(obj: &Object) -> Option<String> {
    match obj {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        Object::String(bytes, _) => Some(decode_text(bytes)),
        Object::Array(items) => items.first().and_then(value_to_string),
        Object::Integer(i) => Some(i.to_string()),
        Object::Real(r) => Some(r.to_string()),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE or UTF-8 with a byte order mark,
/// else PDFDocEncoding (read as Latin-1)
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode a text string: literal when ASCII, else UTF-16BE with a BOM
pub fn encode_text(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}
