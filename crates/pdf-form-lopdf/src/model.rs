//! Mutable form model over a lopdf document

use lopdf::{Document, Object, ObjectId};
use pdf_form_overlay::{FormError, FormModel, ModelField};

use crate::acroform::{FieldNode, collect_fields, encode_text, value_to_string};
use crate::error::*;
use crate::metadata::model_kind;

pub struct LopdfFormModel {
    document: Document,
    fields: Vec<FieldNode>,
}

impl LopdfFormModel {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::from_document(Document::load_mem(bytes)?)
    }

    pub fn from_document(document: Document) -> Result<Self> {
        let fields = collect_fields(&document)?;
        log::debug!("Form model with {} terminal fields", fields.len());
        Ok(Self { document, fields })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Current `/V` of a field as text
    pub fn value(&self, name: &str) -> Option<String> {
        let node = self.node(name).ok()?;
        let dict = self.document.get_dictionary(node.id).ok()?;
        let value = dict.get(b"V").ok()?;
        let value = self.document.dereference(value).ok()?.1;
        value_to_string(value)
    }

    /// Serialize the document as it stands
    pub async fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut document = self.document.clone();
        let bytes = tokio::task::spawn_blocking(move || {
            let mut writer = Vec::new();
            document.save_to(&mut writer)?;
            Ok::<_, LopdfBackendError>(writer)
        })
        .await??;
        Ok(bytes)
    }

    fn node(&self, name: &str) -> Result<&FieldNode> {
        self.fields
            .iter()
            .rev()
            .find(|f| f.name == name)
            .ok_or_else(|| LopdfBackendError::Field(format!("No field named '{}'", name)))
    }

    fn expect_kind(
        &self,
        name: &str,
        check: fn(&FieldNode) -> bool,
        kind: &str,
    ) -> Result<FieldRef> {
        let node = self.node(name)?;
        if !check(node) {
            return Err(LopdfBackendError::Field(format!(
                "Field '{}' is not a {}",
                name, kind
            )));
        }
        Ok(FieldRef {
            id: node.id,
            widgets: node.widgets.iter().map(|w| w.id).collect(),
            on_state: node.on_state(),
        })
    }

    fn set_entry(&mut self, id: ObjectId, key: &str, value: Object) -> Result<()> {
        self.document.get_dictionary_mut(id)?.set(key, value);
        Ok(())
    }

    /// Ask viewers to regenerate appearance streams from the new values
    fn mark_need_appearances(&mut self) -> Result<()> {
        let root = self.document.trailer.get(b"Root")?.as_reference()?;
        let form_ref = self
            .document
            .get_dictionary(root)?
            .get(b"AcroForm")?
            .as_reference()
            .ok();
        let form = match form_ref {
            Some(id) => self.document.get_dictionary_mut(id)?,
            None => self
                .document
                .get_dictionary_mut(root)?
                .get_mut(b"AcroForm")?
                .as_dict_mut()?,
        };
        form.set("NeedAppearances", true);
        Ok(())
    }
}

/// Ids needed to write a field, detached from the model borrow
struct FieldRef {
    id: ObjectId,
    widgets: Vec<ObjectId>,
    on_state: Vec<u8>,
}

impl FormModel for LopdfFormModel {
    fn fields(&self) -> Vec<ModelField> {
        self.fields
            .iter()
            .filter_map(|node| {
                Some(ModelField {
                    name: node.name.clone(),
                    kind: model_kind(node)?,
                })
            })
            .collect()
    }

    fn set_text(&mut self, name: &str, value: &str) -> pdf_form_overlay::Result<()> {
        let field = self.expect_kind(name, FieldNode::is_text, "text field")?;
        self.set_entry(field.id, "V", encode_text(value))?;
        self.mark_need_appearances()?;
        Ok(())
    }

    fn set_checked(&mut self, name: &str, checked: bool) -> pdf_form_overlay::Result<()> {
        let field = self.expect_kind(name, FieldNode::is_checkbox, "checkbox")?;
        let state = if checked {
            field.on_state
        } else {
            b"Off".to_vec()
        };
        self.set_entry(field.id, "V", Object::Name(state.clone()))?;
        for widget in field.widgets {
            self.set_entry(widget, "AS", Object::Name(state.clone()))?;
        }
        self.mark_need_appearances()?;
        Ok(())
    }

    fn select(&mut self, name: &str, export_value: &str) -> pdf_form_overlay::Result<()> {
        let field = self.expect_kind(name, FieldNode::is_combo, "choice field")?;
        self.set_entry(field.id, "V", encode_text(export_value))?;
        self.mark_need_appearances()?;
        Ok(())
    }

    async fn save(&self) -> pdf_form_overlay::Result<Vec<u8>> {
        self.to_bytes().await.map_err(FormError::from)
    }
}
