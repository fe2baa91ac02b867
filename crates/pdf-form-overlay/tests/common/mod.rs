#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use pdf_form_overlay::*;

pub const LETTER: (f32, f32) = (612.0, 792.0);

/// Description of a fake document
#[derive(Clone, Default)]
pub struct DocSpec {
    pub pages: Vec<(f32, f32)>,
    pub metadata: FieldMetadata,
    /// Fields of the form model parsed from this document's bytes
    pub model: Vec<(ModelField, String)>,
    pub failing_pages: Vec<usize>,
}

pub struct Shared {
    pub name: String,
    pub spec: DocSpec,
    pub released: Cell<bool>,
}

pub struct FakeDocument {
    pub shared: Rc<Shared>,
}

pub struct FakePage {
    number: usize,
    shared: Rc<Shared>,
}

#[derive(Default)]
pub struct FakeBackend {
    pub docs: HashMap<String, DocSpec>,
    pub opened: RefCell<Vec<(String, WorkerLocator)>>,
}

impl FakeBackend {
    pub fn with_doc(mut self, name: &str, spec: DocSpec) -> Self {
        self.docs.insert(name.to_string(), spec);
        self
    }

    /// Open synchronously, bypassing the async contract
    pub fn open_now(&self, name: &str) -> Result<FakeDocument> {
        let spec = self
            .docs
            .get(name)
            .cloned()
            .ok_or_else(|| FormError::Load(format!("no such document: {name}")))?;
        Ok(FakeDocument {
            shared: Rc::new(Shared {
                name: name.to_string(),
                spec,
                released: Cell::new(false),
            }),
        })
    }
}

thread_local! {
    pub static RELEASED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

pub fn released_names() -> Vec<String> {
    RELEASED.with(|r| r.borrow().clone())
}

pub fn clear_released() {
    RELEASED.with(|r| r.borrow_mut().clear());
}

impl Backend for FakeBackend {
    type Document = FakeDocument;
    type Model = FakeModel;

    async fn open(&self, source: &Source, worker: &WorkerLocator) -> Result<FakeDocument> {
        let name = source
            .file_name()
            .ok_or_else(|| FormError::Load("unnamed source".to_string()))?;
        self.opened.borrow_mut().push((name.clone(), worker.clone()));
        self.open_now(&name)
    }

    async fn load_form(&self, bytes: &[u8]) -> Result<FakeModel> {
        let name = String::from_utf8_lossy(bytes).into_owned();
        let spec = self
            .docs
            .get(&name)
            .ok_or_else(|| FormError::FormModel(format!("unparseable bytes for {name}")))?;
        Ok(FakeModel {
            fields: spec.model.clone(),
        })
    }
}

impl DocumentHandle for FakeDocument {
    type Page = FakePage;

    fn page_count(&self) -> usize {
        self.shared.spec.pages.len()
    }

    async fn page(&self, number: usize) -> Result<FakePage> {
        if self.shared.released.get() {
            return Err(FormError::PageDestroyed(number));
        }
        if number == 0 || number > self.page_count() {
            return Err(FormError::PageUnavailable(number));
        }
        Ok(FakePage {
            number,
            shared: Rc::clone(&self.shared),
        })
    }

    async fn field_metadata(&self) -> Result<FieldMetadata> {
        if self.shared.released.get() {
            return Err(FormError::Load("document released".to_string()));
        }
        Ok(self.shared.spec.metadata.clone())
    }

    async fn bytes(&self) -> Result<Arc<[u8]>> {
        if self.shared.released.get() {
            return Err(FormError::Load("document released".to_string()));
        }
        Ok(Arc::from(self.shared.name.as_bytes()))
    }

    fn release(&self) {
        if !self.shared.released.replace(true) {
            RELEASED.with(|r| r.borrow_mut().push(self.shared.name.clone()));
        }
    }
}

impl PageHandle for FakePage {
    fn number(&self) -> usize {
        self.number
    }

    fn viewport(&self, scale: f32) -> Viewport {
        let (w, h) = self.shared.spec.pages[self.number - 1];
        Viewport::from_native(w, h, scale)
    }

    fn is_destroyed(&self) -> bool {
        self.shared.released.get()
    }

    async fn render(&self, surface: &mut RasterSurface, _viewport: &Viewport) -> Result<()> {
        if self.shared.spec.failing_pages.contains(&self.number) {
            return Err(FormError::Render(format!("page {} is broken", self.number)));
        }
        surface.fill([255, 255, 255, 255]);
        Ok(())
    }
}

pub struct FakeModel {
    pub fields: Vec<(ModelField, String)>,
}

impl FakeModel {
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(f, _)| f.name == name)
            .map(|(_, v)| v.as_str())
    }

    fn slot(&mut self, name: &str) -> Result<&mut String> {
        self.fields
            .iter_mut()
            .find(|(f, _)| f.name == name)
            .map(|(_, v)| v)
            .ok_or_else(|| FormError::FormModel(format!("no field {name}")))
    }
}

impl FormModel for FakeModel {
    fn fields(&self) -> Vec<ModelField> {
        self.fields.iter().map(|(f, _)| f.clone()).collect()
    }

    fn set_text(&mut self, name: &str, value: &str) -> Result<()> {
        *self.slot(name)? = value.to_string();
        Ok(())
    }

    fn set_checked(&mut self, name: &str, checked: bool) -> Result<()> {
        *self.slot(name)? = if checked { "On" } else { "Off" }.to_string();
        Ok(())
    }

    fn select(&mut self, name: &str, export_value: &str) -> Result<()> {
        *self.slot(name)? = export_value.to_string();
        Ok(())
    }

    async fn save(&self) -> Result<Vec<u8>> {
        let lines: Vec<String> = self
            .fields
            .iter()
            .map(|(f, v)| format!("{}={}", f.name, v))
            .collect();
        Ok(lines.join("\n").into_bytes())
    }
}

pub fn field(name: &str, kind: FieldKind, page_index: usize) -> FieldDescriptor {
    FieldDescriptor {
        name: name.to_string(),
        kind,
        page_index,
        rect: FieldRect::new(100.0, 600.0, 300.0, 620.0),
        editable: true,
        hidden: false,
        default_value: String::new(),
        items: Vec::new(),
    }
}

pub fn model_field(name: &str, kind: ModelFieldKind, value: &str) -> (ModelField, String) {
    (
        ModelField {
            name: name.to_string(),
            kind,
        },
        value.to_string(),
    )
}

/// Three letter pages; editable visible fields split 2/0/3, plus hidden and
/// read-only widgets that must never surface
pub fn three_page_spec() -> DocSpec {
    let mut first = field("first_name", FieldKind::Text, 0);
    first.rect = FieldRect::new(72.0, 700.0, 272.0, 720.0);
    let mut agree = field("agree", FieldKind::Checkbox, 0);
    agree.default_value = "Off".to_string();
    agree.rect = FieldRect::new(72.0, 650.0, 90.0, 668.0);

    let mut hidden = field("secret", FieldKind::Text, 0);
    hidden.hidden = true;
    hidden.rect = first.rect;
    let mut locked = field("locked", FieldKind::Text, 2);
    locked.editable = false;

    let mut status = field("status", FieldKind::Choice, 2);
    status.items = vec![
        ChoiceItem::new("pending", "Pending"),
        ChoiceItem::new("approved", "Approved"),
    ];
    let city = field("city", FieldKind::Text, 2);
    let zip = field("zip", FieldKind::Text, 2);

    let mut metadata = FieldMetadata::new();
    metadata.insert("a".to_string(), vec![first, hidden, agree]);
    metadata.insert("b".to_string(), vec![status, locked, city]);
    metadata.insert("c".to_string(), vec![zip]);

    DocSpec {
        pages: vec![LETTER, LETTER, LETTER],
        metadata,
        model: vec![
            model_field("first_name", ModelFieldKind::Text, ""),
            model_field("agree", ModelFieldKind::Checkbox, "Off"),
            model_field("status", ModelFieldKind::Choice, "pending"),
            model_field("city", ModelFieldKind::Text, "Springfield"),
            model_field("zip", ModelFieldKind::Text, ""),
            model_field("colors", ModelFieldKind::OptionList, "red"),
            model_field("size", ModelFieldKind::RadioGroup, "M"),
        ],
        failing_pages: Vec::new(),
    }
}

/// Drive a viewer through open and page load for `name`
pub async fn load(viewer: &mut FormViewer<FakeBackend>, backend: &FakeBackend, name: &str) {
    let request = viewer.set_source(Source::Path(name.into()));
    let opened = backend.open(&request.source, &request.worker).await;
    let document = viewer
        .document_opened(request.generation, opened)
        .expect("document should open");
    let pages = load_page_entries(document.as_ref()).await;
    assert!(viewer.pages_loaded(request.generation, pages));
}
