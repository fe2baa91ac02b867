mod common;

use common::*;
use pdf_form_overlay::*;
use std::cell::RefCell;
use std::rc::Rc;

fn viewer() -> FormViewer<FakeBackend> {
    FormViewer::new(ViewerOptions::default()).unwrap()
}

#[tokio::test]
async fn test_page_entries_follow_metadata_order() {
    let backend = FakeBackend::default().with_doc("form.pdf", three_page_spec());
    let mut viewer = viewer();
    load(&mut viewer, &backend, "form.pdf").await;

    assert_eq!(viewer.state(), &ViewerState::PagesReady);
    let counts: Vec<usize> = viewer
        .page_entries()
        .iter()
        .map(|e| e.fields.len())
        .collect();
    assert_eq!(counts, vec![2, 0, 3]);

    let names: Vec<Vec<&str>> = viewer
        .page_entries()
        .iter()
        .map(|e| e.fields.iter().map(|f| f.name.as_str()).collect())
        .collect();
    assert_eq!(names[0], vec!["first_name", "agree"]);
    assert_eq!(names[2], vec!["status", "city", "zip"]);
}

#[tokio::test]
async fn test_hidden_and_read_only_fields_never_surface() {
    let backend = FakeBackend::default().with_doc("form.pdf", three_page_spec());
    let mut viewer = viewer();
    load(&mut viewer, &backend, "form.pdf").await;

    for entry in viewer.page_entries() {
        for field in &entry.fields {
            assert!(field.editable && !field.hidden, "{} surfaced", field.name);
        }
    }
    let values = viewer.form_fields();
    assert!(!values.contains_key("secret"));
    assert!(!values.contains_key("locked"));
}

#[tokio::test]
async fn test_render_places_overlays_at_current_scale() {
    let backend = FakeBackend::default().with_doc("form.pdf", three_page_spec());
    let mut viewer = viewer();
    load(&mut viewer, &backend, "form.pdf").await;

    let report = viewer.render().await.unwrap();
    assert_eq!(report.rendered, vec![1, 2, 3]);
    assert_eq!(viewer.max_native_page_width(), Some(612.0));

    let first = viewer.overlays(1)[0].placement.unwrap();
    assert_eq!(first.left, 72.0);
    assert_eq!(first.top, 792.0 - 720.0);
    assert_eq!(first.width, 200.0);
    assert_eq!(first.height, 20.0);

    assert!(viewer.zoom_in());
    assert_eq!(viewer.zoom().scale(), 1.1);
    viewer.render().await.unwrap();
    let zoomed = viewer.overlays(1)[0].placement.unwrap();
    let viewport_height = 792.0 * 1.1;
    assert!((zoomed.top - (viewport_height - 720.0 * 1.1)).abs() < 1e-3);
    assert!((zoomed.width - 220.0).abs() < 1e-3);

    let surface = viewer.surface(1).unwrap();
    assert!((surface.css_width - 612.0 * 1.1).abs() < 1e-3);
}

#[tokio::test]
async fn test_widgets_sharing_a_name_keep_their_own_rects() {
    let mut top = field("date", FieldKind::Text, 0);
    top.rect = FieldRect::new(72.0, 700.0, 272.0, 720.0);
    let mut bottom = field("date", FieldKind::Text, 0);
    bottom.rect = FieldRect::new(72.0, 100.0, 272.0, 120.0);
    let mut metadata = FieldMetadata::new();
    metadata.insert("date".to_string(), vec![top, bottom]);
    let spec = DocSpec {
        pages: vec![LETTER],
        metadata,
        ..Default::default()
    };

    let backend = FakeBackend::default().with_doc("form.pdf", spec);
    let mut viewer = viewer();
    load(&mut viewer, &backend, "form.pdf").await;
    viewer.render().await.unwrap();

    let tops: Vec<f32> = viewer
        .overlays(1)
        .iter()
        .map(|c| c.placement.unwrap().top)
        .collect();
    assert_eq!(tops, vec![72.0, 672.0]);
}

#[tokio::test]
async fn test_device_pixel_ratio_sizes_raster() {
    let backend = FakeBackend::default().with_doc("form.pdf", three_page_spec());
    let options = ViewerOptions {
        device_pixel_ratio: 2.0,
        ..Default::default()
    };
    let mut viewer = FormViewer::new(options).unwrap();
    load(&mut viewer, &backend, "form.pdf").await;
    viewer.render().await.unwrap();

    let surface = viewer.surface(2).unwrap();
    assert_eq!(surface.css_width, 612.0);
    assert_eq!(surface.pixel_width, 1224);
    assert_eq!(surface.pixel_height, 1584);
}

#[tokio::test]
async fn test_resize_snaps_to_nearest_level() {
    let backend = FakeBackend::default().with_doc("form.pdf", three_page_spec());
    let mut viewer = viewer();
    load(&mut viewer, &backend, "form.pdf").await;

    // Nothing measured before the first render pass
    assert!(!viewer.resize(1224.0));

    viewer.render().await.unwrap();
    assert!(viewer.resize(612.0 * 1.3));
    assert_eq!(viewer.zoom().scale(), 1.25);

    // Same target again: no change, no render due
    assert!(!viewer.resize(612.0 * 1.3));
}

#[tokio::test]
async fn test_widest_page_measured_once_per_load() {
    let mut spec = three_page_spec();
    spec.pages = vec![(500.0, 700.0), (800.0, 600.0), (612.0, 792.0)];
    let backend = FakeBackend::default().with_doc("mixed.pdf", spec);
    let mut viewer = viewer();
    load(&mut viewer, &backend, "mixed.pdf").await;

    viewer.render().await.unwrap();
    assert_eq!(viewer.max_native_page_width(), Some(800.0));
    viewer.zoom_in();
    viewer.render().await.unwrap();
    assert_eq!(viewer.max_native_page_width(), Some(800.0));
}

#[tokio::test]
async fn test_zoom_requires_loaded_pages() {
    let mut viewer = viewer();
    assert!(!viewer.zoom_in());
    assert!(!viewer.zoom_out());
    assert_eq!(viewer.zoom().scale(), 1.0);
    assert!(matches!(
        viewer.render().await,
        Err(FormError::NotReady(_))
    ));
}

#[tokio::test]
async fn test_stale_document_is_released_and_ignored() {
    clear_released();
    let backend = FakeBackend::default()
        .with_doc("old.pdf", three_page_spec())
        .with_doc("new.pdf", DocSpec {
            pages: vec![LETTER],
            ..Default::default()
        });
    let mut viewer = viewer();

    let old_request = viewer.set_source(Source::Path("old.pdf".into()));
    let new_request = viewer.set_source(Source::Path("new.pdf".into()));
    assert!(new_request.generation > old_request.generation);

    // Newer load resolves first
    let new_doc = backend.open(&new_request.source, &new_request.worker).await;
    let document = viewer
        .document_opened(new_request.generation, new_doc)
        .unwrap();
    let pages = load_page_entries(document.as_ref()).await;
    assert!(viewer.pages_loaded(new_request.generation, pages));

    // The superseded load arrives late
    let old_doc = backend.open(&old_request.source, &old_request.worker).await;
    assert!(viewer.document_opened(old_request.generation, old_doc).is_none());

    assert_eq!(released_names(), vec!["old.pdf".to_string()]);
    assert_eq!(viewer.state(), &ViewerState::PagesReady);
    assert_eq!(viewer.page_count(), 1);
    assert!(viewer.form_fields().is_empty());
}

#[tokio::test]
async fn test_stale_pages_are_discarded() {
    clear_released();
    let backend = FakeBackend::default()
        .with_doc("old.pdf", three_page_spec())
        .with_doc("new.pdf", DocSpec {
            pages: vec![LETTER, LETTER],
            ..Default::default()
        });
    let mut viewer = viewer();

    let old_request = viewer.set_source(Source::Path("old.pdf".into()));
    let old_doc = backend.open(&old_request.source, &old_request.worker).await;
    let old_document = viewer
        .document_opened(old_request.generation, old_doc)
        .unwrap();
    let old_pages = load_page_entries(old_document.as_ref()).await;

    // Source changes while the old pages are still in flight
    let new_request = viewer.set_source(Source::Path("new.pdf".into()));
    assert_eq!(released_names(), vec!["old.pdf".to_string()]);
    assert!(!viewer.pages_loaded(old_request.generation, old_pages));
    assert_eq!(viewer.state(), &ViewerState::DocumentLoading);

    let new_doc = backend.open(&new_request.source, &new_request.worker).await;
    let document = viewer
        .document_opened(new_request.generation, new_doc)
        .unwrap();
    let pages = load_page_entries(document.as_ref()).await;
    assert!(viewer.pages_loaded(new_request.generation, pages));
    assert_eq!(viewer.page_count(), 2);
}

#[tokio::test]
async fn test_destroyed_pages_are_skipped() {
    let backend = FakeBackend::default().with_doc("form.pdf", three_page_spec());
    let mut viewer = viewer();
    let request = viewer.set_source(Source::Path("form.pdf".into()));
    let opened = backend.open(&request.source, &request.worker).await;
    let document = viewer.document_opened(request.generation, opened).unwrap();
    let pages = load_page_entries(document.as_ref()).await;
    assert!(viewer.pages_loaded(request.generation, pages));

    // Teardown races the render pass: the handles outlive their document
    document.release();

    let report = viewer.render().await.unwrap();
    assert!(report.rendered.is_empty());
    assert_eq!(report.skipped_destroyed, vec![1, 2, 3]);
    assert!(report.failed.is_empty());
    assert_eq!(viewer.max_native_page_width(), None);
    assert!(viewer.surface(1).is_none());
    assert!(viewer.overlays(1).iter().all(|c| c.placement.is_none()));
}

#[tokio::test]
async fn test_close_returns_to_idle() {
    clear_released();
    let backend = FakeBackend::default().with_doc("form.pdf", three_page_spec());
    let mut viewer = viewer();
    load(&mut viewer, &backend, "form.pdf").await;

    viewer.close();
    assert_eq!(viewer.state(), &ViewerState::Idle);
    assert_eq!(viewer.page_count(), 0);
    assert!(viewer.controls().is_empty());
    assert_eq!(released_names(), vec!["form.pdf".to_string()]);
    assert!(matches!(viewer.render().await, Err(FormError::NotReady(_))));
}

#[tokio::test]
async fn test_render_failure_does_not_stop_other_pages() {
    let mut spec = three_page_spec();
    spec.failing_pages = vec![3];
    let backend = FakeBackend::default().with_doc("form.pdf", spec);
    let mut viewer = viewer();
    load(&mut viewer, &backend, "form.pdf").await;

    let report = viewer.render().await.unwrap();
    assert_eq!(report.rendered, vec![1, 2]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 3);
    assert!(viewer.overlays(1).iter().all(|c| c.placement.is_some()));

    // The failed page still carries its controls over blank paper
    assert!(viewer.overlays(3).iter().all(|c| c.placement.is_some()));
    let surface = viewer.surface(3).unwrap();
    assert!(!surface.is_empty());
    assert!(surface.rgba.chunks_exact(4).all(|px| px == PAPER));
}

#[tokio::test]
async fn test_load_failure_leaves_viewer_not_ready() {
    let backend = FakeBackend::default();
    let mut viewer = viewer();
    let request = viewer.set_source(Source::Path("missing.pdf".into()));
    let result = backend.open(&request.source, &request.worker).await;
    assert!(viewer.document_opened(request.generation, result).is_none());
    assert!(matches!(viewer.state(), ViewerState::Failed(_)));
    assert!(!viewer.is_ready());
    assert!(matches!(viewer.begin_save(), Err(FormError::NotReady(_))));
}

#[tokio::test]
async fn test_worker_locator_passed_to_backend() {
    let backend = FakeBackend::default().with_doc("form.pdf", three_page_spec());
    let options = ViewerOptions {
        worker_src: Some("/opt/pdfium/lib".into()),
        ..Default::default()
    };
    let mut viewer = FormViewer::new(options).unwrap();
    load(&mut viewer, &backend, "form.pdf").await;

    let opened = backend.opened.borrow();
    assert_eq!(opened.len(), 1);
    assert_eq!(
        opened[0].1,
        WorkerLocator::new(Some("/opt/pdfium/lib".into()))
    );
}

#[tokio::test]
async fn test_snapshot_reflects_control_edits() {
    let backend = FakeBackend::default().with_doc("form.pdf", three_page_spec());
    let mut viewer = viewer();
    load(&mut viewer, &backend, "form.pdf").await;

    let name_id = viewer.overlays(1)[0].id;
    let agree_id = viewer.overlays(1)[1].id;
    let status_id = viewer.overlays(3)[0].id;
    viewer.controls_mut().set_text(name_id, "Alice").unwrap();
    viewer.controls_mut().set_checked(agree_id, true).unwrap();
    viewer.controls_mut().select(status_id, "approved").unwrap();

    let values = viewer.form_fields();
    assert_eq!(values["first_name"], "Alice");
    assert_eq!(values["agree"], "On");
    assert_eq!(values["status"], "approved");
    assert_eq!(values["zip"], "");
}

#[tokio::test]
async fn test_save_applies_snapshot_to_fresh_model() {
    let backend = FakeBackend::default().with_doc("form.pdf", three_page_spec());
    let mut viewer = viewer();
    load(&mut viewer, &backend, "form.pdf").await;

    let name_id = viewer.overlays(1)[0].id;
    viewer.controls_mut().set_text(name_id, "Alice").unwrap();

    let received: Rc<RefCell<Option<(Vec<u8>, FieldValues)>>> = Rc::new(RefCell::new(None));
    let sink = {
        let received = Rc::clone(&received);
        CallbackSink::new(move |bytes: Vec<u8>, values: FieldValues| {
            *received.borrow_mut() = Some((bytes, values));
            Ok(())
        })
    };

    let outcome = viewer.save(&backend, &sink).await.unwrap();
    assert_eq!(
        outcome,
        SaveOutcome::Delivered {
            file_name: "form.pdf".to_string(),
            destination: SaveDestination::Callback,
        }
    );
    assert!(!viewer.is_saving());

    let (bytes, values) = received.borrow_mut().take().unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("first_name=Alice"));
    assert!(text.contains("status=pending"));
    // Unsupported kinds keep their parsed defaults
    assert!(text.contains("colors=red"));
    assert!(text.contains("size=M"));
    assert_eq!(values["first_name"], "Alice");
}

#[tokio::test]
async fn test_second_save_rejected_while_saving() {
    let backend = FakeBackend::default().with_doc("form.pdf", three_page_spec());
    let mut viewer = viewer();
    load(&mut viewer, &backend, "form.pdf").await;

    let calls = Rc::new(RefCell::new(0));
    let sink = {
        let calls = Rc::clone(&calls);
        CallbackSink::new(move |_bytes: Vec<u8>, _values: FieldValues| {
            *calls.borrow_mut() += 1;
            Ok(())
        })
    };

    let job = viewer.begin_save().unwrap();
    assert!(viewer.is_saving());
    assert!(matches!(viewer.begin_save(), Err(FormError::SaveInProgress)));

    let outcome = job.run(&backend, &sink).await;
    viewer.finish_save(&outcome);
    assert_eq!(*calls.borrow(), 1);
    assert!(!viewer.is_saving());
    assert!(viewer.begin_save().is_ok());
}

#[tokio::test]
async fn test_save_failure_keeps_values_and_allows_retry() {
    let backend = FakeBackend::default().with_doc("form.pdf", three_page_spec());
    let mut viewer = viewer();
    load(&mut viewer, &backend, "form.pdf").await;

    let name_id = viewer.overlays(1)[0].id;
    viewer.controls_mut().set_text(name_id, "Alice").unwrap();

    let failing = CallbackSink::new(|_bytes: Vec<u8>, _values: FieldValues| {
        Err(FormError::Save("disk full".to_string()))
    });
    let outcome = viewer.save(&backend, &failing).await.unwrap();
    assert!(matches!(outcome, SaveOutcome::Failed(ref msg) if msg.contains("disk full")));
    assert!(!viewer.is_saving());
    assert_eq!(viewer.form_fields()["first_name"], "Alice");

    let ok = CallbackSink::new(|_bytes: Vec<u8>, _values: FieldValues| Ok(()));
    let outcome = viewer.save(&backend, &ok).await.unwrap();
    assert!(matches!(outcome, SaveOutcome::Delivered { .. }));
}

#[tokio::test]
async fn test_save_file_name_falls_back() {
    let mut viewer = viewer();
    assert_eq!(viewer.save_file_name(), "document.pdf");
    viewer.set_source(Source::from_bytes(vec![0u8; 4]));
    assert_eq!(viewer.save_file_name(), "document.pdf");
    viewer.set_source(Source::Path("/forms/intake.pdf".into()));
    assert_eq!(viewer.save_file_name(), "intake.pdf");
}
