mod common;

use common::FakeBackend;
use pdf_form_overlay::*;
use tempfile::TempDir;

#[test]
fn test_default_options_are_valid() {
    let options = ViewerOptions::default();
    assert!(options.validate().is_ok());
    let zoom = options.zoom_controller().unwrap();
    assert_eq!(zoom.scale(), 1.0);
    assert_eq!(options.fallback_file_name, DEFAULT_FILE_NAME);
}

#[test]
fn test_validate_rejects_bad_options() {
    let options = ViewerOptions {
        zoom_levels: vec![1.0, 0.5],
        ..Default::default()
    };
    assert!(matches!(options.validate(), Err(FormError::Config(_))));

    let options = ViewerOptions {
        default_zoom_index: 40,
        ..Default::default()
    };
    assert!(matches!(options.validate(), Err(FormError::Config(_))));

    let options = ViewerOptions {
        device_pixel_ratio: 0.0,
        ..Default::default()
    };
    assert!(matches!(options.validate(), Err(FormError::Config(_))));

    let options = ViewerOptions {
        fallback_file_name: "  ".to_string(),
        ..Default::default()
    };
    assert!(options.validate().is_err());
    assert!(FormViewer::<FakeBackend>::new(options).is_err());
}

#[test]
fn test_viewer_override_wins_over_process_default() {
    let options = ViewerOptions {
        worker_src: Some("/usr/lib/pdfium".into()),
        ..Default::default()
    };
    assert_eq!(
        options.worker_locator().path.as_deref(),
        Some(std::path::Path::new("/usr/lib/pdfium"))
    );
}

#[tokio::test]
async fn test_options_json_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("viewer.json");
    let options = ViewerOptions {
        zoom_levels: vec![0.5, 1.0, 2.0],
        default_zoom_index: 1,
        device_pixel_ratio: 2.0,
        download_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    options.save(&path).await.unwrap();
    let loaded = ViewerOptions::load(&path).await.unwrap();
    assert_eq!(loaded, options);
}

#[tokio::test]
async fn test_partial_json_fills_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("viewer.json");
    tokio::fs::write(&path, r#"{ "device_pixel_ratio": 1.5 }"#)
        .await
        .unwrap();
    let loaded = ViewerOptions::load(&path).await.unwrap();
    assert_eq!(loaded.device_pixel_ratio, 1.5);
    assert_eq!(loaded.zoom_levels, ViewerOptions::default().zoom_levels);
}

#[tokio::test]
async fn test_invalid_json_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("viewer.json");
    tokio::fs::write(&path, r#"{ "zoom_levels": [] }"#).await.unwrap();
    assert!(matches!(
        ViewerOptions::load(&path).await,
        Err(FormError::Config(_))
    ));

    tokio::fs::write(&path, "not json").await.unwrap();
    assert!(matches!(
        ViewerOptions::load(&path).await,
        Err(FormError::Config(_))
    ));
}
