#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::{Path, PathBuf};

use eframe::egui;
use log::LevelFilter;
use pdf_form_overlay::ViewerOptions;

mod app;
mod logger;
mod overlay;
mod picker;
mod printer;

use logger::AppLogger;

/// Environment variable naming a JSON file of viewer options
const CONFIG_ENV: &str = "PDF_FORM_CONFIG";

fn load_options(path: &Path) -> anyhow::Result<ViewerOptions> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(ViewerOptions::load(path))?)
}

fn main() -> eframe::Result<()> {
    let logger = AppLogger::new(500, LevelFilter::Info);
    if let Err(e) = logger.clone().init() {
        eprintln!("Failed to install logger: {}", e);
    }

    let options = match std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
        Some(path) => load_options(&path).unwrap_or_else(|e| {
            log::warn!("Ignoring options in {}: {:#}", path.display(), e);
            ViewerOptions::default()
        }),
        None => ViewerOptions::default(),
    };
    let initial = std::env::args_os().nth(1).map(PathBuf::from);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 900.0])
            .with_drag_and_drop(true)
            .with_title("PDF Form Viewer"),
        ..Default::default()
    };

    eframe::run_native(
        "PDF Form Viewer",
        native_options,
        Box::new(move |cc| Ok(Box::new(app::FormApp::new(cc, options, logger, initial)?))),
    )
}
