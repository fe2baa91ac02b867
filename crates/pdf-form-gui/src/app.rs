use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use eframe::egui;
use pdf_form_lopdf::LopdfBackend;
use pdf_form_overlay::{
    ControlId, DownloadSink, LiveControl, PlatformSink, SaveDestination, SaveOutcome, Source,
    ViewerOptions,
};
use pdf_form_runtime::{FormCommand, FormUpdate, PageImage, spawn_worker_thread};
use tokio::sync::mpsc;

use crate::logger::AppLogger;
use crate::overlay::show_control;
use crate::picker::RfdPicker;
use crate::printer::ImagePrinter;

/// Space between pages in the scroll area
const PAGE_SPACING: f32 = 12.0;

/// A rendered page and the controls placed over it
struct PageView {
    texture: egui::TextureHandle,
    size: egui::Vec2,
    controls: Vec<ControlId>,
}

struct ZoomState {
    scale: f32,
    can_zoom_in: bool,
    can_zoom_out: bool,
}

/// Flags that drive the toolbar and the repaint loop, following the
/// worker's updates
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Activity {
    loading: bool,
    loaded: bool,
    /// Cleared only by `SaveFinished`, since a save outlives the document
    /// that started it
    saving: bool,
}

impl Activity {
    fn track(&mut self, update: &FormUpdate) {
        match update {
            FormUpdate::Loading { .. } => {
                self.loading = true;
                self.loaded = false;
            }
            FormUpdate::Loaded { .. } => {
                self.loading = false;
                self.loaded = true;
            }
            FormUpdate::SaveStarted { .. } => self.saving = true,
            FormUpdate::SaveFinished { .. } => self.saving = false,
            FormUpdate::Closed => {
                self.loading = false;
                self.loaded = false;
            }
            FormUpdate::Error { .. } => self.loading = false,
            _ => {}
        }
    }

    fn can_save(&self) -> bool {
        self.loaded && !self.saving
    }

    fn busy(&self) -> bool {
        self.loading || self.saving
    }
}

pub struct FormApp {
    command_tx: mpsc::UnboundedSender<FormCommand>,
    update_rx: mpsc::UnboundedReceiver<FormUpdate>,
    logger: AppLogger,

    status: String,
    show_log: bool,

    // Document state
    activity: Activity,
    page_count: usize,
    pages: BTreeMap<usize, PageView>,
    controls: HashMap<ControlId, LiveControl>,
    zoom: ZoomState,
    container_width: f32,
}

impl FormApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        mut options: ViewerOptions,
        logger: AppLogger,
        initial: Option<PathBuf>,
    ) -> std::io::Result<Self> {
        options.device_pixel_ratio = cc.egui_ctx.pixels_per_point();
        let download_dir = options
            .download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        // A configured download directory skips the dialog
        let ask = options.download_dir.is_none();

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        spawn_worker_thread(
            move || {
                (
                    LopdfBackend::new(),
                    PlatformSink::new(RfdPicker::new(ask), DownloadSink::new(download_dir)),
                    ImagePrinter::new(std::env::temp_dir()),
                )
            },
            options,
            command_rx,
            update_tx,
        )?;

        let app = Self {
            command_tx,
            update_rx,
            logger,
            status: String::new(),
            show_log: false,
            activity: Activity::default(),
            page_count: 0,
            pages: BTreeMap::new(),
            controls: HashMap::new(),
            zoom: ZoomState {
                scale: 1.0,
                can_zoom_in: false,
                can_zoom_out: false,
            },
            container_width: 0.0,
        };
        if let Some(path) = initial {
            app.open(path);
        }
        Ok(app)
    }

    fn send(&self, cmd: FormCommand) {
        if self.command_tx.send(cmd).is_err() {
            log::error!("Form worker has stopped");
        }
    }

    fn open(&self, path: PathBuf) {
        log::info!("Opening {}", path.display());
        self.send(FormCommand::Open {
            source: Source::Path(path),
        });
    }

    fn reset(&mut self) {
        self.page_count = 0;
        self.pages.clear();
        self.controls.clear();
        self.container_width = 0.0;
    }

    fn handle_update(&mut self, ctx: &egui::Context, update: FormUpdate) {
        self.activity.track(&update);
        match update {
            FormUpdate::Loading { .. } => {
                self.reset();
                self.status = "Loading PDF...".to_string();
            }
            FormUpdate::Loaded {
                page_count,
                controls,
            } => {
                self.page_count = page_count;
                self.status = format!(
                    "Loaded {} pages with {} fields",
                    page_count,
                    controls.len()
                );
                self.controls = controls.into_iter().map(|c| (c.id, c)).collect();
            }
            FormUpdate::PageRendered {
                page_number,
                image,
                overlays,
                ..
            } => {
                self.show_page(ctx, page_number, image, overlays);
            }
            FormUpdate::ZoomChanged {
                scale,
                can_zoom_in,
                can_zoom_out,
            } => {
                self.zoom = ZoomState {
                    scale,
                    can_zoom_in,
                    can_zoom_out,
                };
            }
            FormUpdate::FormFields { values } => {
                for (name, value) in &values {
                    log::info!("{} = {}", name, value);
                }
            }
            FormUpdate::SaveStarted { file_name } => {
                self.status = format!("Saving {}...", file_name);
            }
            FormUpdate::SaveFinished { outcome } => {
                self.status = match outcome {
                    SaveOutcome::Delivered {
                        file_name,
                        destination,
                    } => match destination {
                        SaveDestination::Picked(path) | SaveDestination::Downloaded(path) => {
                            format!("Saved {} → {}", file_name, path.display())
                        }
                        SaveDestination::Callback => format!("Saved {}", file_name),
                    },
                    SaveOutcome::Cancelled => "Save cancelled".to_string(),
                    SaveOutcome::Failed(message) => format!("Save failed: {message}"),
                };
            }
            FormUpdate::Printed { pages } => {
                self.status = format!("Printed {} pages", pages);
            }
            FormUpdate::Closed => {
                self.reset();
                self.status = "Closed PDF".to_string();
            }
            FormUpdate::Error { message } => {
                self.status = format!("Error: {message}");
            }
        }
    }

    fn show_page(
        &mut self,
        ctx: &egui::Context,
        page_number: usize,
        image: PageImage,
        overlays: Vec<LiveControl>,
    ) {
        let color_image = egui::ColorImage::from_rgba_unmultiplied(
            [image.pixel_width, image.pixel_height],
            &image.rgba,
        );
        let size = egui::vec2(image.css_width, image.css_height);

        // Keep local values, only placements come from the worker
        let mut ids = Vec::with_capacity(overlays.len());
        for overlay in overlays {
            ids.push(overlay.id);
            let placement = overlay.placement;
            self.controls
                .entry(overlay.id)
                .and_modify(|control| control.placement = placement)
                .or_insert(overlay);
        }

        match self.pages.get_mut(&page_number) {
            Some(page) => {
                page.texture.set(color_image, egui::TextureOptions::LINEAR);
                page.size = size;
                page.controls = ids;
            }
            None => {
                let texture = ctx.load_texture(
                    format!("page_{}", page_number),
                    color_image,
                    egui::TextureOptions::LINEAR,
                );
                self.pages.insert(
                    page_number,
                    PageView {
                        texture,
                        size,
                        controls: ids,
                    },
                );
            }
        }
    }

    fn show_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("📂 Open...").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("PDF", &["pdf"])
                    .pick_file()
                {
                    self.open(path);
                }
            }
            if ui
                .add_enabled(self.activity.loaded || self.activity.loading, egui::Button::new("Close"))
                .clicked()
            {
                self.send(FormCommand::Close);
            }

            ui.separator();

            if ui
                .add_enabled(self.activity.loaded && self.zoom.can_zoom_out, egui::Button::new("➖"))
                .clicked()
            {
                self.send(FormCommand::ZoomOut);
            }
            ui.label(format!("{:.0}%", self.zoom.scale * 100.0));
            if ui
                .add_enabled(self.activity.loaded && self.zoom.can_zoom_in, egui::Button::new("➕"))
                .clicked()
            {
                self.send(FormCommand::ZoomIn);
            }

            ui.separator();

            if ui
                .add_enabled(self.activity.can_save(), egui::Button::new("💾 Save"))
                .clicked()
            {
                self.send(FormCommand::Save);
            }
            if ui
                .add_enabled(self.activity.loaded, egui::Button::new("🖨 Print"))
                .clicked()
            {
                self.send(FormCommand::Print);
            }
            if ui
                .add_enabled(self.activity.loaded, egui::Button::new("Values"))
                .clicked()
            {
                self.send(FormCommand::Snapshot);
                self.show_log = true;
            }

            ui.separator();
            ui.toggle_value(&mut self.show_log, "Log");
        });
    }

    fn show_pages(&mut self, ui: &mut egui::Ui) {
        let width = ui.available_width();
        if self.activity.loaded && (width - self.container_width).abs() >= 1.0 {
            self.container_width = width;
            self.send(FormCommand::Resize {
                container_width: width,
            });
        }

        let Self {
            pages,
            controls,
            command_tx,
            ..
        } = self;
        egui::ScrollArea::both()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for page in pages.values() {
                    let (rect, _) = ui.allocate_exact_size(page.size, egui::Sense::hover());
                    ui.painter().image(
                        page.texture.id(),
                        rect,
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                    for id in &page.controls {
                        let Some(control) = controls.get_mut(id) else {
                            continue;
                        };
                        if let Some(cmd) = show_control(ui, rect.min, control) {
                            let _ = command_tx.send(cmd);
                        }
                    }
                    ui.add_space(PAGE_SPACING);
                }
            });
    }

    fn show_log_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_log;
        egui::Window::new("Log")
            .open(&mut open)
            .default_width(480.0)
            .show(ctx, |ui| {
                if ui.button("Clear").clicked() {
                    self.logger.clear();
                }
                ui.separator();
                egui::ScrollArea::vertical()
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for entry in self.logger.get_entries() {
                            ui.label(format!(
                                "{} {:<5} {}",
                                entry.timestamp.format("%H:%M:%S"),
                                entry.level,
                                entry.message
                            ));
                        }
                    });
            });
        self.show_log = open;
    }
}

impl eframe::App for FormApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Handle drag-and-drop for PDF files
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|file| file.path.clone())
                .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("pdf"))
                .collect()
        });
        if let Some(path) = dropped.into_iter().last() {
            self.open(path);
        }

        while let Ok(update) = self.update_rx.try_recv() {
            self.handle_update(ctx, update);
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.show_toolbar(ui));

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.activity.busy() {
                    ui.spinner();
                }
                ui.label(&self.status);
                if let Some(latest) = self.logger.latest_message() {
                    ui.separator();
                    ui.weak(latest);
                }
                if self.page_count > 0 {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(format!("{} pages", self.page_count));
                    });
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.activity.loaded {
                self.show_pages(ui);
            } else {
                ui.vertical_centered(|ui| {
                    ui.add_space(50.0);
                    ui.heading("PDF Form Viewer");
                    ui.add_space(20.0);
                    if self.activity.loading {
                        ui.spinner();
                    } else {
                        ui.label("Drop a PDF form here or click Open");
                    }
                });
            }
        });

        if self.show_log {
            self.show_log_window(ctx);
        }

        // The worker cannot wake the UI, so poll while it may have news
        if self.activity.loaded || self.activity.busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
