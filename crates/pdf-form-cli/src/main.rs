use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use pdf_form_lopdf::LopdfBackend;
use pdf_form_overlay::{
    Backend, FieldKind, FieldValues, FormModel, FormViewer, OverlayRect, PageHandle, Source,
    ViewerOptions, ViewerState, apply_values, init_default_worker_src, load_page_entries,
    place_overlay,
};
use serde::Serialize;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pdfform", about = "Inspect and fill PDF forms", version)]
struct Cli {
    /// Viewer options (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory or file of the pdfium library, for every viewer in this run
    #[arg(long, global = true)]
    worker_src: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List editable fields per page with their overlay rectangles
    Fields {
        /// Input PDF file
        input: PathBuf,

        /// Zoom level index to place overlays at
        #[arg(long)]
        zoom_index: Option<usize>,
    },

    /// Print the default value of every editable field
    Values {
        /// Input PDF file
        input: PathBuf,
    },

    /// Write field values into a copy of the document
    Fill {
        /// Input PDF file
        input: PathBuf,

        /// Output PDF file
        #[arg(short, long)]
        output: PathBuf,

        /// Field assignment, may be repeated
        #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,

        /// JSON object of field values; --set entries override it
        #[arg(long)]
        values: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct PageFields {
    page: usize,
    scale: f32,
    width: f32,
    height: f32,
    fields: Vec<PlacedField>,
}

#[derive(Serialize)]
struct PlacedField {
    name: String,
    kind: FieldKind,
    overlay: OverlayRect,
    default_value: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    items: Vec<String>,
}

fn parse_assignment(arg: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", arg))?;
    if name.is_empty() {
        return Err(format!("missing field name in '{}'", arg));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Flatten a JSON object of field values into snapshot strings
fn values_from_json(json: &str) -> Result<FieldValues> {
    let raw: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(json).context("values must be a JSON object")?;
    let mut values = FieldValues::new();
    for (name, value) in raw {
        let text = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Bool(true) => "On".to_string(),
            serde_json::Value::Bool(false) => "Off".to_string(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        values.insert(name, text);
    }
    Ok(values)
}

async fn load_options(path: Option<&Path>) -> Result<ViewerOptions> {
    match path {
        Some(path) => ViewerOptions::load(path)
            .await
            .with_context(|| format!("Failed to load options from {}", path.display())),
        None => Ok(ViewerOptions::default()),
    }
}

/// Drive a viewer through open and page load
async fn open_viewer(
    backend: &LopdfBackend,
    input: &Path,
    options: ViewerOptions,
) -> Result<FormViewer<LopdfBackend>> {
    let mut viewer = FormViewer::new(options)?;
    let request = viewer.set_source(Source::Path(input.to_path_buf()));
    let opened = backend.open(&request.source, &request.worker).await;
    let document = viewer
        .document_opened(request.generation, opened)
        .ok_or_else(|| load_failure(&viewer, input))?;
    let pages = load_page_entries(document.as_ref()).await;
    if !viewer.pages_loaded(request.generation, pages) {
        return Err(load_failure(&viewer, input));
    }
    Ok(viewer)
}

fn load_failure(viewer: &FormViewer<LopdfBackend>, input: &Path) -> anyhow::Error {
    match viewer.state() {
        ViewerState::Failed(message) => anyhow!("{}: {}", input.display(), message),
        state => anyhow!("{}: load stopped in state {:?}", input.display(), state),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    if let Some(path) = cli.worker_src.clone() {
        init_default_worker_src(Some(path));
    }

    let backend = LopdfBackend::new();
    let mut options = load_options(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Fields { input, zoom_index } => {
            if let Some(index) = zoom_index {
                options.default_zoom_index = index;
            }
            let viewer = open_viewer(&backend, &input, options).await?;
            let scale = viewer.zoom().scale();

            let pages: Vec<PageFields> = viewer
                .page_entries()
                .iter()
                .map(|entry| {
                    let viewport = entry.page.viewport(scale);
                    PageFields {
                        page: entry.page.number(),
                        scale,
                        width: viewport.width,
                        height: viewport.height,
                        fields: entry
                            .fields
                            .iter()
                            .map(|field| PlacedField {
                                name: field.name.clone(),
                                kind: field.kind,
                                overlay: place_overlay(&field.rect, viewport.height, scale),
                                default_value: field.default_value.clone(),
                                items: field
                                    .items
                                    .iter()
                                    .map(|item| item.export_value.clone())
                                    .collect(),
                            })
                            .collect(),
                    }
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&pages)?);
        }

        Commands::Values { input } => {
            let viewer = open_viewer(&backend, &input, options).await?;
            println!("{}", serde_json::to_string_pretty(&viewer.form_fields())?);
        }

        Commands::Fill {
            input,
            output,
            set,
            values,
        } => {
            let mut field_values = match values {
                Some(path) => {
                    let json = tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    values_from_json(&json)?
                }
                None => FieldValues::new(),
            };
            field_values.extend(set);

            let bytes = tokio::fs::read(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let mut model = backend.load_form(&bytes).await?;

            let known: HashSet<String> = model.fields().into_iter().map(|f| f.name).collect();
            for name in field_values.keys().filter(|name| !known.contains(*name)) {
                log::warn!("No field named '{}' in {}", name, input.display());
            }

            let report = apply_values(&mut model, &field_values)?;
            for name in &report.unsupported {
                log::warn!("Field '{}' kept its original value", name);
            }

            let filled = model.save().await?;
            tokio::fs::write(&output, filled)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "Filled {} fields → {}",
                report.applied.len(),
                output.display()
            );
        }
    }

    Ok(())
}
