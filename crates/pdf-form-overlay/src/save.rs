//! Delivering saved document bytes
//!
//! A save ends in one of three places: a caller-supplied callback, a
//! platform file picker, or, when no picker is available, a plain download
//! into a directory.

#![allow(async_fn_in_trait)]

use std::path::{Path, PathBuf};

use crate::backend::Source;
use crate::types::{FieldValues, Result};

/// Where the bytes ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveDestination {
    Callback,
    Picked(PathBuf),
    Downloaded(PathBuf),
}

/// Result of delivering bytes to a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered(SaveDestination),
    Cancelled,
}

/// Final state of a save request. Failures are reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Delivered {
        file_name: String,
        destination: SaveDestination,
    },
    Cancelled,
    Failed(String),
}

/// Receives the serialized document and the value snapshot it was built from
pub trait SaveSink {
    async fn deliver(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        values: &FieldValues,
    ) -> Result<Delivery>;
}

/// File name for a save: the trailing segment of the source, else `fallback`
pub fn derive_file_name(source: Option<&Source>, fallback: &str) -> String {
    source
        .and_then(Source::file_name)
        .unwrap_or_else(|| fallback.to_string())
}

/// Wraps a caller's `on_save(bytes, values)` callback
pub struct CallbackSink<F> {
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: Fn(Vec<u8>, FieldValues) -> Result<()>,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> SaveSink for CallbackSink<F>
where
    F: Fn(Vec<u8>, FieldValues) -> Result<()>,
{
    async fn deliver(
        &self,
        _file_name: &str,
        bytes: Vec<u8>,
        values: &FieldValues,
    ) -> Result<Delivery> {
        (self.callback)(bytes, values.clone())?;
        Ok(Delivery::Delivered(SaveDestination::Callback))
    }
}

/// Answer from a platform save dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerResult {
    Saved(PathBuf),
    Cancelled,
    /// No dialog on this platform, use the download fallback
    Unavailable,
}

pub trait FilePicker {
    async fn save_file(&self, suggested_name: &str, bytes: &[u8]) -> Result<PickerResult>;
}

impl<P: FilePicker> FilePicker for &P {
    async fn save_file(&self, suggested_name: &str, bytes: &[u8]) -> Result<PickerResult> {
        (**self).save_file(suggested_name, bytes).await
    }
}

/// Picker for environments without a save dialog
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPicker;

impl FilePicker for NoPicker {
    async fn save_file(&self, _suggested_name: &str, _bytes: &[u8]) -> Result<PickerResult> {
        Ok(PickerResult::Unavailable)
    }
}

/// Writes into a directory without asking, never overwriting
#[derive(Debug, Clone)]
pub struct DownloadSink {
    dir: PathBuf,
}

impl DownloadSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn download(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = unique_path(&self.dir, file_name).await;
        tokio::fs::write(&path, bytes).await?;
        log::info!("Downloaded {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}

impl SaveSink for DownloadSink {
    async fn deliver(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        _values: &FieldValues,
    ) -> Result<Delivery> {
        let path = self.download(file_name, &bytes).await?;
        Ok(Delivery::Delivered(SaveDestination::Downloaded(path)))
    }
}

/// `name.pdf`, then `name (1).pdf`, `name (2).pdf`, ...
async fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };
    let mut n = 1;
    loop {
        let name = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = dir.join(name);
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

/// Platform save: ask the picker, fall back to a download when it has no
/// dialog to offer
pub struct PlatformSink<P> {
    picker: P,
    download: DownloadSink,
}

impl<P: FilePicker> PlatformSink<P> {
    pub fn new(picker: P, download: DownloadSink) -> Self {
        Self { picker, download }
    }
}

impl PlatformSink<NoPicker> {
    pub fn download_only(dir: impl Into<PathBuf>) -> Self {
        Self::new(NoPicker, DownloadSink::new(dir))
    }
}

impl<P: FilePicker> SaveSink for PlatformSink<P> {
    async fn deliver(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        values: &FieldValues,
    ) -> Result<Delivery> {
        match self.picker.save_file(file_name, &bytes).await? {
            PickerResult::Saved(path) => Ok(Delivery::Delivered(SaveDestination::Picked(path))),
            PickerResult::Cancelled => Ok(Delivery::Cancelled),
            PickerResult::Unavailable => {
                log::debug!("No save dialog available, downloading instead");
                self.download.deliver(file_name, bytes, values).await
            }
        }
    }
}

/// Boxed `on_save(bytes, values)` callback
pub type OnSave = Box<dyn Fn(Vec<u8>, FieldValues) -> Result<()>>;

/// The caller's callback when one was supplied, else the platform route
pub enum SaveRoute<P> {
    Callback(CallbackSink<OnSave>),
    Platform(PlatformSink<P>),
}

impl<P: FilePicker> SaveRoute<P> {
    pub fn new(on_save: Option<OnSave>, platform: PlatformSink<P>) -> Self {
        match on_save {
            Some(callback) => SaveRoute::Callback(CallbackSink::new(callback)),
            None => SaveRoute::Platform(platform),
        }
    }
}

impl<P: FilePicker> SaveSink for SaveRoute<P> {
    async fn deliver(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        values: &FieldValues,
    ) -> Result<Delivery> {
        match self {
            SaveRoute::Callback(sink) => sink.deliver(file_name, bytes, values).await,
            SaveRoute::Platform(sink) => sink.deliver(file_name, bytes, values).await,
        }
    }
}
