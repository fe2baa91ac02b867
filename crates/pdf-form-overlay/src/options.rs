use std::path::PathBuf;
use std::sync::OnceLock;

use crate::backend::WorkerLocator;
use crate::types::*;
use crate::zoom::{DEFAULT_ZOOM_INDEX, DEFAULT_ZOOM_LEVELS, ZoomController, validate_levels};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Environment variable consulted for the process-wide worker location
pub const WORKER_SRC_ENV: &str = "PDF_FORM_WORKER_SRC";

/// Name used when a save has no source path to derive one from
pub const DEFAULT_FILE_NAME: &str = "document.pdf";

static DEFAULT_WORKER_SRC: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Fix the process-wide worker location. Only the first call has any effect;
/// returns false if a default was already resolved.
pub fn init_default_worker_src(path: Option<PathBuf>) -> bool {
    DEFAULT_WORKER_SRC.set(path).is_ok()
}

/// Process-wide worker location, resolved once
pub fn default_worker_src() -> Option<PathBuf> {
    DEFAULT_WORKER_SRC
        .get_or_init(|| {
            std::env::var_os(WORKER_SRC_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
        .clone()
}

/// Viewer configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ViewerOptions {
    // Zoom
    pub zoom_levels: Vec<f32>,
    pub default_zoom_index: usize,

    // Rasterization
    pub device_pixel_ratio: f32,
    /// Overrides the process-wide worker location for this viewer
    pub worker_src: Option<PathBuf>,

    // Saving
    pub fallback_file_name: String,
    pub download_dir: Option<PathBuf>,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            zoom_levels: DEFAULT_ZOOM_LEVELS.to_vec(),
            default_zoom_index: DEFAULT_ZOOM_INDEX,
            device_pixel_ratio: 1.0,
            worker_src: None,
            fallback_file_name: DEFAULT_FILE_NAME.to_string(),
            download_dir: None,
        }
    }
}

impl ViewerOptions {
    /// Load options from JSON file
    #[cfg(feature = "serde")]
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let options: Self = serde_json::from_slice(&bytes)
            .map_err(|e| FormError::Config(format!("Failed to parse config: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Save options to JSON file
    #[cfg(feature = "serde")]
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| FormError::Config(format!("Failed to serialize config: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        validate_levels(&self.zoom_levels)?;
        if self.default_zoom_index >= self.zoom_levels.len() {
            return Err(FormError::Config(format!(
                "Default zoom index {} out of range for {} levels",
                self.default_zoom_index,
                self.zoom_levels.len()
            )));
        }
        if !self.device_pixel_ratio.is_finite() || self.device_pixel_ratio <= 0.0 {
            return Err(FormError::Config(
                "Device pixel ratio must be finite and positive".to_string(),
            ));
        }
        if self.fallback_file_name.trim().is_empty() {
            return Err(FormError::Config(
                "Fallback file name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn zoom_controller(&self) -> Result<ZoomController> {
        ZoomController::new(self.zoom_levels.clone(), self.default_zoom_index)
    }

    /// Worker location for a document acquisition: the per-viewer override,
    /// else the process-wide default
    pub fn worker_locator(&self) -> WorkerLocator {
        WorkerLocator::new(self.worker_src.clone().or_else(default_worker_src))
    }
}
