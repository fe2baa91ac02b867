use std::ffi::OsString;

use pdf_form_overlay::{FilePicker, PickerResult, Result};

/// Native save dialog. When disabled, or when no dialog can be shown, the
/// platform sink downloads instead.
#[derive(Debug, Clone, Copy)]
pub struct RfdPicker {
    enabled: bool,
}

impl RfdPicker {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl FilePicker for RfdPicker {
    async fn save_file(&self, suggested_name: &str, bytes: &[u8]) -> Result<PickerResult> {
        if !self.enabled {
            return Ok(PickerResult::Unavailable);
        }
        // rfd reports a missing dialog backend the same way as a cancel
        if !dialog_available() {
            log::info!("No display for a save dialog, downloading instead");
            return Ok(PickerResult::Unavailable);
        }
        let Some(handle) = rfd::AsyncFileDialog::new()
            .set_file_name(suggested_name)
            .add_filter("PDF", &["pdf"])
            .save_file()
            .await
        else {
            return Ok(PickerResult::Cancelled);
        };

        let path = handle.path().to_path_buf();
        tokio::fs::write(&path, bytes).await?;
        Ok(PickerResult::Saved(path))
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn dialog_available() -> bool {
    display_present(|key| std::env::var_os(key))
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn dialog_available() -> bool {
    true
}

/// X11 and Wayland sessions advertise themselves through the environment
#[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
fn display_present(var: impl Fn(&str) -> Option<OsString>) -> bool {
    ["WAYLAND_DISPLAY", "DISPLAY"]
        .into_iter()
        .any(|key| var(key).is_some_and(|value| !value.is_empty()))
}
