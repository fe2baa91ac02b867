//! Page rasterization
//!
//! With the `pdfium` feature pages are rendered by pdfium on the blocking
//! pool. Without it, or when no pdfium library can be bound, pages come out
//! as blank paper so overlays still have something to sit on.

use std::sync::{Arc, Once};

use pdf_form_overlay::{PAPER, RasterSurface, WorkerLocator};

use crate::error::*;

static BLANK_WARNING: Once = Once::new();

fn blank_page(surface: &mut RasterSurface, reason: &str) {
    BLANK_WARNING.call_once(|| {
        log::warn!("Rendering blank pages: {}", reason);
    });
    surface.fill(PAPER);
}

/// Pixels produced by the rasterizer
pub struct Bitmap {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
}

/// Copy `bitmap` into `surface`, clipping to the overlapping area and
/// leaving paper elsewhere
pub fn blit(surface: &mut RasterSurface, bitmap: &Bitmap) {
    if surface.write_pixels(bitmap.width, bitmap.height, &bitmap.rgba) {
        return;
    }
    log::debug!(
        "Bitmap {}x{} does not match surface {}x{}, clipping",
        bitmap.width,
        bitmap.height,
        surface.pixel_width,
        surface.pixel_height
    );
    surface.fill(PAPER);
    let rows = bitmap.height.min(surface.pixel_height);
    let row_bytes = bitmap.width.min(surface.pixel_width) * 4;
    for row in 0..rows {
        let src = row * bitmap.width * 4;
        let dst = row * surface.pixel_width * 4;
        surface.rgba[dst..dst + row_bytes].copy_from_slice(&bitmap.rgba[src..src + row_bytes]);
    }
}

#[cfg(all(feature = "pdfium", not(target_arch = "wasm32")))]
mod pdfium {
    use std::path::PathBuf;

    use pdf_form_overlay::WorkerLocator;
    use pdfium_render::prelude::*;

    use super::Bitmap;

    /// Bind pdfium: the worker location first, then `vendor/pdfium/lib`
    /// under the working directory, then the system library
    pub fn init_pdfium(worker: &WorkerLocator) -> Result<Pdfium, PdfiumError> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(path) = &worker.path {
            if path.is_file() {
                candidates.push(path.clone());
            } else {
                candidates.push(PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(path)));
            }
        }
        let vendor_path = std::env::current_dir().ok().and_then(|mut p| {
            p.push("vendor/pdfium/lib");
            if p.exists() { Some(p) } else { None }
        });
        if let Some(vendor_path) = vendor_path {
            candidates.push(PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(
                &vendor_path,
            )));
        }

        for candidate in candidates {
            match Pdfium::bind_to_library(&candidate) {
                Ok(binding) => return Ok(Pdfium::new(binding)),
                Err(e) => log::debug!("Could not bind pdfium at {}: {}", candidate.display(), e),
            }
        }

        Pdfium::bind_to_system_library().map(Pdfium::new)
    }

    /// Render page `index` to fit `width` x `height` pixels. `Ok(None)` when
    /// no pdfium library is available.
    pub fn render(
        bytes: &[u8],
        worker: &WorkerLocator,
        index: usize,
        width: usize,
        height: usize,
    ) -> Result<Option<Bitmap>, PdfiumError> {
        let pdfium = match init_pdfium(worker) {
            Ok(pdfium) => pdfium,
            Err(e) => {
                log::debug!("pdfium unavailable: {}", e);
                return Ok(None);
            }
        };
        let document = pdfium.load_pdf_from_byte_slice(bytes, None)?;
        let page = document.pages().get(index as u16)?;

        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_maximum_height(height as i32);

        let bitmap = page.render_with_config(&config)?;
        Ok(Some(Bitmap {
            width: bitmap.width() as usize,
            height: bitmap.height() as usize,
            rgba: bitmap.as_rgba_bytes().to_vec(),
        }))
    }
}

#[cfg(all(feature = "pdfium", not(target_arch = "wasm32")))]
pub use pdfium::init_pdfium;

/// Rasterize page `index` (0-based) of `bytes` into a surface already sized
/// for the target viewport
#[cfg(all(feature = "pdfium", not(target_arch = "wasm32")))]
pub async fn rasterize(
    bytes: Arc<[u8]>,
    worker: &WorkerLocator,
    index: usize,
    surface: &mut RasterSurface,
) -> Result<()> {
    let worker = worker.clone();
    let (width, height) = (surface.pixel_width, surface.pixel_height);
    let rendered = tokio::task::spawn_blocking(move || {
        pdfium::render(&bytes, &worker, index, width, height)
    })
    .await??;

    match rendered {
        Some(bitmap) => blit(surface, &bitmap),
        None => blank_page(surface, "no pdfium library could be bound"),
    }
    Ok(())
}

#[cfg(not(all(feature = "pdfium", not(target_arch = "wasm32"))))]
pub async fn rasterize(
    _bytes: Arc<[u8]>,
    _worker: &WorkerLocator,
    _index: usize,
    surface: &mut RasterSurface,
) -> Result<()> {
    blank_page(surface, "built without the pdfium feature");
    Ok(())
}
