use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use pdf_form_overlay::{FormError, PrintJob, PrintTarget, RasterSurface, Result};

/// Vertical gap between composed pages, in pixels
const PAGE_GAP: u32 = 16;
const GAP_COLOR: Rgba<u8> = Rgba([128, 128, 128, 255]);

/// Prints by composing the rendered pages into one PNG and handing it to
/// the system viewer
pub struct ImagePrinter {
    dir: PathBuf,
}

impl ImagePrinter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PrintTarget for ImagePrinter {
    async fn print(&self, job: PrintJob<'_>) -> Result<()> {
        if job.pages.is_empty() {
            return Err(FormError::NotReady("no rendered pages to print"));
        }
        let sheet = compose(job.pages)
            .ok_or_else(|| FormError::Render("page buffer does not match its size".to_string()))?;

        let path = self.dir.join(print_file_name(job.title));
        let target = path.clone();
        tokio::task::spawn_blocking(move || sheet.save(&target))
            .await?
            .map_err(|e| FormError::Backend(format!("Failed to write print image: {}", e)))?;

        open::that(&path)?;
        log::info!("Sent {} pages to {}", job.pages.len(), path.display());
        Ok(())
    }
}

/// `form.pdf` prints to `form-print.png`
fn print_file_name(title: &str) -> String {
    let stem = Path::new(title)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());
    format!("{}-print.png", stem)
}

/// Stack pages top to bottom, left aligned
fn compose(pages: &[&RasterSurface]) -> Option<RgbaImage> {
    let width = pages.iter().map(|page| page.pixel_width).max()? as u32;
    let height = pages.iter().map(|page| page.pixel_height as u32).sum::<u32>()
        + PAGE_GAP * (pages.len() as u32).saturating_sub(1);

    let mut sheet = RgbaImage::from_pixel(width, height, GAP_COLOR);
    let mut y = 0u32;
    for page in pages {
        let image = RgbaImage::from_raw(
            page.pixel_width as u32,
            page.pixel_height as u32,
            page.rgba.clone(),
        )?;
        image::imageops::replace(&mut sheet, &image, 0, y as i64);
        y += page.pixel_height as u32 + PAGE_GAP;
    }
    Some(sheet)
}
