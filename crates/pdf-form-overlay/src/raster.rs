use crate::geometry::Viewport;

/// Opaque white, shown where page content could not be drawn
pub const PAPER: [u8; 4] = [255, 255, 255, 255];

/// Backing pixel buffer for one rendered page.
///
/// The buffer is sized in physical pixels (CSS size times device pixel
/// ratio) while hosts display it at its CSS size.
#[derive(Debug, Clone, Default)]
pub struct RasterSurface {
    pub pixel_width: usize,
    pub pixel_height: usize,
    pub css_width: f32,
    pub css_height: f32,
    pub device_pixel_ratio: f32,
    /// Straight RGBA8, row-major, `pixel_width * pixel_height * 4` bytes
    pub rgba: Vec<u8>,
}

impl RasterSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize the buffer for `viewport`, clearing previous content
    pub fn resize(&mut self, viewport: &Viewport, device_pixel_ratio: f32) {
        let ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        self.css_width = viewport.width;
        self.css_height = viewport.height;
        self.device_pixel_ratio = ratio;
        self.pixel_width = (viewport.width * ratio).floor().max(1.0) as usize;
        self.pixel_height = (viewport.height * ratio).floor().max(1.0) as usize;
        self.rgba.clear();
        self.rgba.resize(self.pixel_width * self.pixel_height * 4, 0);
    }

    /// Fill with a single colour
    pub fn fill(&mut self, rgba: [u8; 4]) {
        for pixel in self.rgba.chunks_exact_mut(4) {
            pixel.copy_from_slice(&rgba);
        }
    }

    /// Copy externally rendered pixels in. Returns false if the size differs.
    pub fn write_pixels(&mut self, width: usize, height: usize, rgba: &[u8]) -> bool {
        if width != self.pixel_width || height != self.pixel_height || rgba.len() != self.rgba.len()
        {
            return false;
        }
        self.rgba.copy_from_slice(rgba);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.rgba.is_empty()
    }
}
