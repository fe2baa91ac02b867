//! Page-space to overlay-space geometry
//!
//! Page space has its origin at the bottom-left corner and is measured in
//! document units. Overlay space has its origin at the top-left corner of the
//! rendered page and is measured in CSS pixels at the current scale.

use crate::types::FieldRect;

/// Size of a page rendered at a given scale, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

impl Viewport {
    /// Viewport for a page of the given native (1.0x) size
    pub fn from_native(native_width: f32, native_height: f32, scale: f32) -> Self {
        Self {
            width: native_width * scale,
            height: native_height * scale,
            scale,
        }
    }
}

/// Placement of an overlay control, top-left origin, CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OverlayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Map a field rectangle onto the overlay of a page rendered at `scale`.
///
/// `viewport_height` is the page height at that same scale; it changes with
/// every zoom step, so placements are never reused across scales.
pub fn place_overlay(rect: &FieldRect, viewport_height: f32, scale: f32) -> OverlayRect {
    OverlayRect {
        left: rect.left * scale,
        top: viewport_height - rect.top * scale,
        width: rect.width() * scale,
        height: rect.height() * scale,
    }
}

/// Recover the page-space rectangle of a placed overlay
pub fn field_rect_from_overlay(
    overlay: &OverlayRect,
    viewport_height: f32,
    scale: f32,
) -> FieldRect {
    let left = overlay.left / scale;
    let top = (viewport_height - overlay.top) / scale;
    FieldRect {
        left,
        bottom: top - overlay.height / scale,
        right: left + overlay.width / scale,
        top,
    }
}
