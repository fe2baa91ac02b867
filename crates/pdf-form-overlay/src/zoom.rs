//! Discrete zoom levels
//!
//! The viewer only ever renders at one of a fixed, strictly ascending list of
//! scale factors. Zoom buttons step through the list; container resizes pick
//! the level closest to the scale that would fit the widest page.

use crate::types::{FormError, Result};

/// Default zoom levels, 67% to 400%
pub const DEFAULT_ZOOM_LEVELS: [f32; 13] = [
    0.67, 0.75, 0.8, 0.9, 1.0, 1.1, 1.25, 1.5, 1.75, 2.0, 2.5, 3.0, 4.0,
];

/// Index of 1.0 in [`DEFAULT_ZOOM_LEVELS`]
pub const DEFAULT_ZOOM_INDEX: usize = 4;

/// Zoom state: the allowed levels and the currently selected one
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomController {
    levels: Vec<f32>,
    index: usize,
}

impl Default for ZoomController {
    fn default() -> Self {
        Self {
            levels: DEFAULT_ZOOM_LEVELS.to_vec(),
            index: DEFAULT_ZOOM_INDEX,
        }
    }
}

impl ZoomController {
    pub fn new(levels: Vec<f32>, index: usize) -> Result<Self> {
        validate_levels(&levels)?;
        if index >= levels.len() {
            return Err(FormError::Config(format!(
                "Zoom index {} out of range for {} levels",
                index,
                levels.len()
            )));
        }
        Ok(Self { levels, index })
    }

    pub fn levels(&self) -> &[f32] {
        &self.levels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Scale factor at the current index
    pub fn scale(&self) -> f32 {
        self.levels[self.index]
    }

    pub fn can_zoom_in(&self) -> bool {
        self.index + 1 < self.levels.len()
    }

    pub fn can_zoom_out(&self) -> bool {
        self.index > 0
    }

    /// Step one level up. Returns false at the ceiling.
    pub fn zoom_in(&mut self) -> bool {
        let next = (self.index + 1).min(self.levels.len() - 1);
        self.set_index(next)
    }

    /// Step one level down. Returns false at the floor.
    pub fn zoom_out(&mut self) -> bool {
        let next = self.index.saturating_sub(1);
        self.set_index(next)
    }

    /// Index of the level closest to `target`. Ties go to the lower index.
    pub fn nearest_index(&self, target: f32) -> usize {
        let mut best = 0;
        let mut best_distance = f32::INFINITY;
        for (i, level) in self.levels.iter().enumerate() {
            let distance = (target - level).abs();
            if distance < best_distance {
                best = i;
                best_distance = distance;
            }
        }
        best
    }

    /// Select the level closest to `target`. Returns true if the index moved.
    pub fn snap_to(&mut self, target: f32) -> bool {
        if !target.is_finite() {
            return false;
        }
        let index = self.nearest_index(target);
        self.set_index(index)
    }

    fn set_index(&mut self, index: usize) -> bool {
        if index == self.index {
            return false;
        }
        log::debug!(
            "Zoom {} -> {} ({}x)",
            self.levels[self.index],
            self.levels[index],
            self.levels[index]
        );
        self.index = index;
        true
    }
}

/// Levels must be non-empty, finite, positive and strictly ascending
pub fn validate_levels(levels: &[f32]) -> Result<()> {
    if levels.is_empty() {
        return Err(FormError::Config("No zoom levels specified".to_string()));
    }
    if levels.iter().any(|l| !l.is_finite() || *l <= 0.0) {
        return Err(FormError::Config(
            "Zoom levels must be finite and positive".to_string(),
        ));
    }
    if levels.windows(2).any(|w| w[0] >= w[1]) {
        return Err(FormError::Config(
            "Zoom levels must be strictly ascending".to_string(),
        ));
    }
    Ok(())
}
