//! Lesion-box overlay geometry.
//!
//! Detection boxes arrive in the radiograph's natural pixel space. A viewer
//! draws the image scaled to its container, so every box is multiplied by
//! the per-axis ratio `displayed / natural` before it is positioned.
//!
//! When the natural size is unknown (image not loaded yet, zero, NaN) the
//! ratio is 1: boxes are drawn unscaled rather than at NaN or infinity.

use serde::Serialize;

use crate::models::{Confidence, Diagnosis, LesionBox};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Natural size reported alongside a diagnosis, if the backend sent it.
    #[must_use]
    pub fn of_diagnosis(diagnosis: &Diagnosis) -> Option<Self> {
        match (diagnosis.image_width, diagnosis.image_height) {
            (Some(w), Some(h)) => Some(Self::new(f64::from(w), f64::from(h))),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scale {
    pub x: f64,
    pub y: f64,
}

impl Scale {
    pub const IDENTITY: Self = Self { x: 1.0, y: 1.0 };
}

/// Per-axis `displayed / natural`, falling back to 1 on any axis whose
/// inputs are unusable.
#[must_use]
pub fn scale_factors(natural: Option<Size>, displayed: Option<Size>) -> Scale {
    let (Some(natural), Some(displayed)) = (natural, displayed) else {
        return Scale::IDENTITY;
    };
    Scale { x: axis_ratio(displayed.width, natural.width), y: axis_ratio(displayed.height, natural.height) }
}

fn axis_ratio(displayed: f64, natural: f64) -> f64 {
    if !natural.is_finite() || natural <= 0.0 || !displayed.is_finite() || displayed < 0.0 {
        return 1.0;
    }
    displayed / natural
}

/// A box in displayed-pixel space, ready for absolute positioning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: Option<Confidence>,
    pub caption: String,
}

#[must_use]
pub fn map_box(lesion: &LesionBox, scale: Scale) -> DisplayBox {
    DisplayBox {
        x: lesion.x * scale.x,
        y: lesion.y * scale.y,
        width: lesion.width * scale.x,
        height: lesion.height * scale.y,
        confidence: lesion.confidence,
        caption: lesion.caption(),
    }
}

#[must_use]
pub fn map_boxes(lesions: &[LesionBox], natural: Option<Size>, displayed: Option<Size>) -> Vec<DisplayBox> {
    let scale = scale_factors(natural, displayed);
    lesions.iter().map(|l| map_box(l, scale)).collect()
}

/// Box position as percentages of the image, for layouts that size the
/// overlay relative to the image element. Needs a usable natural size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[must_use]
pub fn to_percent(lesion: &LesionBox, natural: Size) -> Option<PercentBox> {
    let usable = |v: f64| v.is_finite() && v > 0.0;
    if !usable(natural.width) || !usable(natural.height) {
        return None;
    }
    Some(PercentBox {
        left: lesion.x * 100.0 / natural.width,
        top: lesion.y * 100.0 / natural.height,
        width: lesion.width * 100.0 / natural.width,
        height: lesion.height * 100.0 / natural.height,
    })
}

/// Tracks the current image and container sizes for one viewer. The scale
/// is recomputed on every change; swapping images discards the old natural
/// size immediately.
#[derive(Debug, Clone)]
pub struct OverlayMapper {
    natural: Option<Size>,
    displayed: Option<Size>,
    scale: Scale,
}

impl Default for OverlayMapper {
    fn default() -> Self {
        Self { natural: None, displayed: None, scale: Scale::IDENTITY }
    }
}

impl OverlayMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A new image started loading; its size is not known yet.
    pub fn begin_image_swap(&mut self) {
        self.natural = None;
        self.recompute();
    }

    pub fn image_loaded(&mut self, natural: Size) {
        self.natural = Some(natural);
        self.recompute();
    }

    pub fn container_resized(&mut self, displayed: Size) {
        self.displayed = Some(displayed);
        self.recompute();
    }

    #[must_use]
    pub fn scale(&self) -> Scale {
        self.scale
    }

    #[must_use]
    pub fn map(&self, lesions: &[LesionBox]) -> Vec<DisplayBox> {
        lesions.iter().map(|l| map_box(l, self.scale)).collect()
    }

    fn recompute(&mut self) {
        self.scale = scale_factors(self.natural, self.displayed);
    }
}

#[cfg(test)]
#[path = "overlay_test.rs"]
mod tests;
