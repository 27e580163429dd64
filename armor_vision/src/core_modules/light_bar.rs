// THEORY:
// A `LightBar` is a "dumb" data container for one reflective strip found in the
// current frame's mask. It carries both spellings of its rectangle:
// - `rect`, the raw minimum-area fit, kept for vertex geometry (the selector
//   rebuilds the armor footprint from the raw corners);
// - `feature`, the normalized form, the only form that may be compared across
//   bars (angles, lengths, widths).
// Light bars are immutable once produced and live only for the frame that
// produced them.

use crate::core_modules::geometry::{normalize, GeometryFeature, OrientedRect};

/// One light bar detected in the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightBar {
    /// The raw oriented rectangle as fitted to the contour.
    pub rect: OrientedRect,
    /// The normalized description of `rect`.
    pub feature: GeometryFeature,
}

impl LightBar {
    pub fn from_rect(rect: OrientedRect) -> Self {
        Self {
            rect,
            feature: normalize(&rect),
        }
    }
}
