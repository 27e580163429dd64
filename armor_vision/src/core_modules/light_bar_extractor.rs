// THEORY:
// The light-bar extractor is the first stage of the per-frame pipeline. It takes
// the binary mask produced by the colour filter and keeps only the regions that
// look like a single upright, well-filled strip.
//
// Per contour, in order (the first failing test drops the contour silently):
// 1.  Area below `min_area`.
// 2.  Degenerate enclosing rectangle (area <= 0).
// 3.  Fill ratio (contour area / enclosing area, percent) below `min_filling_ratio`.
// 4.  Normalized long-axis angle outside [20, 160]: near-horizontal blobs cannot
//     be light bars.
//
// Contours are found serially, then evaluated in parallel. Each evaluation is
// independent, so the output order is unspecified. This is a stateless utility
// with no memory of earlier frames.

use crate::core_modules::contour::Contour;
use crate::core_modules::light_bar::LightBar;

pub mod light_bar_extractor {
    use super::*;
    use crate::config::LightBarParams;
    use crate::core_modules::contour::find_external_contours;
    use crate::core_modules::geometry::min_area_rect;
    use crate::fan_out::{for_each_parallel, AppendSink};
    use image::GrayImage;
    use log::debug;

    /// Smallest accepted long-axis angle, in degrees.
    pub const MIN_BAR_ANGLE: f32 = 20.0;
    /// Largest accepted long-axis angle, in degrees.
    pub const MAX_BAR_ANGLE: f32 = 160.0;

    /// Finds every light bar in a binary mask (0 / 255).
    pub async fn extract(mask: &GrayImage, params: &LightBarParams) -> Vec<LightBar> {
        let contours = find_external_contours(mask);
        let contour_count = contours.len();

        let sink = AppendSink::with_capacity(contour_count);
        let output = sink.clone();
        let params = *params;
        for_each_parallel(contours, move |contour| {
            if let Some(bar) = evaluate_contour(&contour, &params) {
                output.push(bar);
            }
        })
        .await;

        let light_bars = sink.take();
        debug!(
            "light bars: {} of {} contours accepted",
            light_bars.len(),
            contour_count
        );
        light_bars
    }

    /// Applies the light-bar thresholds to a single contour.
    pub fn evaluate_contour(contour: &Contour, params: &LightBarParams) -> Option<LightBar> {
        let area = contour.area();
        if area < params.min_area {
            return None;
        }

        let rect = min_area_rect(&contour.to_points2f());
        let enclosing_area = rect.area() as f64;
        if enclosing_area <= 0.0 {
            return None;
        }
        if area / enclosing_area * 100.0 < params.min_filling_ratio {
            return None;
        }

        let bar = LightBar::from_rect(rect);
        if bar.feature.angle < MIN_BAR_ANGLE || bar.feature.angle > MAX_BAR_ANGLE {
            return None;
        }
        Some(bar)
    }
}
