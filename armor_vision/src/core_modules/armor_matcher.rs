// THEORY:
// The armor matcher pairs light bars into armor-plate candidates. An armor plate
// is bounded by two bars that are roughly parallel, level with each other and
// spaced in proportion to their size.
//
// Key architectural principles:
// 1.  **Prepare Serially, Judge in Parallel**: All n(n-1)/2 unordered pairs are
//     materialized first (cheap), then judged on the worker pool (expensive).
// 2.  **Four Symmetric Gates** on normalized features, any failure rejects:
//     - angle: |angle1 - angle2| <= max_angle_difference;
//     - vertical alignment: |dy| / longest length * 100 <= max_delta_y_height_ratio;
//     - height over distance: longest length / centre distance * 100 inside the big
//       OR the small band, bounds inclusive;
//     - width over distance: widest width / centre distance * 100 inside the big OR
//       the small band, bounds exclusive.
//     The inclusive/exclusive difference between the last two gates is part of the
//     tuned behaviour and is kept as is.
// 3.  **Raw Geometry Survives**: A candidate keeps both bars whole, raw rectangles
//     included, because the selector rebuilds the plate footprint from raw corners.

use crate::config::MatcherParams;
use crate::core_modules::geometry::{GeometryFeature, Point2f};
use crate::core_modules::light_bar::LightBar;
use crate::fan_out::{for_each_parallel, AppendSink};
use log::{debug, trace};

/// An unordered pair of same-frame light bars that passed every gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmorCandidate {
    pub first: LightBar,
    pub second: LightBar,
}

impl ArmorCandidate {
    /// Midpoint of the two bar centres, in crop coordinates.
    pub fn midpoint(&self) -> Point2f {
        self.first.feature.center.midpoint(&self.second.feature.center)
    }

    /// Distance between the two bar centres.
    pub fn span(&self) -> f32 {
        self.first.feature.center.distance(&self.second.feature.center)
    }

    /// The longer of the two bar lengths.
    pub fn bar_length(&self) -> f32 {
        self.first.feature.length.max(self.second.feature.length)
    }

    /// The eight raw corner points of both bars.
    pub fn vertices(&self) -> [Point2f; 8] {
        let a = self.first.rect.points();
        let b = self.second.rect.points();
        [a[0], a[1], a[2], a[3], b[0], b[1], b[2], b[3]]
    }
}

/// Every unordered pair of distinct bars, in index order.
pub fn pair_up(light_bars: &[LightBar]) -> Vec<(LightBar, LightBar)> {
    let n = light_bars.len();
    let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for (i, first) in light_bars.iter().enumerate() {
        for second in &light_bars[i + 1..] {
            pairs.push((*first, *second));
        }
    }
    pairs
}

pub fn angle_gate(a: &GeometryFeature, b: &GeometryFeature, params: &MatcherParams) -> bool {
    let difference = (a.angle as f64 - b.angle as f64).abs();
    difference <= params.max_angle_difference
}

pub fn vertical_alignment_gate(
    a: &GeometryFeature,
    b: &GeometryFeature,
    params: &MatcherParams,
) -> bool {
    let height = a.length.max(b.length) as f64;
    let delta_y = (a.center.y as f64 - b.center.y as f64).abs();
    delta_y / height * 100.0 <= params.max_delta_y_height_ratio
}

pub fn height_distance_gate(
    a: &GeometryFeature,
    b: &GeometryFeature,
    params: &MatcherParams,
) -> bool {
    let height = a.length.max(b.length) as f64;
    let ratio = height / a.center.distance(&b.center) as f64 * 100.0;
    params.big_height_distance.contains_inclusive(ratio)
        || params.small_height_distance.contains_inclusive(ratio)
}

pub fn width_distance_gate(
    a: &GeometryFeature,
    b: &GeometryFeature,
    params: &MatcherParams,
) -> bool {
    let width = a.width.max(b.width) as f64;
    let ratio = width / a.center.distance(&b.center) as f64 * 100.0;
    params.big_width_distance.contains_exclusive(ratio)
        || params.small_width_distance.contains_exclusive(ratio)
}

/// Runs the four gates in order and reports whether the pair is a plausible plate.
pub fn passes_gates(first: &LightBar, second: &LightBar, params: &MatcherParams) -> bool {
    let (a, b) = (&first.feature, &second.feature);

    if !angle_gate(a, b, params) {
        trace!("pair rejected: angle {} vs {}", a.angle, b.angle);
        return false;
    }
    if !vertical_alignment_gate(a, b, params) {
        trace!("pair rejected: vertical offset");
        return false;
    }
    if !height_distance_gate(a, b, params) {
        trace!("pair rejected: height/distance ratio");
        return false;
    }
    if !width_distance_gate(a, b, params) {
        trace!("pair rejected: width/distance ratio");
        return false;
    }
    true
}

/// Matches light bars into armor candidates. Output order is unspecified.
pub async fn match_armors(light_bars: &[LightBar], params: &MatcherParams) -> Vec<ArmorCandidate> {
    let pairs = pair_up(light_bars);
    let pair_count = pairs.len();

    let sink = AppendSink::with_capacity(pair_count);
    let output = sink.clone();
    let params = *params;
    for_each_parallel(pairs, move |(first, second)| {
        if passes_gates(&first, &second, &params) {
            output.push(ArmorCandidate { first, second });
        }
    })
    .await;

    let candidates = sink.take();
    debug!(
        "armor candidates: {} of {} pairs accepted",
        candidates.len(),
        pair_count
    );
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RatioBand;
    use crate::core_modules::geometry::OrientedRect;

    /// An upright bar: raw rectangle reported with the ±90° swap.
    fn bar(x: f32, y: f32, length: f32, width: f32, tilt: f32) -> LightBar {
        LightBar::from_rect(OrientedRect::new(Point2f::new(x, y), width, length, tilt))
    }

    fn typical_pair() -> (LightBar, LightBar) {
        // length 30, width 5, centres 60 apart: h/d = 50 %, w/d = 8.3 %.
        (bar(100.0, 100.0, 30.0, 5.0, 0.0), bar(160.0, 104.0, 28.0, 4.0, 5.0))
    }

    #[test]
    fn pair_count_is_n_choose_two() {
        for n in 0..8usize {
            let bars: Vec<LightBar> = (0..n).map(|i| bar(i as f32 * 10.0, 0.0, 10.0, 2.0, 0.0)).collect();
            assert_eq!(pair_up(&bars).len(), n * n.saturating_sub(1) / 2);
        }
    }

    #[test]
    fn typical_pair_passes() {
        let (a, b) = typical_pair();
        assert!(passes_gates(&a, &b, &MatcherParams::default()));
    }

    #[test]
    fn gates_are_symmetric() {
        let params = MatcherParams::default();
        let bars = [
            bar(100.0, 100.0, 30.0, 5.0, 0.0),
            bar(160.0, 104.0, 28.0, 4.0, 5.0),
            bar(130.0, 140.0, 30.0, 5.0, 25.0),
            bar(105.0, 100.0, 30.0, 12.0, -3.0),
            bar(400.0, 100.0, 30.0, 5.0, 0.0),
            bar(100.0, 100.0, 0.0, 0.0, 0.0),
        ];
        for a in &bars {
            for b in &bars {
                let (fa, fb) = (&a.feature, &b.feature);
                assert_eq!(angle_gate(fa, fb, &params), angle_gate(fb, fa, &params));
                assert_eq!(
                    vertical_alignment_gate(fa, fb, &params),
                    vertical_alignment_gate(fb, fa, &params)
                );
                assert_eq!(
                    height_distance_gate(fa, fb, &params),
                    height_distance_gate(fb, fa, &params)
                );
                assert_eq!(
                    width_distance_gate(fa, fb, &params),
                    width_distance_gate(fb, fa, &params)
                );
                assert_eq!(passes_gates(a, b, &params), passes_gates(b, a, &params));
            }
        }
    }

    #[test]
    fn tilted_bars_fail_the_angle_gate() {
        let params = MatcherParams::default();
        let a = bar(100.0, 100.0, 30.0, 5.0, 0.0);
        let b = bar(160.0, 100.0, 30.0, 5.0, 20.0);
        assert!(!angle_gate(&a.feature, &b.feature, &params));
    }

    #[test]
    fn staggered_bars_fail_the_vertical_gate() {
        let params = MatcherParams::default();
        let a = bar(100.0, 100.0, 30.0, 5.0, 0.0);
        let b = bar(160.0, 110.0, 30.0, 5.0, 0.0);
        assert!(!vertical_alignment_gate(&a.feature, &b.feature, &params));
    }

    #[test]
    fn height_gate_bounds_are_inclusive() {
        let mut params = MatcherParams::default();
        params.big_height_distance = RatioBand::new(50.0, 50.0);
        params.small_height_distance = RatioBand::new(200.0, 300.0);
        // length 30 over distance 60 is exactly 50 %.
        let a = bar(0.0, 0.0, 30.0, 5.0, 0.0);
        let b = bar(60.0, 0.0, 30.0, 5.0, 0.0);
        assert!(height_distance_gate(&a.feature, &b.feature, &params));
    }

    #[test]
    fn width_gate_bounds_are_exclusive() {
        let mut params = MatcherParams::default();
        // width 6 over distance 60 is exactly 10 %.
        let a = bar(0.0, 0.0, 30.0, 6.0, 0.0);
        let b = bar(60.0, 0.0, 30.0, 6.0, 0.0);

        params.big_width_distance = RatioBand::new(10.0, 20.0);
        params.small_width_distance = RatioBand::new(0.0, 10.0);
        assert!(!width_distance_gate(&a.feature, &b.feature, &params));

        params.small_width_distance = RatioBand::new(9.0, 11.0);
        assert!(width_distance_gate(&a.feature, &b.feature, &params));
    }

    #[test]
    fn either_band_is_enough() {
        let params = MatcherParams::default();
        // h/d = 75 %: outside the big band [0, 59], inside the small band [30, 100].
        let a = bar(0.0, 0.0, 30.0, 4.0, 0.0);
        let b = bar(40.0, 0.0, 30.0, 4.0, 0.0);
        assert!(height_distance_gate(&a.feature, &b.feature, &params));
    }

    #[test]
    fn coincident_centres_are_rejected_without_panicking() {
        let params = MatcherParams::default();
        let a = bar(50.0, 50.0, 30.0, 5.0, 0.0);
        assert!(!passes_gates(&a, &a, &params));
        let flat = bar(50.0, 50.0, 0.0, 0.0, 0.0);
        assert!(!passes_gates(&flat, &flat, &params));
    }

    #[tokio::test]
    async fn fewer_than_two_bars_never_match() {
        let mut params = MatcherParams::default();
        params.max_angle_difference = f64::INFINITY;
        assert!(match_armors(&[], &params).await.is_empty());
        assert!(match_armors(&[bar(0.0, 0.0, 10.0, 2.0, 0.0)], &params).await.is_empty());
    }

    #[tokio::test]
    async fn matches_the_plausible_pair_only() {
        let (a, b) = typical_pair();
        let stray = bar(600.0, 300.0, 30.0, 5.0, 0.0);
        let candidates = match_armors(&[a, stray, b], &MatcherParams::default()).await;
        assert_eq!(candidates.len(), 1);
        let found = candidates[0];
        let centres = [found.first.feature.center.x, found.second.feature.center.x];
        assert!(centres.contains(&100.0) && centres.contains(&160.0));
        assert_eq!(found.vertices().len(), 8);
    }
}
