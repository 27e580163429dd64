// THEORY:
// The armor selector turns the frame's candidate list into at most one target.
// It has no number recognition, so it recommends the plate that looks biggest and
// sits closest to the screen centre, then derives everything the rest of the
// system needs from that single choice.
//
// Key architectural principles:
// 1.  **Scoring**: `score = span * bar_length / offset_distance^2`, where `span` is
//     the distance between the two bar centres, `bar_length` the longer normalized
//     bar, and `offset_distance` the distance from the candidate's midpoint (moved
//     to full-frame coordinates by the crop offset) to the screen centre. A
//     candidate sitting on the centre scores +inf instead of dividing by zero.
// 2.  **Parallel Reduction**: Candidates are scored on the worker pool into a
//     priority sink. The maximum score is deterministic; which of several equal
//     scores wins is not, and nothing may depend on it.
// 3.  **Footprint & Interest Area**: The eight raw corners of the winner are fitted
//     with a minimum-area rectangle whose axis-aligned bounding box is the
//     footprint. The interest area is the footprint expanded, floored to the
//     locking-box minimum, centred on the footprint in full-frame coordinates, then
//     clamped: first the origin to >= 0, then the size to the screen.
// 4.  **Range**: `distance = A * exp(-B * footprint.height) + C`, in centimetres.
// 5.  **Stale Preservation**: A frame without candidates only clears `found`. The
//     previous centre, distance and interest area stay put so a single missed frame
//     does not zero them.

use crate::config::{ScreenSize, SelectorParams};
use crate::core_modules::armor_matcher::ArmorCandidate;
use crate::core_modules::geometry::{min_area_rect, Point2i, RectI};
use crate::fan_out::{for_each_parallel, MaxSink};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Offset distances below this count as "on the screen centre".
pub const MIN_OFFSET_DISTANCE: f64 = 1e-6;

/// The selector's output for one frame. The only detection state that outlives
/// the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Whether a target was selected in the latest frame.
    pub found: bool,
    /// Aim point in full-frame pixels.
    pub center: Point2i,
    /// Estimated range in centimetres (metre-level accuracy).
    pub distance: i32,
    /// Region to search in the next frame, in full-frame pixels.
    pub interest_area: RectI,
}

/// The plain numeric fields handed to the transmitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetTelemetry {
    pub found: bool,
    pub x: u16,
    pub y: u16,
    pub distance: u16,
}

impl SelectionResult {
    /// Projects the result onto the transmitter's field widths.
    pub fn telemetry(&self) -> TargetTelemetry {
        let clamp = |v: i32| v.clamp(0, u16::MAX as i32) as u16;
        TargetTelemetry {
            found: self.found,
            x: clamp(self.center.x),
            y: clamp(self.center.y),
            distance: clamp(self.distance),
        }
    }
}

/// A candidate paired with its score. Ordered by score alone.
#[derive(Debug, Clone, Copy)]
pub struct ScoredCandidate {
    pub score: f64,
    pub candidate: ArmorCandidate,
}

impl PartialEq for ScoredCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredCandidate {}

impl PartialOrd for ScoredCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.total_cmp(&other.score)
    }
}

/// Size-and-centering score of a candidate. Higher is better.
pub fn score_candidate(candidate: &ArmorCandidate, offset: Point2i, screen: ScreenSize) -> f64 {
    let midpoint = candidate.midpoint();
    let dx = midpoint.x as f64 + offset.x as f64 - screen.width as f64 / 2.0;
    let dy = midpoint.y as f64 + offset.y as f64 - screen.height as f64 / 2.0;
    let offset_distance = (dx * dx + dy * dy).sqrt();
    if offset_distance < MIN_OFFSET_DISTANCE {
        return f64::INFINITY;
    }
    candidate.span() as f64 * candidate.bar_length() as f64 / (offset_distance * offset_distance)
}

/// Axis-aligned bounding box of the minimum-area rectangle around both bars'
/// raw corners, in crop coordinates.
pub fn footprint(candidate: &ArmorCandidate) -> RectI {
    min_area_rect(&candidate.vertices()).bounding_rect()
}

/// Monocular range model `A * exp(-B * height) + C`, truncated to centimetres.
pub fn estimate_distance(params: &SelectorParams, height: i32) -> i32 {
    (params.distance_a * (-params.distance_b * height as f64).exp() + params.distance_c) as i32
}

/// Picks the best armor candidate each frame and remembers the last pick.
pub struct ArmorSelector {
    params: SelectorParams,
    screen: ScreenSize,
    result: SelectionResult,
}

impl ArmorSelector {
    pub fn new(params: SelectorParams, screen: ScreenSize) -> Self {
        Self {
            params,
            screen,
            result: SelectionResult::default(),
        }
    }

    pub fn result(&self) -> &SelectionResult {
        &self.result
    }

    /// Scores all candidates and updates the selection.
    ///
    /// `offset` is the position of the processed crop inside the full frame.
    pub async fn select(
        &mut self,
        candidates: &[ArmorCandidate],
        offset: Point2i,
    ) -> &SelectionResult {
        let Some(best) = self.best_candidate(candidates, offset).await else {
            self.result.found = false;
            return &self.result;
        };

        let candidate = best.candidate;
        let footprint = footprint(&candidate);
        let midpoint = candidate.midpoint();

        self.result = SelectionResult {
            found: true,
            center: Point2i::new(midpoint.x as i32 + offset.x, midpoint.y as i32 + offset.y),
            distance: estimate_distance(&self.params, footprint.height),
            interest_area: self.interest_area(footprint, offset),
        };
        debug!(
            "selected armor at ({}, {}), score {:.4}, footprint {}x{}, {} cm",
            self.result.center.x,
            self.result.center.y,
            best.score,
            footprint.width,
            footprint.height,
            self.result.distance
        );
        &self.result
    }

    async fn best_candidate(
        &self,
        candidates: &[ArmorCandidate],
        offset: Point2i,
    ) -> Option<ScoredCandidate> {
        if candidates.is_empty() {
            return None;
        }

        let sink = MaxSink::with_capacity(candidates.len());
        let output = sink.clone();
        let screen = self.screen;
        for_each_parallel(candidates.to_vec(), move |candidate| {
            output.push(ScoredCandidate {
                score: score_candidate(&candidate, offset, screen),
                candidate,
            });
        })
        .await;

        sink.pop_max()
    }

    /// Expands the footprint into the next frame's search region.
    pub fn interest_area(&self, footprint: RectI, offset: Point2i) -> RectI {
        let width = ((footprint.width as f64 * (self.params.width_expand_ratio + 1.0)) as i32)
            .max(self.params.locking_box_min_width);
        let height = ((footprint.height as f64 * (self.params.height_expand_ratio + 1.0)) as i32)
            .max(self.params.locking_box_min_height);

        let x = (offset.x as f64 + footprint.x as f64 - 0.5 * (width - footprint.width) as f64) as i32;
        let y = (offset.y as f64 + footprint.y as f64 - 0.5 * (height - footprint.height) as f64) as i32;

        // Origin first, then size: the order decides the result near the edges.
        let mut area = RectI::new(x.max(0), y.max(0), width, height);
        if area.x + area.width > self.screen.width {
            area.width = (self.screen.width - area.x).max(0);
        }
        if area.y + area.height > self.screen.height {
            area.height = (self.screen.height - area.y).max(0);
        }
        area
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::geometry::{OrientedRect, Point2f};
    use crate::core_modules::light_bar::LightBar;
    use approx::assert_relative_eq;

    fn upright_bar(x: f32, y: f32, length: f32, width: f32) -> LightBar {
        LightBar::from_rect(OrientedRect::new(Point2f::new(x, y), width, length, 0.0))
    }

    fn candidate_at(x: f32, y: f32, span: f32, length: f32) -> ArmorCandidate {
        ArmorCandidate {
            first: upright_bar(x - span / 2.0, y, length, 4.0),
            second: upright_bar(x + span / 2.0, y, length, 4.0),
        }
    }

    fn selector() -> ArmorSelector {
        ArmorSelector::new(SelectorParams::default(), ScreenSize::default())
    }

    #[test]
    fn distance_model_boundaries() {
        let params = SelectorParams::default();
        assert_eq!(estimate_distance(&params, 0), (params.distance_a + params.distance_c) as i32);
        let mut previous = i32::MAX;
        for height in (0..200).step_by(5) {
            let d = estimate_distance(&params, height);
            assert!(d <= previous);
            previous = d;
        }
        assert!(estimate_distance(&params, 10) > estimate_distance(&params, 40));
    }

    #[test]
    fn score_prefers_bigger_and_more_central() {
        let screen = ScreenSize::default();
        let origin = Point2i::default();
        let central = score_candidate(&candidate_at(700.0, 512.0, 60.0, 30.0), origin, screen);
        let off_centre = score_candidate(&candidate_at(1000.0, 512.0, 60.0, 30.0), origin, screen);
        let bigger = score_candidate(&candidate_at(700.0, 512.0, 120.0, 60.0), origin, screen);
        assert!(central > off_centre);
        assert!(bigger > central);
        // span 60 * length 30 / 60^2
        assert_relative_eq!(central, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn score_on_the_screen_centre_is_maximal() {
        let screen = ScreenSize::default();
        let centred = candidate_at(640.0, 512.0, 60.0, 30.0);
        assert_eq!(score_candidate(&centred, Point2i::default(), screen), f64::INFINITY);

        // Same candidate seen through a crop offset.
        let cropped = candidate_at(40.0, 12.0, 60.0, 30.0);
        assert_eq!(score_candidate(&cropped, Point2i::new(600, 500), screen), f64::INFINITY);
    }

    #[test]
    fn interest_area_is_floored_centred_and_clamped() {
        let selector = selector();

        let floored = selector.interest_area(RectI::new(600, 500, 40, 20), Point2i::default());
        assert_eq!(floored, RectI::new(500, 450, 240, 120));

        let expanded = selector.interest_area(RectI::new(400, 300, 200, 100), Point2i::new(10, 20));
        assert_eq!(expanded, RectI::new(310, 270, 400, 200));

        let top_left = selector.interest_area(RectI::new(10, 10, 40, 20), Point2i::default());
        assert_eq!(top_left, RectI::new(0, 0, 240, 120));

        let bottom_right = selector.interest_area(RectI::new(1250, 1000, 20, 20), Point2i::default());
        assert_eq!(bottom_right, RectI::new(1140, 950, 140, 74));

        // Expands to 1400 wide at x = -60. The origin moves to 0 before the width
        // is cut back, so the area spans the screen exactly (1340 the other way).
        let wide = selector.interest_area(RectI::new(290, 300, 700, 100), Point2i::default());
        assert_eq!(wide, RectI::new(0, 250, 1280, 200));
    }

    #[tokio::test]
    async fn empty_input_keeps_previous_fields() {
        let mut selector = selector();
        let first = *selector
            .select(&[candidate_at(700.0, 500.0, 60.0, 30.0)], Point2i::default())
            .await;
        assert!(first.found);

        let second = *selector.select(&[], Point2i::default()).await;
        assert!(!second.found);
        assert_eq!(second.center, first.center);
        assert_eq!(second.distance, first.distance);
        assert_eq!(second.interest_area, first.interest_area);
    }

    #[tokio::test]
    async fn empty_input_on_a_fresh_selector_reports_nothing() {
        let mut selector = selector();
        assert_eq!(*selector.select(&[], Point2i::default()).await, SelectionResult::default());
    }

    #[tokio::test]
    async fn selection_reports_offset_centre_footprint_range() {
        let mut selector = selector();
        let candidate = candidate_at(100.0, 80.0, 60.0, 31.0);
        let result = *selector.select(&[candidate], Point2i::new(300, 200)).await;

        assert!(result.found);
        assert_eq!(result.center, Point2i::new(400, 280));

        let fp = footprint(&candidate);
        assert_eq!(result.distance, estimate_distance(&SelectorParams::default(), fp.height));
        assert_eq!(result.interest_area, selector.interest_area(fp, Point2i::new(300, 200)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn best_score_is_stable_across_runs() {
        let selector = selector();
        let candidates: Vec<ArmorCandidate> = (0..40)
            .map(|i| candidate_at(100.0 + i as f32 * 25.0, 300.0 + (i % 7) as f32 * 30.0, 50.0, 25.0))
            .collect();
        let expected = candidates
            .iter()
            .map(|c| score_candidate(c, Point2i::default(), selector.screen))
            .fold(f64::NEG_INFINITY, f64::max);

        for _ in 0..20 {
            let best = selector
                .best_candidate(&candidates, Point2i::default())
                .await
                .map(|b| b.score);
            assert_eq!(best, Some(expected));
        }
    }

    #[test]
    fn telemetry_clamps_to_u16() {
        let result = SelectionResult {
            found: true,
            center: Point2i::new(-5, 70_000),
            distance: 321,
            interest_area: RectI::default(),
        };
        assert_eq!(
            result.telemetry(),
            TargetTelemetry {
                found: true,
                x: 0,
                y: u16::MAX,
                distance: 321
            }
        );
    }
}
