// THEORY:
// The `pipeline` module is the top-level API of the detection engine. It wires the
// stages of `core_modules` into the per-frame barrier sequence
//
//     mask -> light bars -> armor candidates -> selection -> track gate
//
// and owns the only state that outlives a frame: the selector's last result, the
// track gate and the crop decision for the next frame.
//
// Key architectural principles:
// 1.  **Strict Barriers**: A stage starts only once the previous one has produced
//     its complete output for the frame. Parallelism lives inside the stages.
// 2.  **Borrowed Hand-offs**: Every stage receives its input as a parameter of the
//     call. No stage keeps a reference to another stage's output.
// 3.  **Decide, Don't Cut**: The pipeline never touches pixels outside the mask it
//     is given. It tells the caller where to crop the next frame through
//     `crop()`, and the caller is expected to hand in the mask of that region.

use crate::config::PipelineConfig;
use crate::core_modules::armor_matcher::match_armors;
use crate::core_modules::armor_selector::ArmorSelector;
use crate::core_modules::light_bar_extractor::light_bar_extractor;
use crate::core_modules::track_gate::TrackGate;
use image::GrayImage;
use log::debug;

// Re-export key data structures for the public API.
pub use crate::core_modules::armor_matcher::ArmorCandidate;
pub use crate::core_modules::armor_selector::{SelectionResult, TargetTelemetry};
pub use crate::core_modules::geometry::{Point2i, RectI};
pub use crate::core_modules::light_bar::LightBar;
pub use crate::core_modules::track_gate::{CropDecision, TrackPhase};

/// Everything the pipeline learned from one mask.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// Zero-based index of the processed mask.
    pub frame_index: u64,
    pub light_bars: Vec<LightBar>,
    pub candidates: Vec<ArmorCandidate>,
    pub selection: SelectionResult,
    /// Tracking phase after this frame.
    pub phase: TrackPhase,
    /// Crop to apply to the next frame.
    pub crop: CropDecision,
}

/// The detection and tracking engine.
pub struct ArmorPipeline {
    config: PipelineConfig,
    selector: ArmorSelector,
    track_gate: TrackGate,
    crop: CropDecision,
    frame_count: u64,
}

impl ArmorPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            selector: ArmorSelector::new(config.selector, config.screen),
            track_gate: TrackGate::new(config.track, config.screen),
            crop: CropDecision::full_frame(config.screen),
            frame_count: 0,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The region of the next frame the caller should build its mask from.
    pub fn crop(&self) -> CropDecision {
        self.crop
    }

    pub fn phase(&self) -> TrackPhase {
        self.track_gate.phase()
    }

    /// The latest selection, possibly stale when the last frame found nothing.
    pub fn selection(&self) -> &SelectionResult {
        self.selector.result()
    }

    /// Runs one frame.
    ///
    /// `mask` must be the binary mask of the region returned by `crop()` before
    /// this call; its pixel coordinates are relative to that region.
    pub async fn process_mask(&mut self, mask: &GrayImage) -> FrameReport {
        let frame_index = self.frame_count;
        self.frame_count += 1;
        let offset = self.crop.offset;

        // Stage 1: Light bars
        let light_bars = light_bar_extractor::extract(mask, &self.config.light_bar).await;

        // Stage 2: Armor candidates
        let candidates = match_armors(&light_bars, &self.config.matcher).await;

        // Stage 3: Target selection
        let selection = *self.selector.select(&candidates, offset).await;

        // Stage 4: Cropping decision for the next frame
        self.crop = self.track_gate.update(&selection);

        debug!(
            "frame {}: {} light bars, {} candidates, found {}, phase {:?}",
            frame_index,
            light_bars.len(),
            candidates.len(),
            selection.found,
            self.track_gate.phase()
        );

        FrameReport {
            frame_index,
            light_bars,
            candidates,
            selection,
            phase: self.track_gate.phase(),
            crop: self.crop,
        }
    }
}
