// THEORY:
// The track gate is the only stage with memory across frames. It decides whether
// the next frame is processed in full or cropped to the interest area around the
// last selected target: a small state machine fed with one frame's summary at a
// time.
//
// Key architectural principles:
// 1.  **Explicit Phases**: `Searching` (no evidence), `Approving { remaining }`
//     (consecutive overlapping detections still required) and
//     `Locked { remaining }` (missed frames still tolerated).
// 2.  **Earned Lock**: A lock requires `locking_approval_threshold` consecutive
//     detections whose interest area overlaps the previous one by more than
//     `min_intersection_area_ratio` (intersection over the current area). A single
//     lucky detection never crops.
// 3.  **Sticky Lock**: While locked, every detection restores the full allowance
//     of `locking_startup_times` missed frames. A missed frame spends one and still
//     crops around the last known area, including the frame that spends the last
//     one. Only the following miss falls back to the full frame.
// 4.  **Unconditional Memory**: Every detection overwrites the last interest area,
//     whatever the phase.

use crate::config::{ScreenSize, TrackGateParams};
use crate::core_modules::armor_selector::SelectionResult;
use crate::core_modules::geometry::{Point2i, RectI};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Logical tracking state between two frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackPhase {
    #[default]
    Searching,
    Approving { remaining: u32 },
    Locked { remaining: u32 },
}

impl TrackPhase {
    pub fn is_locked(&self) -> bool {
        matches!(self, TrackPhase::Locked { .. })
    }
}

/// Where the cropper should cut the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropDecision {
    pub approved: bool,
    /// Region of the full frame to process, in full-frame pixels.
    pub region: RectI,
    /// Position of `region` in the full frame. Zero when not approved.
    pub offset: Point2i,
}

impl CropDecision {
    /// No cropping: process the whole frame.
    pub fn full_frame(screen: ScreenSize) -> Self {
        Self {
            approved: false,
            region: RectI::new(0, 0, screen.width, screen.height),
            offset: Point2i::default(),
        }
    }

    pub fn around(area: RectI) -> Self {
        Self {
            approved: true,
            region: area,
            offset: area.origin(),
        }
    }
}

/// Share of `current` covered by `previous`. Zero when `current` has no area.
pub fn overlap_ratio(current: &RectI, previous: &RectI) -> f64 {
    let area = current.area();
    if area <= 0 {
        return 0.0;
    }
    current.intersection(previous).area() as f64 / area as f64
}

/// Hysteresis between detections and cropping.
pub struct TrackGate {
    params: TrackGateParams,
    screen: ScreenSize,
    phase: TrackPhase,
    last_interest_area: RectI,
}

impl TrackGate {
    pub fn new(params: TrackGateParams, screen: ScreenSize) -> Self {
        Self {
            params,
            screen,
            phase: TrackPhase::Searching,
            last_interest_area: RectI::default(),
        }
    }

    pub fn phase(&self) -> TrackPhase {
        self.phase
    }

    /// Overlapping detections still needed before a lock.
    pub fn approval_required(&self) -> u32 {
        match self.phase {
            TrackPhase::Approving { remaining } => remaining,
            _ => self.params.locking_approval_threshold,
        }
    }

    /// Missed frames the current lock still tolerates.
    pub fn locking_remain(&self) -> u32 {
        match self.phase {
            TrackPhase::Locked { remaining } => remaining,
            _ => 0,
        }
    }

    pub fn last_interest_area(&self) -> RectI {
        self.last_interest_area
    }

    /// Advances the state machine by one frame.
    pub fn update(&mut self, selection: &SelectionResult) -> CropDecision {
        let approved_area = if selection.found {
            let area = selection.interest_area;
            let approved = self.on_found(&area);
            self.last_interest_area = area;
            approved.then_some(area)
        } else {
            self.on_missed().then_some(self.last_interest_area)
        };

        match approved_area {
            Some(area) => CropDecision::around(area),
            None => CropDecision::full_frame(self.screen),
        }
    }

    fn on_found(&mut self, area: &RectI) -> bool {
        if self.phase.is_locked() {
            self.phase = self.lock();
            return true;
        }

        let ratio = overlap_ratio(area, &self.last_interest_area);
        let remaining = if ratio > self.params.min_intersection_area_ratio {
            self.approval_required().saturating_sub(1)
        } else {
            self.params.locking_approval_threshold
        };
        debug!("track gate: overlap {:.3}, {} approvals remaining", ratio, remaining);

        if remaining == 0 {
            self.phase = self.lock();
            info!(
                "target locked at ({}, {}) {}x{}",
                area.x, area.y, area.width, area.height
            );
            return true;
        }
        self.phase = TrackPhase::Approving { remaining };
        false
    }

    fn on_missed(&mut self) -> bool {
        let TrackPhase::Locked { remaining } = self.phase else {
            return false;
        };
        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            self.phase = TrackPhase::Searching;
            info!("target lock released");
        } else {
            self.phase = TrackPhase::Locked { remaining };
        }
        true
    }

    fn lock(&self) -> TrackPhase {
        match self.params.locking_startup_times {
            0 => TrackPhase::Searching,
            remaining => TrackPhase::Locked { remaining },
        }
    }
}
