// THEORY:
// The frame-rate counter reports throughput and the share of frames with a
// target, once per elapsed second of wall-clock time. Both counts restart after
// every report.

use log::info;
use std::time::{Duration, Instant};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// One reporting window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsSample {
    pub frames: u32,
    /// Percentage of frames in the window with a target found.
    pub found_ratio: f64,
}

pub struct FpsCounter {
    frames: u32,
    found: u32,
    window_start: Instant,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            frames: 0,
            found: 0,
            window_start: now,
        }
    }

    /// Counts a frame and logs a sample when the window is over.
    pub fn tick(&mut self, found: bool) -> Option<FpsSample> {
        let sample = self.tick_at(found, Instant::now());
        if let Some(sample) = sample {
            info!("FPS: {}, found ratio: {:.1}%", sample.frames, sample.found_ratio);
        }
        sample
    }

    pub fn tick_at(&mut self, found: bool, now: Instant) -> Option<FpsSample> {
        self.frames += 1;
        if found {
            self.found += 1;
        }
        if now.duration_since(self.window_start) <= REPORT_INTERVAL {
            return None;
        }

        let sample = FpsSample {
            frames: self.frames,
            found_ratio: self.found as f64 / self.frames as f64 * 100.0,
        };
        *self = Self::starting_at(now);
        Some(sample)
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}
