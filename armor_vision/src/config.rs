// THEORY:
// The `config` module gathers every tunable threshold of the detection and
// tracking stages. The stages consume these values as given: range checking is
// the caller's job, typically a settings file prepared per enemy colour.
//
// All parameter structs deserialize with `#[serde(default)]`, so a settings file
// only needs to mention the values it overrides.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Errors raised while loading a configuration file.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Dimensions of the full camera frame in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 1024,
        }
    }
}

/// Thresholds for turning mask contours into light bars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightBarParams {
    /// Minimum contour area in square pixels.
    pub min_area: f64,
    /// Minimum ratio of contour area to enclosing-rectangle area, in percent.
    pub min_filling_ratio: f64,
}

impl Default for LightBarParams {
    fn default() -> Self {
        Self {
            min_area: 10.0,
            min_filling_ratio: 50.0,
        }
    }
}

/// A pair of bounds on a ratio expressed in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioBand {
    pub min: f64,
    pub max: f64,
}

impl RatioBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `min <= value <= max`
    pub fn contains_inclusive(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// `min < value < max`
    pub fn contains_exclusive(&self, value: f64) -> bool {
        value > self.min && value < self.max
    }
}

/// Geometric gates deciding which light-bar pairs form an armor plate.
///
/// All ratios are in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherParams {
    /// Maximum difference between the two normalized angles, in degrees.
    pub max_angle_difference: f64,
    /// Maximum vertical centre offset relative to the longer bar. Suppresses
    /// noise pairings and the three-bar problem.
    pub max_delta_y_height_ratio: f64,
    /// Bar length over centre distance for big armor plates.
    pub big_height_distance: RatioBand,
    /// Bar width over centre distance for big armor plates.
    pub big_width_distance: RatioBand,
    /// Bar length over centre distance for small armor plates.
    pub small_height_distance: RatioBand,
    /// Bar width over centre distance for small armor plates.
    pub small_width_distance: RatioBand,
}

impl Default for MatcherParams {
    fn default() -> Self {
        Self {
            max_angle_difference: 15.0,
            max_delta_y_height_ratio: 30.0,
            big_height_distance: RatioBand::new(0.0, 59.0),
            big_width_distance: RatioBand::new(15.0, 25.0),
            small_height_distance: RatioBand::new(30.0, 100.0),
            small_width_distance: RatioBand::new(5.0, 20.0),
        }
    }
}

/// Interest-area geometry and the monocular range model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorParams {
    pub locking_box_min_width: i32,
    pub locking_box_min_height: i32,
    /// The interest area is the footprint width times `1 + width_expand_ratio`.
    pub width_expand_ratio: f64,
    /// The interest area is the footprint height times `1 + height_expand_ratio`.
    pub height_expand_ratio: f64,
    /// `A` in `d = A * exp(-B * h) + C`, centimetres.
    pub distance_a: f64,
    /// `B` in `d = A * exp(-B * h) + C`, per pixel.
    pub distance_b: f64,
    /// `C` in `d = A * exp(-B * h) + C`, centimetres.
    pub distance_c: f64,
}

impl Default for SelectorParams {
    fn default() -> Self {
        Self {
            locking_box_min_width: 240,
            locking_box_min_height: 120,
            width_expand_ratio: 1.0,
            height_expand_ratio: 1.0,
            distance_a: 1008.28,
            distance_b: 0.08,
            distance_c: 74.43,
        }
    }
}

/// Hysteresis settings for locking onto a target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackGateParams {
    /// Frames a lock survives without a detection.
    pub locking_startup_times: u32,
    /// Consecutive overlapping detections required before locking.
    pub locking_approval_threshold: u32,
    /// Overlap (intersection over current area) above which two consecutive
    /// interest areas count as the same target.
    pub min_intersection_area_ratio: f64,
}

impl Default for TrackGateParams {
    fn default() -> Self {
        Self {
            locking_startup_times: 5,
            locking_approval_threshold: 2,
            min_intersection_area_ratio: 0.6,
        }
    }
}

/// Configuration of the whole detection and tracking pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub screen: ScreenSize,
    pub light_bar: LightBarParams,
    pub matcher: MatcherParams,
    pub selector: SelectorParams,
    pub track: TrackGateParams,
}

impl PipelineConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }
}
