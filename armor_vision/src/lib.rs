// THEORY:
// This file is the main entry point for the `armor_vision` library crate. It
// exposes the `ArmorPipeline` and its configuration as the high-level interface
// of the armor detection and tracking engine.
//
// The crate starts where the colour filter stops: it consumes a binary mask per
// frame and produces a target selection plus a cropping decision for the next
// frame. Colour thresholding, image capture, the actual cropping and the serial
// transmission are the caller's business (see the `visual_tester` crate for a
// replay harness that plays those roles).
//
// The stage modules (`core_modules`) stay public so each stage can be driven and
// tested on its own, but `pipeline` is the intended entry point.

pub mod config;
pub mod core_modules;
pub mod fan_out;
pub mod pipeline;

mod logger;

pub use config::{ConfigError, PipelineConfig};
pub use logger::init_with_level;
pub use pipeline::{ArmorPipeline, FrameReport};
