// THEORY:
// `core_modules` holds the stages of the per-frame detection chain, ordered as
// the data flows through them:
// mask -> contour -> light_bar_extractor -> armor_matcher -> armor_selector ->
// track_gate. `geometry` and `light_bar` are the shared vocabulary.

pub mod armor_matcher;
pub mod armor_selector;
pub mod contour;
pub mod geometry;
pub mod light_bar;
pub mod light_bar_extractor;
pub mod track_gate;
