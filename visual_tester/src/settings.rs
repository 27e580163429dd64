// THEORY:
// The tester's settings file: which colour the enemy wears, the HSV window for
// each colour, and the engine's own `PipelineConfig`. Every section is optional
// and falls back to its defaults.

use crate::color_filter::HsvRange;
use anyhow::Context;
use armor_vision::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnemyColor {
    #[default]
    Red,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorProfiles {
    pub red: HsvRange,
    pub blue: HsvRange,
}

impl Default for ColorProfiles {
    fn default() -> Self {
        Self {
            red: HsvRange::red(),
            blue: HsvRange::blue(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TesterSettings {
    pub enemy: EnemyColor,
    pub mask: ColorProfiles,
    pub pipeline: PipelineConfig,
}

impl TesterSettings {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing settings {}", path.display()))
    }

    /// HSV window of the current enemy colour.
    pub fn enemy_range(&self) -> HsvRange {
        match self.enemy {
            EnemyColor::Red => self.mask.red,
            EnemyColor::Blue => self.mask.blue,
        }
    }
}
