//! Recognition tunables.
//!
//! An [`EngineConfig`] is a plain value: requests overlay their
//! [`EngineOverrides`] on the pool's base config and get a fresh copy, so no
//! request ever writes shared state. The detector/recognizer subset of the
//! config is exposed as an [`EngineKey`] for engine caching.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LectioError, Result};

/// Character set the recognizer decodes into.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CharacterSet {
    /// The model's own dictionary.
    Default,
    /// Case-sensitive English letters, digits and ASCII punctuation.
    #[default]
    EnSensitive,
}

impl CharacterSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            CharacterSet::Default => "default",
            CharacterSet::EnSensitive => "en_sensitive",
        }
    }
}

impl fmt::Display for CharacterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CharacterSet {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "ch" => Ok(CharacterSet::Default),
            "en_sensitive" => Ok(CharacterSet::EnSensitive),
            other => Err(format!(
                "char_type must be 'default' or 'en_sensitive', got '{other}'"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EngineConfig {
    pub char_type: CharacterSet,
    /// Detector box score threshold, `0..=1`.
    pub box_thresh: f32,
    /// Detector polygon expansion ratio, `> 0`.
    pub unclip_ratio: f32,
    /// Lines scoring below this are dropped, `0..=1`.
    pub drop_score: f32,
    pub max_text_length: u32,
    /// Run the cleanup filter chain before recognition.
    pub preprocess: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            char_type: CharacterSet::EnSensitive,
            box_thresh: 0.45,
            unclip_ratio: 1.90,
            drop_score: 0.30,
            max_text_length: 128,
            preprocess: true,
        }
    }
}

fn check_unit_interval(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(LectioError::Config(format!(
            "{name} must be between 0 and 1, got {value}"
        )))
    }
}

fn check_unclip_ratio(value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LectioError::Config(format!(
            "unclip_ratio must be greater than 0, got {value}"
        )))
    }
}

fn check_max_text_length(value: u32) -> Result<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(LectioError::Config(
            "max_text_length must be greater than 0".to_string(),
        ))
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        check_unit_interval("box_thresh", self.box_thresh)?;
        check_unclip_ratio(self.unclip_ratio)?;
        check_unit_interval("drop_score", self.drop_score)?;
        check_max_text_length(self.max_text_length)
    }

    /// Returns a copy of `self` with every present override applied.
    pub fn with_overrides(&self, overrides: &EngineOverrides) -> Self {
        Self {
            char_type: overrides.char_type.unwrap_or(self.char_type),
            box_thresh: overrides.box_thresh.unwrap_or(self.box_thresh),
            unclip_ratio: overrides.unclip_ratio.unwrap_or(self.unclip_ratio),
            drop_score: overrides.drop_score.unwrap_or(self.drop_score),
            max_text_length: overrides.max_text_length.unwrap_or(self.max_text_length),
            preprocess: overrides.preprocess.unwrap_or(self.preprocess),
        }
    }

    /// The part of the config a built engine depends on. `preprocess` is
    /// handled before the engine runs and is not part of it.
    pub fn engine_key(&self) -> EngineKey {
        EngineKey {
            char_type: self.char_type,
            box_thresh: self.box_thresh.to_bits(),
            unclip_ratio: self.unclip_ratio.to_bits(),
            drop_score: self.drop_score.to_bits(),
            max_text_length: self.max_text_length,
        }
    }
}

/// Hashable identity of an engine's build parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineKey {
    char_type: CharacterSet,
    box_thresh: u32,
    unclip_ratio: u32,
    drop_score: u32,
    max_text_length: u32,
}

/// Per-request tunables; `None` keeps the base value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineOverrides {
    pub char_type: Option<CharacterSet>,
    pub box_thresh: Option<f32>,
    pub unclip_ratio: Option<f32>,
    pub drop_score: Option<f32>,
    pub max_text_length: Option<u32>,
    pub preprocess: Option<bool>,
}

impl EngineOverrides {
    /// Overlays `higher` on `self`; values present in `higher` win.
    pub fn merge(self, higher: EngineOverrides) -> Self {
        Self {
            char_type: higher.char_type.or(self.char_type),
            box_thresh: higher.box_thresh.or(self.box_thresh),
            unclip_ratio: higher.unclip_ratio.or(self.unclip_ratio),
            drop_score: higher.drop_score.or(self.drop_score),
            max_text_length: higher.max_text_length.or(self.max_text_length),
            preprocess: higher.preprocess.or(self.preprocess),
        }
    }

    /// Range-checks only the values that are present.
    pub fn validate(&self) -> Result<()> {
        if let Some(value) = self.box_thresh {
            check_unit_interval("box_thresh", value)?;
        }
        if let Some(value) = self.unclip_ratio {
            check_unclip_ratio(value)?;
        }
        if let Some(value) = self.drop_score {
            check_unit_interval("drop_score", value)?;
        }
        if let Some(value) = self.max_text_length {
            check_max_text_length(value)?;
        }
        Ok(())
    }
}
