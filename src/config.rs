//! Decoder tuning
//!
//! Every bound used by the heuristic scanners lives here so that logs from
//! other editor builds can be inspected without a rebuild.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Strategy for decoding the fields that follow an entry's leading strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TrailerProfile {
    /// Fields follow the author/collection string in a strict order.
    #[default]
    FixedOffset,
    /// Fields are searched anywhere inside the entry region.
    FreeScan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub profile: TrailerProfile,
    /// Longest entry name accepted by the boundary heuristic.
    pub max_name_len: u16,
    /// Exclusive upper bound for the u32 that follows an entry name.
    pub max_secondary_value: u32,
    pub max_direction: u16,
    /// Exclusive upper bound for each grid coordinate component.
    pub max_grid_component: u32,
    pub position_bound: f32,
    /// Radians.
    pub rotation_bound: f32,
    pub position_candidate_limit: usize,
    pub transform_candidate_limit: usize,
    pub lp_string_limit: usize,
    pub ref_limit: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            profile: TrailerProfile::FixedOffset,
            max_name_len: 96,
            max_secondary_value: 1 << 16,
            max_direction: 7,
            max_grid_component: 4096,
            position_bound: 100_000.0,
            rotation_bound: 3.5,
            position_candidate_limit: 8,
            transform_candidate_limit: 3,
            lp_string_limit: 256,
            ref_limit: 16,
        }
    }
}

impl DecoderConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a (possibly partial) JSON document; missing keys keep defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_profile(mut self, profile: TrailerProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_name_len == 0 {
            return Err(Error::Config("max_name_len must be at least 1".into()));
        }
        if self.max_grid_component == 0 {
            return Err(Error::Config("max_grid_component must be at least 1".into()));
        }
        for (name, v) in [("position_bound", self.position_bound), ("rotation_bound", self.rotation_bound)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(Error::Config(format!("{name} must be a positive finite number, got {v}")));
            }
        }
        Ok(())
    }
}
