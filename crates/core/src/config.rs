//! Venue configuration
//!
//! TOML-parseable tuning knobs for seat reclamation, claim retries, and
//! speaking detection. Every field has a default so an empty file is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Runtime configuration for the venue coordination layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Seats occupied longer than this are reclaimed on room entry
    #[serde(default = "default_abandon_threshold_minutes")]
    pub abandon_threshold_minutes: u64,

    /// How many fresh-read claim attempts before giving up as contended
    #[serde(default = "default_claim_attempts")]
    pub claim_attempts: u32,

    /// Mean spectrum magnitude above which the local user counts as speaking
    #[serde(default = "default_speaking_threshold")]
    pub speaking_threshold: f32,

    /// Microphone spectrum polling cadence in milliseconds
    #[serde(default = "default_spectrum_poll_ms")]
    pub spectrum_poll_ms: u64,
}

fn default_abandon_threshold_minutes() -> u64 {
    30
}

fn default_claim_attempts() -> u32 {
    3
}

fn default_speaking_threshold() -> f32 {
    20.0
}

fn default_spectrum_poll_ms() -> u64 {
    50
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            abandon_threshold_minutes: default_abandon_threshold_minutes(),
            claim_attempts: default_claim_attempts(),
            speaking_threshold: default_speaking_threshold(),
            spectrum_poll_ms: default_spectrum_poll_ms(),
        }
    }
}

impl VenueConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn abandon_threshold(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.abandon_threshold_minutes as i64)
    }
}
