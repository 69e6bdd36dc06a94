use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::gate::DEFAULT_DISTANCE_THRESHOLD_M;
use crate::history::DEFAULT_HISTORY_CAP;
use crate::projection::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};

pub const DEFAULT_PROBE_URL: &str = "https://signal-speed-bot.glitch.me/1MB.test";

/// What to do after a failed probe
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Record nothing for the cycle and wait for the next movement
    #[default]
    Skip,
    /// Re-probe up to `attempts` more times within the same cycle
    Immediate { attempts: u32 },
    /// Let the next valid fix through the gate even without movement
    NextUpdate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub probe_url: String,
    /// Overrides the received body length when computing Mbps
    pub payload_bytes: Option<u64>,
    pub probe_timeout_secs: u64,
    pub distance_threshold_m: f64,
    pub history_cap: usize,
    pub frame_width: f64,
    pub frame_height: f64,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probe_url: DEFAULT_PROBE_URL.to_string(),
            payload_bytes: None,
            probe_timeout_secs: 30,
            distance_threshold_m: DEFAULT_DISTANCE_THRESHOLD_M,
            history_cap: DEFAULT_HISTORY_CAP,
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            retry: RetryPolicy::Skip,
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file. Missing fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        let config: EngineConfig =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_url.trim().is_empty() {
            return Err(ConfigError::InvalidParameters(
                "probe_url must not be empty".to_string(),
            ));
        }
        if !(self.distance_threshold_m.is_finite() && self.distance_threshold_m >= 0.0) {
            return Err(ConfigError::InvalidParameters(format!(
                "distance_threshold_m must be a non-negative number, got {}",
                self.distance_threshold_m
            )));
        }
        if self.history_cap == 0 {
            return Err(ConfigError::InvalidParameters(
                "history_cap must be at least 1".to_string(),
            ));
        }
        if !(self.frame_width > 0.0 && self.frame_height > 0.0)
            || !self.frame_width.is_finite()
            || !self.frame_height.is_finite()
        {
            return Err(ConfigError::InvalidParameters(format!(
                "frame dimensions must be positive, got {}x{}",
                self.frame_width, self.frame_height
            )));
        }
        if self.probe_timeout_secs == 0 {
            return Err(ConfigError::InvalidParameters(
                "probe_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
