//! Runtime settings
//!
//! Settings are read from a JSON document. Every field has a default, so an
//! empty object (or a missing file section) yields a working configuration.

use crate::utils::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for the capture, analysis and messaging pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// How long the orchestrator waits for a frame before starting a new cycle
    pub frame_timeout_ms: u64,

    /// Sleep between failed capture attempts
    pub capture_retry_backoff_ms: u64,

    /// Minimum spacing between two power-off polls
    pub power_off_interval_secs: u64,

    /// Consecutive positive polls required to declare power-off
    pub power_off_threshold: u32,

    /// Capacity of the publisher worker queue
    pub publisher_queue_capacity: usize,

    /// Default capacity of an event bus subscription
    pub subscription_capacity: usize,

    /// Capacity of the command bus request queue
    pub command_queue_capacity: usize,

    /// Recognition attempts before the weapon sub-task gives up
    pub weapon_max_attempts: u32,

    /// Score at which a slot's weapon guess is considered final
    pub weapon_score_threshold: f64,

    /// Frame time before an action that failed fatally is sent to the recorder again
    pub recorder_retry_backoff_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frame_timeout_ms: 500,
            capture_retry_backoff_ms: 100,
            power_off_interval_secs: 5,
            power_off_threshold: 3,
            publisher_queue_capacity: 256,
            subscription_capacity: 64,
            command_queue_capacity: 32,
            weapon_max_attempts: 5,
            weapon_score_threshold: 0.8,
            recorder_retry_backoff_secs: 30,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&content)?;
        tracing::info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Parse and validate settings from a JSON string
    pub fn from_json_str(content: &str) -> AppResult<Self> {
        let settings: Settings = serde_json::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would stall or disable the pipeline
    pub fn validate(&self) -> AppResult<()> {
        let checks = [
            ("publisherQueueCapacity", self.publisher_queue_capacity == 0),
            ("subscriptionCapacity", self.subscription_capacity == 0),
            ("commandQueueCapacity", self.command_queue_capacity == 0),
            ("powerOffThreshold", self.power_off_threshold == 0),
            ("frameTimeoutMs", self.frame_timeout_ms == 0),
        ];
        if let Some((name, _)) = checks.iter().find(|(_, invalid)| *invalid) {
            return Err(AppError::Config(format!("{} must be greater than zero", name)));
        }
        if !(0.0..=1.0).contains(&self.weapon_score_threshold) {
            return Err(AppError::Config(
                "weaponScoreThreshold must be within 0.0..=1.0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn capture_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.capture_retry_backoff_ms)
    }

    pub fn power_off_interval(&self) -> Duration {
        Duration::from_secs(self.power_off_interval_secs)
    }

    pub fn recorder_retry_backoff(&self) -> Duration {
        Duration::from_secs(self.recorder_retry_backoff_secs)
    }
}
