//! # Configuration Management Module
//!
//! Persistent settings for capture cadence, batching, interaction timing and
//! the collection server address.
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/gesture-logger/config.toml
//! - Linux: ~/.config/gesture-logger/config.toml
//! - Windows: %APPDATA%\gesture-logger\config.toml
//!
//! Missing fields fall back to their defaults so older files keep loading.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "https://gesturelogger.com:8000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the collection server
    pub backend_url: String,
    /// Records per uploaded batch
    pub block_size: usize,
    /// Sample every `capture_period` frames...
    pub capture_period: u64,
    /// ...on frames where `frame % capture_period == capture_phase`
    pub capture_phase: u64,
    /// Rate at which the frame driver ticks the scheduler
    pub frame_rate_hz: u32,
    /// How long hands must rest inside an interact box before it primes
    pub gate_hold_ms: u64,
    /// Interact boxes are evaluated every this many frames
    pub gate_check_period: u64,
    /// Extra time after the last demonstration frame before playback loops
    pub playback_loop_margin_s: f32,
    /// Translation applied to ghost hands during demonstration playback
    pub demonstration_offset: [f32; 3],
    /// Number of gesture classes whose demonstrations stay cached
    pub demonstration_cache_size: usize,
    /// When set, capture data is written here instead of uploaded
    pub archive_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            block_size: 200,
            capture_period: 1,
            capture_phase: 0,
            frame_rate_hz: 72,
            gate_hold_ms: 750,
            gate_check_period: 5,
            playback_loop_margin_s: 0.1,
            demonstration_offset: [0.0, 0.0, -1.0],
            demonstration_cache_size: 16,
            archive_dir: None,
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gesture-logger")
            .join("config.toml")
    }

    /// Load config from the default location, or create default if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, writing the defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Self = toml::from_str(&contents).map_err(ConfigError::ParseFailed)?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    /// Reject settings the scheduler or capture would fail on later
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: String| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid { field, reason })
        };

        if self.capture_period == 0 {
            return invalid("capture_period", "must be at least 1".to_string());
        }
        if self.capture_phase >= self.capture_period {
            return invalid(
                "capture_phase",
                format!("must be below capture_period ({})", self.capture_period),
            );
        }
        if self.gate_check_period == 0 {
            return invalid("gate_check_period", "must be at least 1".to_string());
        }
        if self.frame_rate_hz == 0 {
            return invalid("frame_rate_hz", "must be at least 1".to_string());
        }
        if self.block_size == 0 {
            return invalid("block_size", "must be at least 1".to_string());
        }
        if !(self.playback_loop_margin_s.is_finite() && self.playback_loop_margin_s >= 0.0) {
            return invalid("playback_loop_margin_s", "must be a non-negative number".to_string());
        }
        Ok(())
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }

    /// Interval between frame driver ticks
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate_hz.max(1)))
    }

    pub fn gate_hold(&self) -> Duration {
        Duration::from_millis(self.gate_hold_ms)
    }
}
