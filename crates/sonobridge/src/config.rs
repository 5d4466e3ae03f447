//! Configuration for the sonobridge engine
//!
//! Compile-time defaults live in the nested constant modules. `BridgeConfig`
//! carries the values a host may tune at construction time.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{BridgeError, Result};

/// Capture-related configuration
pub mod capture {
    /// Upper bound on the capture buffer size (bytes), for latency control
    pub const MAX_CAPTURE_SIZE: usize = 1024;

    /// Session identifier meaning "analyze the default output mix"
    pub const DEFAULT_SESSION_ID: i32 = 0;
}

/// Band aggregation configuration
pub mod bands {
    /// Number of output bands in every `BandVector`
    pub const BAND_COUNT: usize = 5;

    /// Divisor applied after `ln(mean + 1)` before clamping to 0.0..=1.0
    pub const LOG_SCALE_DIVISOR: f64 = 4.0;

    /// Period unit of the no-signal oscillation (ms per radian)
    pub const FALLBACK_PERIOD_MS: f64 = 100.0;

    /// Phase offset between neighbouring bands in the no-signal oscillation
    pub const FALLBACK_PHASE_STEP: f64 = 0.5;

    /// Lower bound of the no-signal oscillation
    pub const FALLBACK_MIN: f64 = 0.3;

    /// Upper bound of the no-signal oscillation
    pub const FALLBACK_MAX: f64 = 0.6;
}

/// Emission cadence configuration
pub mod emission {
    /// Minimum interval between delivered vectors (~60 updates/second)
    pub const MIN_INTERVAL_MS: u64 = 16;
}

/// Audio-session configuration
pub mod session {
    /// Safety timeout after which a held wake lock expires on its own
    pub const WAKE_LOCK_TIMEOUT_SECS: u64 = 10 * 60;

    /// Tag attached to wake-lock acquisitions
    pub const WAKE_LOCK_TAG: &str = "sonobridge::BackgroundAudioWakeLock";

    /// Request code attached to capture-permission prompts
    pub const PERMISSION_REQUEST_CODE: i32 = 12345;
}

/// Control-thread configuration
pub mod engine {
    /// Housekeeping cadence of the control thread (wake-lock expiry checks)
    pub const CONTROL_TICK_MS: u64 = 250;

    /// Capacity of the command queue into the control thread
    pub const COMMAND_QUEUE_CAPACITY: usize = 32;

    /// Capacity of the outbound event queue; events past this are dropped
    pub const EVENT_QUEUE_CAPACITY: usize = 256;

    /// Maximum time a command caller waits for the control thread's reply
    pub const REPLY_TIMEOUT_MS: u64 = 2000;
}

/// Runtime configuration passed to the engine at construction
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BridgeConfig {
    /// Ceiling on the OS capture size
    #[serde(default = "default_max_capture_size")]
    pub max_capture_size: usize,

    /// Minimum interval between delivered normal vectors
    #[serde(default = "default_min_emission_interval_ms")]
    pub min_emission_interval_ms: u64,

    /// Wake-lock safety timeout
    #[serde(default = "default_wake_lock_timeout_secs")]
    pub wake_lock_timeout_secs: u64,

    /// Tag passed to the platform with each wake-lock acquisition
    #[serde(default = "default_wake_lock_tag")]
    pub wake_lock_tag: String,

    /// Request code used for capture-permission prompts
    #[serde(default = "default_permission_request_code")]
    pub permission_request_code: i32,

    /// Control-thread housekeeping cadence
    #[serde(default = "default_control_tick_ms")]
    pub control_tick_ms: u64,
}

fn default_max_capture_size() -> usize {
    capture::MAX_CAPTURE_SIZE
}

fn default_min_emission_interval_ms() -> u64 {
    emission::MIN_INTERVAL_MS
}

fn default_wake_lock_timeout_secs() -> u64 {
    session::WAKE_LOCK_TIMEOUT_SECS
}

fn default_wake_lock_tag() -> String {
    session::WAKE_LOCK_TAG.to_string()
}

fn default_permission_request_code() -> i32 {
    session::PERMISSION_REQUEST_CODE
}

fn default_control_tick_ms() -> u64 {
    engine::CONTROL_TICK_MS
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_capture_size: default_max_capture_size(),
            min_emission_interval_ms: default_min_emission_interval_ms(),
            wake_lock_timeout_secs: default_wake_lock_timeout_secs(),
            wake_lock_tag: default_wake_lock_tag(),
            permission_request_code: default_permission_request_code(),
            control_tick_ms: default_control_tick_ms(),
        }
    }
}

impl BridgeConfig {
    /// Parse a TOML document; missing keys fall back to the defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_capture_size < 2 {
            return Err(BridgeError::Config(format!(
                "max_capture_size must be at least 2, got {}",
                self.max_capture_size
            )));
        }
        if self.wake_lock_timeout_secs == 0 {
            return Err(BridgeError::Config(
                "wake_lock_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.control_tick_ms == 0 {
            return Err(BridgeError::Config(
                "control_tick_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn min_emission_interval(&self) -> Duration {
        Duration::from_millis(self.min_emission_interval_ms)
    }

    pub fn wake_lock_timeout(&self) -> Duration {
        Duration::from_secs(self.wake_lock_timeout_secs)
    }

    pub fn control_tick(&self) -> Duration {
        Duration::from_millis(self.control_tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Defaults ---

    #[test]
    fn default_matches_constants() {
        let config = BridgeConfig::default();
        assert_eq!(config.max_capture_size, 1024);
        assert_eq!(config.min_emission_interval_ms, 16);
        assert_eq!(config.wake_lock_timeout_secs, 600);
        assert_eq!(config.permission_request_code, 12345);
        assert_eq!(config.wake_lock_tag, session::WAKE_LOCK_TAG);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn duration_accessors() {
        let config = BridgeConfig::default();
        assert_eq!(config.min_emission_interval(), Duration::from_millis(16));
        assert_eq!(config.wake_lock_timeout(), Duration::from_secs(600));
        assert_eq!(config.control_tick(), Duration::from_millis(250));
    }

    // --- TOML parsing ---

    #[test]
    fn empty_toml_yields_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_named_keys() {
        let config =
            BridgeConfig::from_toml_str("permission_request_code = 7\nmax_capture_size = 512\n")
                .unwrap();
        assert_eq!(config.permission_request_code, 7);
        assert_eq!(config.max_capture_size, 512);
        assert_eq!(config.min_emission_interval_ms, 16);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = BridgeConfig::from_toml_str("max_capture_size = \"big\"").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn zero_wake_lock_timeout_rejected() {
        let err = BridgeConfig::from_toml_str("wake_lock_timeout_secs = 0").unwrap_err();
        assert!(err.to_string().contains("wake_lock_timeout_secs"));
    }

    #[test]
    fn tiny_capture_size_rejected() {
        let err = BridgeConfig::from_toml_str("max_capture_size = 1").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
