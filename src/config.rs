//! Configuration for the harness.
//!
//! The configuration controls the ambient behavior shared by every test
//! using one [`Harness`](crate::Harness) instance:
//!
//! - Event log verbosity
//! - The default bound applied when awaiting expected calls
//! - Whether event capture is enabled at all
//!
//! # Basic Usage
//!
//! ```
//! use callseq::{HarnessConfig, LogLevel};
//! use std::time::Duration;
//!
//! // Default configuration
//! let config = HarnessConfig::default();
//!
//! // Explicit settings for a noisy investigation run
//! let config = HarnessConfig::new()
//!     .with_log_level(LogLevel::Trace)
//!     .with_default_deadline(Duration::from_secs(5));
//! assert!(config.capture_events);
//! ```
//!
//! # Environment Overrides
//!
//! `from_env()` reads:
//!
//! - `CALLSEQ_LOG`: event log verbosity (`error`..`trace`)
//! - `CALLSEQ_DEADLINE_MS`: default await bound in milliseconds

use crate::event_log::LogLevel;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a harness instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Verbosity of the harness event log.
    pub log_level: LogLevel,
    /// Default bound for `await_calls`. `None` waits without bound.
    pub default_deadline: Option<Duration>,
    /// Whether the event log captures diagnostics. Failures are retained
    /// even when disabled.
    pub capture_events: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            default_deadline: None,
            capture_events: true,
        }
    }
}

impl HarnessConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let default_deadline = std::env::var("CALLSEQ_DEADLINE_MS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_millis);
        Self {
            log_level: LogLevel::from_env(),
            default_deadline,
            ..Self::default()
        }
    }

    /// Sets the event log verbosity.
    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Sets the default bound applied when awaiting expected calls.
    #[must_use]
    pub fn with_default_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = Some(deadline);
        self
    }

    /// Disables event capture entirely.
    #[must_use]
    pub fn without_capture(mut self) -> Self {
        self.capture_events = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_composition() {
        let config = HarnessConfig::new()
            .with_log_level(LogLevel::Debug)
            .with_default_deadline(Duration::from_millis(250))
            .without_capture();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.default_deadline, Some(Duration::from_millis(250)));
        assert!(!config.capture_events);
    }

    #[test]
    fn serde_roundtrip() {
        let config = HarnessConfig::new()
            .with_log_level(LogLevel::Trace)
            .with_default_deadline(Duration::from_secs(1));
        let raw = serde_json::to_string(&config).expect("serialize config");
        let back: HarnessConfig = serde_json::from_str(&raw).expect("deserialize config");
        assert_eq!(back, config);
    }

    #[test]
    fn defaults_are_quiet_and_unbounded() {
        let config = HarnessConfig::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.default_deadline, None);
        assert!(config.capture_events);
    }
}
