//! Configuration for permission monitoring.
//!
//! One tunable: the polling interval used when push-style detection is
//! unavailable. All fields have compile-time defaults so an empty config
//! file is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default polling interval in milliseconds.
const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Monitoring configuration.
///
/// # Serialization
///
/// Serializes to TOML for file storage; every field is optional thanks
/// to `#[serde(default)]`.
///
/// # Example
///
/// ```
/// use capstate_runtime::MonitorConfig;
/// use std::time::Duration;
///
/// let config = MonitorConfig::default();
/// assert_eq!(config.interval(), Duration::from_secs(1));
///
/// let config = MonitorConfig::with_interval(Duration::from_millis(250));
/// assert_eq!(config.interval(), Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Polling interval in milliseconds for poll-based fallback
    /// detection.
    pub interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

impl MonitorConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a config with the given polling interval.
    ///
    /// Intervals beyond `u64::MAX` milliseconds saturate.
    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// The polling interval as a [`Duration`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Serializes to a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not valid TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}
