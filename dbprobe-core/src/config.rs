//! Probe and preview configuration.
//!
//! Loaded from a JSON file or built from defaults; the CLI layers its flags
//! and environment variables over it.

use crate::error::{ProbeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default connect budget for every engine client, in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Default deadline for one whole probe, in milliseconds
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 15_000;

/// Hard ceiling on rows returned by a preview
pub const MAX_PREVIEW_ROWS: u32 = 50;

/// Timeouts and limits for probes and previews.
///
/// # Example
/// ```rust
/// use dbprobe_core::ProbeConfig;
/// use std::time::Duration;
///
/// let config = ProbeConfig::default().with_preview_row_cap(10);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.connect_timeout(), Duration::from_millis(5000));
/// assert_eq!(config.preview_limit(Some(500)), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Connect budget per engine client
    pub connect_timeout_ms: u64,
    /// Deadline for a whole `test()` call
    pub probe_timeout_ms: u64,
    /// Rows returned by a preview; never above [`MAX_PREVIEW_ROWS`]
    pub preview_row_cap: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            preview_row_cap: MAX_PREVIEW_ROWS,
        }
    }
}

impl ProbeConfig {
    /// Loads configuration from a JSON file. Missing keys take defaults.
    ///
    /// # Errors
    /// Returns a configuration error if the file cannot be read, is not valid
    /// JSON, or fails [`ProbeConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProbeError::configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            ProbeError::configuration(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates timeouts and limits.
    ///
    /// # Errors
    /// Returns a configuration error for zero timeouts, a connect budget
    /// longer than the probe deadline, or a row cap outside `1..=50`.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0 {
            return Err(ProbeError::configuration(
                "connect_timeout_ms must be greater than 0",
            ));
        }

        if self.probe_timeout_ms == 0 {
            return Err(ProbeError::configuration(
                "probe_timeout_ms must be greater than 0",
            ));
        }

        if self.connect_timeout_ms > self.probe_timeout_ms {
            return Err(ProbeError::configuration(
                "connect_timeout_ms must not exceed probe_timeout_ms",
            ));
        }

        if self.preview_row_cap == 0 || self.preview_row_cap > MAX_PREVIEW_ROWS {
            return Err(ProbeError::configuration(format!(
                "preview_row_cap must be between 1 and {}",
                MAX_PREVIEW_ROWS
            )));
        }

        Ok(())
    }

    /// Connect budget as a `Duration`
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Probe deadline as a `Duration`
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Rows to fetch for a preview request.
    ///
    /// The request is honored only up to the configured cap, which itself
    /// never exceeds [`MAX_PREVIEW_ROWS`].
    pub fn preview_limit(&self, requested: Option<u32>) -> u32 {
        let cap = self.preview_row_cap.clamp(1, MAX_PREVIEW_ROWS);
        requested.map_or(cap, |r| r.clamp(1, cap))
    }

    /// Builder method to set the connect budget.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Builder method to set the probe deadline.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Builder method to set the preview row cap.
    pub fn with_preview_row_cap(mut self, cap: u32) -> Self {
        self.preview_row_cap = cap;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_config_default() {
        let config = ProbeConfig::default();
        assert_eq!(config.connect_timeout_ms, 5000);
        assert_eq!(config.probe_timeout_ms, 15000);
        assert_eq!(config.preview_row_cap, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_probe_config_validation() {
        let config = ProbeConfig {
            connect_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ProbeConfig {
            connect_timeout_ms: 20_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ProbeConfig {
            preview_row_cap: 51,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ProbeConfig {
            preview_row_cap: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_preview_limit_never_exceeds_cap() {
        let config = ProbeConfig::default();
        assert_eq!(config.preview_limit(None), 50);
        assert_eq!(config.preview_limit(Some(10)), 10);
        assert_eq!(config.preview_limit(Some(1000)), 50);
        assert_eq!(config.preview_limit(Some(0)), 1);

        // A cap raised past the ceiling by hand is still clamped.
        let config = ProbeConfig {
            preview_row_cap: 500,
            ..Default::default()
        };
        assert_eq!(config.preview_limit(Some(1000)), 50);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: ProbeConfig = serde_json::from_str(r#"{"probe_timeout_ms": 30000}"#).unwrap();
        assert_eq!(config.probe_timeout_ms, 30000);
        assert_eq!(config.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ProbeConfig::load(Path::new("/nonexistent/dbprobe.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("dbprobe-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"connect_timeout_ms": 2000, "preview_row_cap": 20}"#).unwrap();
        let config = ProbeConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.connect_timeout(), Duration::from_millis(2000));
        assert_eq!(config.preview_row_cap, 20);
    }
}
