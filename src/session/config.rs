use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Length of one countdown step.
pub const TICK_MS: u64 = 1_000;

/// Timing of one interval session. Fixed once the session is constructed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Length of every REST phase, including the warm-up rest before the first interval
    pub rest_duration_ms: u64,

    /// Nominal length of every RUN phase
    pub interval_duration_ms: u64,

    /// Number of RUN phases before the session finishes
    pub total_intervals: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rest_duration_ms: 1_000,
            interval_duration_ms: 15_000,
            total_intervals: 4,
        }
    }
}

impl SessionConfig {
    pub fn new(rest_duration_ms: u64, interval_duration_ms: u64, total_intervals: u32) -> Self {
        Self {
            rest_duration_ms,
            interval_duration_ms,
            total_intervals,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_duration_ms == 0 {
            bail!("interval_duration_ms must be greater than zero");
        }
        if self.total_intervals == 0 {
            bail!("total_intervals must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = SessionConfig::default();
        assert_eq!(config, SessionConfig::new(1_000, 15_000, 4));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_sessions() {
        assert!(SessionConfig::new(1_000, 0, 4).validate().is_err());
        assert!(SessionConfig::new(1_000, 15_000, 0).validate().is_err());
        assert!(SessionConfig::new(0, 15_000, 1).validate().is_ok());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"totalIntervals": 8}"#).unwrap();
        assert_eq!(config.total_intervals, 8);
        assert_eq!(config.interval_duration_ms, 15_000);
    }
}
