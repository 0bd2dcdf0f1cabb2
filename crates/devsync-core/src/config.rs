//! Synchronization configuration.
//!
//! Rollback timeouts are the only tunable of the core. They come from a JSON
//! document so that each embedding application can ship its own defaults and
//! per-component overrides without recompiling.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Default delay before an unacknowledged request is rolled back.
pub const DEFAULT_ROLLBACK_TIMEOUT_MS: u64 = 5_000;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration data is not valid JSON or has the wrong shape.
    #[error("Invalid data: {0}")]
    InvalidData(#[from] serde_json::Error),

    /// A rollback timeout of zero would abandon every request immediately.
    #[error("Rollback timeout must be non-zero (scope: {0})")]
    ZeroTimeout(String),
}

/// Synchronization settings shared by every component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Delay, in milliseconds, before a pending value is abandoned.
    pub rollback_timeout_ms: u64,

    /// Per-component timeout overrides, keyed by component name.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub rollback_overrides: HashMap<String, u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rollback_timeout_ms: DEFAULT_ROLLBACK_TIMEOUT_MS,
            rollback_overrides: HashMap::new(),
        }
    }
}

impl SyncConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// Missing fields take their default value.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every timeout is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rollback_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("default".to_string()));
        }
        if let Some((name, _)) = self.rollback_overrides.iter().find(|(_, ms)| **ms == 0) {
            return Err(ConfigError::ZeroTimeout(name.clone()));
        }
        Ok(())
    }

    /// Rollback timeout for the named component.
    pub fn rollback_timeout_for(&self, component: &str) -> Duration {
        let ms = self
            .rollback_overrides
            .get(component)
            .copied()
            .unwrap_or(self.rollback_timeout_ms);
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.rollback_timeout_for("camera"), Duration::from_secs(5));
    }

    #[test]
    fn test_from_json_with_overrides() {
        let json = r#"{
            "rollbackTimeoutMs": 3000,
            "rollbackOverrides": { "gimbal": 1500 }
        }"#;

        let config = SyncConfig::from_json(json).unwrap();
        assert_eq!(config.rollback_timeout_for("camera"), Duration::from_millis(3000));
        assert_eq!(config.rollback_timeout_for("gimbal"), Duration::from_millis(1500));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config = SyncConfig::from_json("{}").unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = SyncConfig::from_json(r#"{"rollbackTimeoutMs": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout(ref scope) if scope == "default"));

        let err = SyncConfig::from_json(r#"{"rollbackOverrides": {"wifi": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout(ref scope) if scope == "wifi"));
    }

    #[test]
    fn test_invalid_json() {
        let err = SyncConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidData(_)));
    }
}
