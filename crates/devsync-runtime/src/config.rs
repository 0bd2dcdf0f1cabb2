//! Timeline configuration.

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// Default number of commands buffered before submitters wait.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Settings for a timeline and the thread it may run on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelineConfig {
    /// Commands buffered before `submit` waits.
    pub channel_capacity: usize,

    /// Name of the thread started by `spawn_timeline`.
    pub thread_name: String,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            thread_name: "devsync-timeline".to_string(),
        }
    }
}

impl TimelineConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self, RuntimeError> {
        let config: TimelineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.channel_capacity == 0 {
            return Err(RuntimeError::ZeroCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = TimelineConfig::from_json(r#"{"threadName": "camera"}"#).unwrap();
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.thread_name, "camera");
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let result = TimelineConfig::from_json(r#"{"channelCapacity": 0}"#);
        assert!(matches!(result, Err(RuntimeError::ZeroCapacity)));
    }

    #[test]
    fn test_invalid_json() {
        let result = TimelineConfig::from_json("capacity = 3");
        assert!(matches!(result, Err(RuntimeError::InvalidConfig(_))));
    }
}
