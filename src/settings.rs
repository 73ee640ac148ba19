use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Daemon settings, loaded from YAML at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Controller configuration document (buttons, activeState, actions)
    pub config_path: String,
    pub listen: String,
    pub gpio: GpioSettings,
    pub events: EventSettings,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioSettings {
    /// Optional input debounce applied to watched buttons
    pub debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    pub capacity: usize,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.events.capacity == 0 {
            bail!("events.capacity must be at least 1");
        }
        Ok(())
    }
}

impl GpioSettings {
    pub fn debounce(&self) -> Option<Duration> {
        self.debounce_ms.map(Duration::from_millis)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: "config/default.json".to_string(),
            listen: "0.0.0.0:3000".to_string(),
            gpio: GpioSettings::default(),
            events: EventSettings::default(),
        }
    }
}

impl Default for EventSettings {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let settings: Settings = serde_yaml::from_str("listen: 127.0.0.1:4000\ngpio:\n  debounce_ms: 5\n").unwrap();
        assert_eq!(settings.listen, "127.0.0.1:4000");
        assert_eq!(settings.config_path, "config/default.json");
        assert_eq!(settings.gpio.debounce(), Some(Duration::from_millis(5)));
        assert_eq!(settings.events.capacity, 64);
    }

    #[test]
    fn test_empty_document() {
        let settings: Settings = serde_yaml::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.gpio.debounce(), None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_event_capacity_is_rejected() {
        let settings: Settings = serde_yaml::from_str("events:\n  capacity: 0\n").unwrap();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("events.capacity"));
    }
}
