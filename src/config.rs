use crate::error::Result;
use crate::gpio::{self, Level};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Controller configuration, persisted as a single JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Button name to BCM GPIO number
    pub buttons: BTreeMap<String, u32>,
    /// Level that means "pressed" for every digital button
    pub active_state: Level,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    #[serde(default)]
    pub sequence: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(default)]
    pub button: String,
    /// `None` disables the trigger
    #[serde(default)]
    pub value: Option<Level>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Step {
    Delay { ms: u64 },
    Press { button: String, level: Level },
}

impl Trigger {
    /// The button and fire value, when both are configured.
    pub fn armed(&self) -> Option<(&str, Level)> {
        match self.value {
            Some(value) if !self.button.is_empty() => Some((self.button.as_str(), value)),
            _ => None,
        }
    }
}

impl Configuration {
    pub fn press_level(&self) -> Level {
        self.active_state
    }

    pub fn release_level(&self) -> Level {
        self.active_state.complement()
    }

    pub fn action(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }

    /// Collect configuration problems. None of them are fatal: the affected
    /// button, trigger or step is skipped at runtime.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut seen: BTreeMap<u32, &str> = BTreeMap::new();

        for (name, id) in &self.buttons {
            if let Err(e) = gpio::resolve_line(*id) {
                problems.push(format!("Button {}: {}", name, e));
            }
            if let Some(other) = seen.insert(*id, name) {
                problems.push(format!("Buttons {} and {} share GPIO {}", other, name, id));
            }
        }

        for (index, action) in self.actions.iter().enumerate() {
            if let Some((button, _)) = action.trigger.as_ref().and_then(Trigger::armed) {
                if !self.buttons.contains_key(button) {
                    problems.push(format!(
                        "Action {} ({}): trigger names unknown button {}",
                        index, action.name, button
                    ));
                }
            }
            for step in &action.sequence {
                if let Step::Press { button, .. } = step {
                    if !self.buttons.contains_key(button) {
                        problems.push(format!(
                            "Action {} ({}): step presses unknown button {}",
                            index, action.name, button
                        ));
                    }
                }
            }
        }

        problems
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            buttons: BTreeMap::new(),
            active_state: Level::Low,
            actions: vec![],
        }
    }
}

/// Durable storage for the controller configuration.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<Configuration>;
    fn save(&self, config: &Configuration) -> Result<()>;
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Result<Configuration> {
        let content = fs::read_to_string(&self.path)?;
        let config = serde_json::from_str(&content)?;
        debug!("Loaded configuration from {}", self.path.display());
        Ok(config)
    }

    fn save(&self, config: &Configuration) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)?;
        debug!("Saved configuration to {}", self.path.display());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "buttons": { "A": 17, "B": 27, "LeftTrigger": 22 },
        "activeState": 0,
        "actions": [
            {
                "name": "jump",
                "trigger": { "button": "A", "value": 0 },
                "sequence": [
                    { "type": "delay", "ms": 100 },
                    { "type": "press", "button": "B", "level": 0 },
                    { "type": "delay", "ms": 50 },
                    { "type": "press", "button": "B", "level": 1 }
                ]
            },
            { "name": "idle", "trigger": { "button": "", "value": null }, "sequence": [] },
            { "name": "bare" }
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let config: Configuration = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.buttons["A"], 17);
        assert_eq!(config.active_state, Level::Low);
        assert_eq!(config.press_level(), Level::Low);
        assert_eq!(config.release_level(), Level::High);
        assert_eq!(config.actions.len(), 3);
        assert_eq!(config.actions[0].sequence[0], Step::Delay { ms: 100 });
        assert_eq!(
            config.actions[0].sequence[1],
            Step::Press {
                button: "B".to_string(),
                level: Level::Low
            }
        );
        assert_eq!(
            config.actions[0].trigger.as_ref().and_then(Trigger::armed),
            Some(("A", Level::Low))
        );
        assert_eq!(config.actions[1].trigger.as_ref().and_then(Trigger::armed), None);
        assert!(config.actions[2].trigger.is_none());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_rejects_bad_steps() {
        let negative = r#"{ "type": "delay", "ms": -5 }"#;
        assert!(serde_json::from_str::<Step>(negative).is_err());
        let level = r#"{ "type": "press", "button": "A", "level": 3 }"#;
        assert!(serde_json::from_str::<Step>(level).is_err());
        let unknown = r#"{ "type": "hold", "button": "A" }"#;
        assert!(serde_json::from_str::<Step>(unknown).is_err());
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut config: Configuration = serde_json::from_str(SAMPLE).unwrap();
        config.buttons.insert("X".to_string(), 99);
        config.buttons.insert("Y".to_string(), 17);
        config.actions[1].trigger = Some(Trigger {
            button: "Start".to_string(),
            value: Some(Level::High),
        });
        config.actions[2].sequence.push(Step::Press {
            button: "Select".to_string(),
            level: Level::High,
        });

        let problems = config.validate();
        assert_eq!(problems.len(), 4, "{:?}", problems);
        assert!(problems.iter().any(|p| p.contains("GPIO 99")));
        assert!(problems.iter().any(|p| p.contains("share GPIO 17")));
        assert!(problems.iter().any(|p| p.contains("unknown button Start")));
        assert!(problems.iter().any(|p| p.contains("unknown button Select")));
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("gpio-pad-controller-{}", std::process::id()));
        let store = JsonFileStore::new(dir.join("config").join("default.json"));
        let config: Configuration = serde_json::from_str(SAMPLE).unwrap();

        store.save(&config).unwrap();
        let reloaded = store.load().unwrap();
        assert_eq!(reloaded, config);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_store_missing_file() {
        let store = JsonFileStore::new("/nonexistent/gpio-pad-controller/default.json");
        assert!(store.load().is_err());
    }
}
