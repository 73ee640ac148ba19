use crate::config::{Action, Trigger};
use crate::gpio::Level;
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEntry {
    pub action_index: usize,
    pub fire_value: Level,
}

/// Button name to the action it fires and the level that fires it.
///
/// Derived from the actions and a set of enabled indices; never persisted.
#[derive(Debug, Default)]
pub struct TriggerTable {
    entries: HashMap<String, TriggerEntry>,
}

impl TriggerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from scratch. Replaces, never merges.
    pub fn set_enabled<I>(&mut self, indices: I, actions: &[Action], buttons: &dyn Fn(&str) -> bool)
    where
        I: IntoIterator<Item = usize>,
    {
        self.entries.clear();
        for index in indices {
            self.enable_one(index, actions, buttons);
        }
    }

    /// Add one action's trigger, keeping the rest. An action whose trigger
    /// has no button or no value is skipped.
    pub fn enable_one(&mut self, index: usize, actions: &[Action], buttons: &dyn Fn(&str) -> bool) {
        let Some(action) = actions.get(index) else {
            debug!("No action at index {}", index);
            return;
        };
        let Some((button, value)) = action.trigger.as_ref().and_then(Trigger::armed) else {
            return;
        };
        if !buttons(button) {
            warn!(
                "Trigger for action {} ({}) names unknown button {}",
                index, action.name, button
            );
            return;
        }
        self.entries.insert(
            button.to_string(),
            TriggerEntry {
                action_index: index,
                fire_value: value,
            },
        );
    }

    /// Indices currently represented, derived from the entries.
    pub fn active_indices(&self) -> BTreeSet<usize> {
        self.entries.values().map(|e| e.action_index).collect()
    }

    /// Action to fire for an observed edge, if any.
    pub fn lookup(&self, button: &str, observed: Level) -> Option<usize> {
        self.entries
            .get(button)
            .filter(|e| e.fire_value == observed)
            .map(|e| e.action_index)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
