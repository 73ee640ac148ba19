use crate::command::{repeat_count, Command, Reply};
use crate::config::{ConfigStore, Configuration};
use crate::controller::{ControllerState, EdgeEvent};
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::event::EventSink;
use crate::gpio::GpioDriver;
use crate::sequencer::Sequencer;
use crate::triggers::TriggerTable;
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Owns the controller state, trigger table and sequencer, and routes the
/// command surface onto them.
pub struct Daemon {
    state: Arc<ControllerState>,
    triggers: Arc<RwLock<TriggerTable>>,
    sequencer: Arc<Sequencer>,
}

impl Daemon {
    /// Open every line for `config`. Edges from watched lines arrive on the
    /// returned receiver; feed it to [`Daemon::dispatcher`].
    pub fn new(
        config: Configuration,
        driver: &dyn GpioDriver,
        store: Box<dyn ConfigStore>,
        events: Arc<dyn EventSink>,
    ) -> (Self, mpsc::UnboundedReceiver<EdgeEvent>) {
        let (edge_tx, edge_rx) = mpsc::unbounded_channel();
        info!("Opening {} button line(s)", config.buttons.len());
        let state = Arc::new(ControllerState::open(config, driver, store, events, edge_tx));
        let daemon = Daemon {
            sequencer: Arc::new(Sequencer::new(state.clone())),
            triggers: Arc::new(RwLock::new(TriggerTable::new())),
            state,
        };
        (daemon, edge_rx)
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.state.clone(),
            self.triggers.clone(),
            self.sequencer.clone(),
        )
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn handle(&self, command: Command) -> Reply {
        debug!("Command {}", command.name());
        match command {
            Command::GetConfig => Reply::Config {
                config: self.state.config(),
            },
            Command::SaveConfig { config } => {
                self.state.replace_config(config);
                self.refresh_triggers();
                match self.state.persist() {
                    Ok(()) => Reply::Accepted,
                    Err(e) => {
                        warn!("Failed to save configuration: {}", e);
                        e.into()
                    }
                }
            }
            Command::GetActiveTriggers => Reply::ActiveTriggers {
                indices: self.active_triggers(),
            },
            Command::SetActiveTriggers { indices } => {
                self.set_active_triggers(indices);
                Reply::Accepted
            }
            Command::SetTrigger { index } => {
                let mut table = self.triggers.write();
                self.state.with_config(|c| {
                    table.enable_one(index, &c.actions, &|b: &str| c.buttons.contains_key(b))
                });
                Reply::Accepted
            }
            Command::Execute {
                action_index,
                repeat,
            } => match repeat_count(repeat) {
                Ok(repeat) => {
                    let sequencer = self.sequencer.clone();
                    tokio::spawn(async move { sequencer.execute(action_index, repeat).await });
                    Reply::Accepted
                }
                Err(e) => {
                    warn!("Rejected execute of action {}: {}", action_index, e);
                    e.into()
                }
            },
            Command::PushButton { button } => self.manual(&button, true),
            Command::ReleaseButton { button } => self.manual(&button, false),
        }
    }

    fn manual(&self, button: &str, press: bool) -> Reply {
        let result = if press {
            self.state.push_button(button)
        } else {
            self.state.release_button(button)
        };
        match result {
            Ok(()) => Reply::Accepted,
            Err(e) => {
                warn!("Button {} ignored: {}", button, e);
                e.into()
            }
        }
    }

    pub fn active_triggers(&self) -> Vec<usize> {
        self.triggers.read().active_indices().into_iter().collect()
    }

    pub fn set_active_triggers(&self, indices: impl IntoIterator<Item = usize>) {
        let mut table = self.triggers.write();
        self.state.with_config(|c| {
            table.set_enabled(indices, &c.actions, &|b: &str| c.buttons.contains_key(b))
        });
        info!("Active triggers: {:?}", table.active_indices());
    }

    // rebuild against the current actions so edited triggers take effect
    fn refresh_triggers(&self) {
        let active = self.active_triggers();
        self.set_active_triggers(active);
    }

    /// Re-read the configuration from the store (SIGHUP).
    pub fn reload_config(&self) -> Result<()> {
        self.state.reload()?;
        self.refresh_triggers();
        info!("Configuration reloaded successfully");
        Ok(())
    }

    pub fn shutdown(&self) {
        if self.sequencer.is_running() {
            warn!("Shutting down with a sequence still running");
        }
        self.state.shutdown();
    }
}
