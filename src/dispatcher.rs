use crate::controller::{ControllerState, EdgeEvent};
use crate::event::ControllerEvent;
use crate::sequencer::{Outcome, Sequencer};
use crate::triggers::TriggerTable;
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Turns edges from watched lines into notifications and trigger runs.
pub struct Dispatcher {
    state: Arc<ControllerState>,
    triggers: Arc<RwLock<TriggerTable>>,
    sequencer: Arc<Sequencer>,
}

impl Dispatcher {
    pub fn new(
        state: Arc<ControllerState>,
        triggers: Arc<RwLock<TriggerTable>>,
        sequencer: Arc<Sequencer>,
    ) -> Self {
        Dispatcher {
            state,
            triggers,
            sequencer,
        }
    }

    pub async fn run(self, mut edges: mpsc::UnboundedReceiver<EdgeEvent>) {
        while let Some(edge) = edges.recv().await {
            self.dispatch(edge);
        }
        debug!("Edge channel closed, dispatcher stopping");
    }

    /// Handle one edge. Returns the spawned run when a trigger matched.
    pub fn dispatch(&self, edge: EdgeEvent) -> Option<JoinHandle<Outcome>> {
        let value = match edge.value {
            Ok(value) => value,
            Err(e) => {
                warn!("Error watching button {}: {}", edge.button, e);
                return None;
            }
        };
        if self.state.is_claimed(&edge.button) {
            // our own sequence is driving this line
            debug!("Ignoring edge on driven button {}", edge.button);
            return None;
        }

        let pressed = self.state.with_config(|c| c.press_level() == value);
        info!(
            "Button {} {}",
            edge.button,
            if pressed { "pressed" } else { "released" }
        );
        self.state.events().emit(ControllerEvent::ButtonObserved {
            name: edge.button.clone(),
            value,
        });

        let index = self.triggers.read().lookup(&edge.button, value)?;
        info!("Button {} fires action {}", edge.button, index);
        let sequencer = self.sequencer.clone();
        Some(tokio::spawn(async move { sequencer.execute(index, 1).await }))
    }
}
