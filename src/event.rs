use crate::gpio::Level;
use log::trace;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

/// Notifications produced by the controller core.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ControllerEvent {
    /// A watched button changed level (pressed or released).
    ButtonObserved { name: String, value: Level },

    ConfigSaved,

    /// Completed iterations out of the requested repeat count.
    ActionProgress { done: u32, total: u32 },

    ActionComplete { success: bool },

    /// `execute` arrived while another sequence was running.
    ActionRefused,
}

/// Outbound side of the core. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ControllerEvent);
}

impl EventSink for mpsc::UnboundedSender<ControllerEvent> {
    fn emit(&self, event: ControllerEvent) {
        if self.send(event).is_err() {
            trace!("Event receiver dropped");
        }
    }
}

impl EventSink for broadcast::Sender<ControllerEvent> {
    fn emit(&self, event: ControllerEvent) {
        // no subscribers is fine, nobody is connected
        let _ = self.send(event);
    }
}
