//! GPIO game pad controller
//!
//! Drives header GPIO lines wired to a controller's buttons, replays timed
//! press/release sequences with single-flight execution, and fires sequences
//! automatically when a watched button edge matches an enabled trigger.

pub mod command;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod gpio;
pub mod sequencer;
pub mod server;
pub mod settings;
pub mod triggers;

// Re-export main types for convenience
pub use config::{Action, Configuration, Step, Trigger};
pub use daemon::Daemon;
pub use error::{ControllerError, GpioError};
pub use event::{ControllerEvent, EventSink};
pub use sequencer::{Outcome, Sequencer};
