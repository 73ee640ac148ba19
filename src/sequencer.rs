//! Single-flight execution of an action's step list.
//!
//! At most one sequence runs process-wide. A second `execute` while one is
//! running is refused immediately, never queued. Every accepted call emits
//! exactly one `ActionComplete`; every refused call emits exactly one
//! `ActionRefused`.

use crate::config::{Action, Step};
use crate::controller::ControllerState;
use crate::error::Result;
use crate::event::ControllerEvent;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::yield_now;
use tokio::time::{sleep, Instant};

/// Minimum wall-clock spacing between two progress events.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Refused,
    Completed { success: bool },
}

pub struct Sequencer {
    state: Arc<ControllerState>,
    running: AtomicBool,
}

/// Clears the running flag when the run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Sequencer {
    pub fn new(state: Arc<ControllerState>) -> Self {
        Sequencer {
            state,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run action `index` `repeat` times (0 runs once).
    pub async fn execute(&self, index: usize, repeat: u32) -> Outcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Action {} refused, another sequence is running", index);
            self.state.events().emit(ControllerEvent::ActionRefused);
            return Outcome::Refused;
        }
        let guard = RunGuard(&self.running);

        let Some(action) = self.state.with_config(|c| c.action(index).cloned()) else {
            warn!("No action at index {}", index);
            drop(guard);
            self.state.events().emit(ControllerEvent::ActionComplete { success: false });
            return Outcome::Completed { success: false };
        };

        let repeat = repeat.max(1);
        info!("Executing {} x{}", action.name, repeat);
        let result = self.run(&action, repeat).await;
        self.state.release_claimed();
        drop(guard);

        let success = match result {
            Ok(()) => {
                info!("Action {} complete", action.name);
                true
            }
            Err(e) => {
                warn!("Action {} aborted: {}", action.name, e);
                false
            }
        };
        self.state.events().emit(ControllerEvent::ActionComplete { success });
        Outcome::Completed { success }
    }

    async fn run(&self, action: &Action, repeat: u32) -> Result<()> {
        let mut last_progress = Instant::now();
        let last_step = action.sequence.len().saturating_sub(1);

        for iteration in 1..=repeat {
            // delays accumulate until the next press so they share one wait
            let mut pending = Duration::ZERO;
            let mut waited = false;
            for (position, step) in action.sequence.iter().enumerate() {
                match step {
                    Step::Delay { ms } => {
                        pending += Duration::from_millis(*ms);
                        if position == last_step {
                            waited |= wait(pending).await;
                            pending = Duration::ZERO;
                        }
                    }
                    Step::Press { button, level } => {
                        if !self.state.has_line(button) {
                            debug!("Skipping press of unavailable button {}", button);
                            continue;
                        }
                        waited |= wait(pending).await;
                        self.state.drive_claimed(button, *level)?;
                        debug!("{} -> {}", button, level);
                        pending = Duration::ZERO;
                    }
                }
            }
            // an iteration without a sleep must still give the worker back
            if !waited {
                yield_now().await;
            }

            if last_progress.elapsed() > PROGRESS_INTERVAL {
                self.state.events().emit(ControllerEvent::ActionProgress {
                    done: iteration,
                    total: repeat,
                });
                last_progress = Instant::now();
            }
        }
        Ok(())
    }
}

async fn wait(pending: Duration) -> bool {
    if pending.is_zero() {
        return false;
    }
    sleep(pending).await;
    true
}
