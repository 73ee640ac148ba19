//! Scripted in-memory driver used by the unit tests.

use super::{Direction, EdgeCallback, GpioDriver, Level, PinLine};
use crate::error::GpioError;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Drive(Level),
    Input,
}

#[derive(Debug, Clone)]
pub struct Record {
    pub line: u8,
    pub transition: Transition,
    pub at: Instant,
}

#[derive(Default)]
struct Shared {
    records: Vec<Record>,
    opened: Vec<(u8, Direction)>,
    callbacks: HashMap<u8, EdgeCallback>,
    failing: HashSet<u8>,
    unopenable: HashSet<u8>,
    released: HashSet<u8>,
}

#[derive(Clone, Default)]
pub struct MockDriver {
    shared: Arc<Mutex<Shared>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, line: u8) {
        self.shared.lock().failing.insert(line);
    }

    pub fn refuse_open(&self, line: u8) {
        self.shared.lock().unopenable.insert(line);
    }

    /// Deliver an edge to a watched line. Returns false when nothing watches it.
    pub fn edge(&self, line: u8, level: Level) -> bool {
        self.deliver(line, Ok(level))
    }

    pub fn edge_error(&self, line: u8) -> bool {
        self.deliver(
            line,
            Err(GpioError::Line {
                line,
                message: "read failed".to_string(),
            }),
        )
    }

    fn deliver(&self, line: u8, value: Result<Level, GpioError>) -> bool {
        let callback = self.shared.lock().callbacks.get(&line).cloned();
        match callback {
            Some(callback) => {
                callback(value);
                true
            }
            None => false,
        }
    }

    pub fn records(&self) -> Vec<Record> {
        self.shared.lock().records.clone()
    }

    pub fn transitions(&self, line: u8) -> Vec<(Transition, Instant)> {
        self.shared
            .lock()
            .records
            .iter()
            .filter(|r| r.line == line)
            .map(|r| (r.transition, r.at))
            .collect()
    }

    pub fn opened(&self) -> Vec<(u8, Direction)> {
        self.shared.lock().opened.clone()
    }

    pub fn is_watched(&self, line: u8) -> bool {
        self.shared.lock().callbacks.contains_key(&line)
    }

    pub fn is_released(&self, line: u8) -> bool {
        self.shared.lock().released.contains(&line)
    }
}

impl GpioDriver for MockDriver {
    fn open(&self, line: u8, direction: Direction) -> Result<Box<dyn PinLine>, GpioError> {
        let mut shared = self.shared.lock();
        if shared.unopenable.contains(&line) {
            return Err(GpioError::Line {
                line,
                message: "busy".to_string(),
            });
        }
        shared.opened.push((line, direction));
        let level = match direction {
            Direction::Input => Level::Low,
            Direction::Output(level) => level,
        };
        Ok(Box::new(MockLine {
            line,
            level,
            shared: self.shared.clone(),
        }))
    }
}

struct MockLine {
    line: u8,
    level: Level,
    shared: Arc<Mutex<Shared>>,
}

impl MockLine {
    fn record(&self, transition: Transition) -> Result<(), GpioError> {
        let mut shared = self.shared.lock();
        if shared.failing.contains(&self.line) {
            return Err(GpioError::Line {
                line: self.line,
                message: "write failed".to_string(),
            });
        }
        shared.records.push(Record {
            line: self.line,
            transition,
            at: Instant::now(),
        });
        Ok(())
    }
}

impl PinLine for MockLine {
    fn id(&self) -> u8 {
        self.line
    }

    fn set_level(&mut self, level: Level) -> Result<(), GpioError> {
        self.record(Transition::Drive(level))?;
        self.level = level;
        Ok(())
    }

    fn set_input(&mut self) -> Result<(), GpioError> {
        self.record(Transition::Input)
    }

    fn read(&self) -> Result<Level, GpioError> {
        Ok(self.level)
    }

    fn watch(&mut self, callback: EdgeCallback) -> Result<(), GpioError> {
        self.shared.lock().callbacks.insert(self.line, callback);
        Ok(())
    }

    fn release(&mut self) {
        let mut shared = self.shared.lock();
        shared.callbacks.remove(&self.line);
        shared.released.insert(self.line);
    }
}
