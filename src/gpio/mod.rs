//! Narrow GPIO capability used by the controller.
//!
//! The core only needs to open a line, drive it to a level, hand it back to
//! input, and be told about edges. Everything board specific lives behind
//! [`GpioDriver`].

pub mod rpi;

#[cfg(test)]
pub mod mock;

use crate::error::GpioError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Logical line level. Serialized as the integers `0` and `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn complement(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> u8 {
        match level {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Level::Low),
            1 => Ok(Level::High),
            other => Err(format!("level must be 0 or 1, got {}", other)),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Direction a line is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output(Level),
}

/// Called from the driver whenever a watched line changes level.
pub type EdgeCallback = Arc<dyn Fn(Result<Level, GpioError>) + Send + Sync>;

/// A single owned digital line.
pub trait PinLine: Send {
    fn id(&self) -> u8;

    /// Switch to output (if needed) and drive `level`.
    fn set_level(&mut self, level: Level) -> Result<(), GpioError>;

    /// Return to input so the physical button can be read again.
    fn set_input(&mut self) -> Result<(), GpioError>;

    fn read(&self) -> Result<Level, GpioError>;

    /// Install the edge callback. Stays armed across `set_input` calls.
    fn watch(&mut self, callback: EdgeCallback) -> Result<(), GpioError>;

    fn release(&mut self);
}

pub trait GpioDriver: Send + Sync {
    fn open(&self, line: u8, direction: Direction) -> Result<Box<dyn PinLine>, GpioError>;
}

// BCM number -> physical pin on the 40-pin header
const HEADER_PINS: [(u8, u8); 26] = [
    (2, 3),
    (3, 5),
    (4, 7),
    (5, 29),
    (6, 31),
    (7, 26),
    (8, 24),
    (9, 21),
    (10, 19),
    (11, 23),
    (12, 32),
    (13, 33),
    (14, 8),
    (15, 10),
    (16, 36),
    (17, 11),
    (18, 12),
    (19, 35),
    (20, 38),
    (21, 40),
    (22, 15),
    (23, 16),
    (24, 18),
    (25, 22),
    (26, 37),
    (27, 13),
];

/// Resolve a configured line identifier to a BCM GPIO number.
pub fn resolve_line(id: u32) -> Result<u8, GpioError> {
    HEADER_PINS
        .iter()
        .find(|(bcm, _)| u32::from(*bcm) == id)
        .map(|(bcm, _)| *bcm)
        .ok_or(GpioError::Unresolved(id))
}

pub fn header_pin(bcm: u8) -> Option<u8> {
    HEADER_PINS
        .iter()
        .find(|(gpio, _)| *gpio == bcm)
        .map(|(_, pin)| *pin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_serde_as_integer() {
        assert_eq!(serde_json::to_string(&Level::High).unwrap(), "1");
        assert_eq!(serde_json::from_str::<Level>("0").unwrap(), Level::Low);
        assert!(serde_json::from_str::<Level>("2").is_err());
    }

    #[test]
    fn test_complement() {
        assert_eq!(Level::Low.complement(), Level::High);
        assert_eq!(Level::High.complement(), Level::Low);
    }

    #[test]
    fn test_resolve_line() {
        assert_eq!(resolve_line(17).unwrap(), 17);
        assert!(matches!(resolve_line(0), Err(GpioError::Unresolved(0))));
        assert!(matches!(resolve_line(28), Err(GpioError::Unresolved(28))));
        assert_eq!(header_pin(17), Some(11));
        assert_eq!(header_pin(40), None);
    }

    #[test]
    fn test_opened_line_reports_its_id() {
        let driver = mock::MockDriver::new();
        let pin = driver.open(22, Direction::Output(Level::High)).unwrap();
        assert_eq!(pin.id(), 22);
        assert_eq!(pin.read().unwrap(), Level::High);
    }
}
