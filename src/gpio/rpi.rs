use super::{Direction, EdgeCallback, GpioDriver, Level, PinLine};
use crate::error::GpioError;
use log::debug;
use rppal::gpio::{self, Gpio, InputPin, OutputPin, Trigger};
use std::time::{Duration, Instant};

/// Raspberry Pi header GPIO through the kernel character device.
pub struct RpiDriver {
    gpio: Gpio,
    debounce: Option<Duration>,
}

impl RpiDriver {
    pub fn new(debounce: Option<Duration>) -> Result<Self, gpio::Error> {
        Ok(RpiDriver {
            gpio: Gpio::new()?,
            debounce,
        })
    }
}

impl GpioDriver for RpiDriver {
    fn open(&self, line: u8, direction: Direction) -> Result<Box<dyn PinLine>, GpioError> {
        let mut pin = RpiLine {
            gpio: self.gpio.clone(),
            bcm: line,
            mode: Mode::Released,
            callback: None,
            debounce: self.debounce,
        };
        match direction {
            Direction::Input => pin.set_input()?,
            Direction::Output(level) => pin.set_level(level)?,
        }
        Ok(Box::new(pin))
    }
}

enum Mode {
    Input(InputPin),
    Output(OutputPin),
    Released,
}

/// A header line that flips between an interrupt-armed input and an output.
///
/// rppal only delivers interrupts on `InputPin`, so driving the line drops the
/// input (and its interrupt) and returning to input re-arms the stored
/// callback.
pub struct RpiLine {
    gpio: Gpio,
    bcm: u8,
    mode: Mode,
    callback: Option<EdgeCallback>,
    debounce: Option<Duration>,
}

impl RpiLine {
    fn driver_error(&self, source: gpio::Error) -> GpioError {
        GpioError::Driver {
            line: self.bcm,
            source,
        }
    }

    fn arm(&self, pin: &mut InputPin, callback: EdgeCallback) -> Result<(), GpioError> {
        let mut debounce = Debounce::new(self.debounce);
        pin.set_async_interrupt(Trigger::Both, move |level: gpio::Level| {
            if !debounce.accept(Instant::now()) {
                return;
            }
            callback(Ok(match level {
                gpio::Level::Low => Level::Low,
                gpio::Level::High => Level::High,
            }));
        })
        .map_err(|e| self.driver_error(e))
    }
}

/// Drops edges that arrive within `window` of the last accepted one.
struct Debounce {
    window: Option<Duration>,
    last: Option<Instant>,
}

impl Debounce {
    fn new(window: Option<Duration>) -> Self {
        Debounce { window, last: None }
    }

    fn accept(&mut self, now: Instant) -> bool {
        let Some(window) = self.window else {
            return true;
        };
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < window {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

impl PinLine for RpiLine {
    fn id(&self) -> u8 {
        self.bcm
    }

    fn set_level(&mut self, level: Level) -> Result<(), GpioError> {
        let out = match level {
            Level::Low => gpio::Level::Low,
            Level::High => gpio::Level::High,
        };
        if let Mode::Output(pin) = &mut self.mode {
            pin.write(out);
            return Ok(());
        }

        // the input pin has to be dropped before the line can be claimed again
        self.mode = Mode::Released;
        let pin = self.gpio.get(self.bcm).map_err(|e| self.driver_error(e))?;
        let pin = match level {
            Level::Low => pin.into_output_low(),
            Level::High => pin.into_output_high(),
        };
        debug!("GPIO {} switched to output at {}", self.bcm, level);
        self.mode = Mode::Output(pin);
        Ok(())
    }

    fn set_input(&mut self) -> Result<(), GpioError> {
        if let Mode::Input(_) = self.mode {
            return Ok(());
        }

        self.mode = Mode::Released;
        let mut pin = self
            .gpio
            .get(self.bcm)
            .map_err(|e| self.driver_error(e))?
            .into_input();
        if let Some(callback) = self.callback.clone() {
            self.arm(&mut pin, callback)?;
        }
        debug!("GPIO {} switched to input", self.bcm);
        self.mode = Mode::Input(pin);
        Ok(())
    }

    fn read(&self) -> Result<Level, GpioError> {
        let high = match &self.mode {
            Mode::Input(pin) => pin.is_high(),
            Mode::Output(pin) => pin.is_set_high(),
            Mode::Released => {
                return Err(GpioError::Line {
                    line: self.bcm,
                    message: "line has been released".to_string(),
                })
            }
        };
        Ok(if high { Level::High } else { Level::Low })
    }

    fn watch(&mut self, callback: EdgeCallback) -> Result<(), GpioError> {
        self.callback = Some(callback.clone());
        let mut mode = std::mem::replace(&mut self.mode, Mode::Released);
        let armed = match &mut mode {
            Mode::Input(pin) => self.arm(pin, callback),
            _ => Ok(()),
        };
        self.mode = mode;
        armed
    }

    fn release(&mut self) {
        self.callback = None;
        self.mode = Mode::Released;
        debug!("GPIO {} released", self.bcm);
    }
}
