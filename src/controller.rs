use crate::config::{ConfigStore, Configuration};
use crate::error::{ControllerError, GpioError, Result};
use crate::event::{ControllerEvent, EventSink};
use crate::gpio::{self, Direction, EdgeCallback, GpioDriver, Level, PinLine};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;

/// How a button's line is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Read for edges while idle, driven by commands and sequences.
    Watched,
    /// Analog trigger axes: no usable edges, output only.
    OutputOnly,
}

/// Raw edge report from a watched line, forwarded to the dispatcher.
#[derive(Debug)]
pub struct EdgeEvent {
    pub button: String,
    pub value: std::result::Result<Level, GpioError>,
}

struct OwnedLine {
    kind: LineKind,
    pin: Mutex<Box<dyn PinLine>>,
}

/// Current configuration plus the lines opened for it at startup.
pub struct ControllerState {
    config: RwLock<Configuration>,
    lines: HashMap<String, OwnedLine>,
    // lines driven by the running sequence; also serializes every line write
    claimed: Mutex<HashSet<String>>,
    store: Box<dyn ConfigStore>,
    events: Arc<dyn EventSink>,
}

impl ControllerState {
    /// Open one line per configured button. Buttons whose line cannot be
    /// resolved or opened stay unusable for the lifetime of the process.
    pub fn open(
        config: Configuration,
        driver: &dyn GpioDriver,
        store: Box<dyn ConfigStore>,
        events: Arc<dyn EventSink>,
        edges: mpsc::UnboundedSender<EdgeEvent>,
    ) -> Self {
        for problem in config.validate() {
            warn!("Configuration: {}", problem);
        }

        let mut lines = HashMap::new();
        for (name, id) in &config.buttons {
            let bcm = match gpio::resolve_line(*id) {
                Ok(bcm) => bcm,
                Err(e) => {
                    warn!("Button {} disabled: {}", name, e);
                    continue;
                }
            };
            let kind = if name.contains("Trigger") {
                LineKind::OutputOnly
            } else {
                LineKind::Watched
            };

            match open_line(driver, name, bcm, kind, config.release_level(), &edges) {
                Ok(pin) => {
                    info!(
                        "  - Button {}: GPIO{} (pin {}) {:?}",
                        name,
                        pin.id(),
                        gpio::header_pin(pin.id()).unwrap_or(0),
                        kind
                    );
                    lines.insert(
                        name.clone(),
                        OwnedLine {
                            kind,
                            pin: Mutex::new(pin),
                        },
                    );
                }
                Err(e) => warn!("Button {} disabled: {}", name, e),
            }
        }

        ControllerState {
            config: RwLock::new(config),
            lines,
            claimed: Mutex::new(HashSet::new()),
            store,
            events,
        }
    }

    pub fn config(&self) -> Configuration {
        self.config.read().clone()
    }

    pub fn with_config<R>(&self, f: impl FnOnce(&Configuration) -> R) -> R {
        f(&self.config.read())
    }

    /// Swap the whole configuration. Lines are not re-opened, so a button
    /// added here has no backing line until restart.
    pub fn replace_config(&self, config: Configuration) {
        for problem in config.validate() {
            warn!("Configuration: {}", problem);
        }
        for name in config.buttons.keys() {
            if !self.lines.contains_key(name) {
                warn!("Button {} has no open line until restart", name);
            }
        }
        *self.config.write() = config;
        info!("Configuration replaced");
    }

    /// Write the current configuration to the store and notify listeners.
    pub fn persist(&self) -> Result<()> {
        let config = self.config();
        self.store.save(&config)?;
        info!("Configuration saved");
        self.events.emit(ControllerEvent::ConfigSaved);
        Ok(())
    }

    /// Reload from the store and replace the current configuration.
    pub fn reload(&self) -> Result<()> {
        let config = self.store.load()?;
        self.replace_config(config);
        Ok(())
    }

    pub fn push_button(&self, name: &str) -> Result<()> {
        let level = self.config.read().press_level();
        self.manual_write(name, level)
    }

    pub fn release_button(&self, name: &str) -> Result<()> {
        let level = self.config.read().release_level();
        self.manual_write(name, level)
    }

    fn manual_write(&self, name: &str, level: Level) -> Result<()> {
        let line = self.line(name)?;
        let claimed = self.claimed.lock();
        if claimed.contains(name) {
            return Err(ControllerError::LineBusy(name.to_string()));
        }
        line.pin.lock().set_level(level)?;
        debug!("Button {} set to {}", name, level);
        Ok(())
    }

    fn line(&self, name: &str) -> Result<&OwnedLine> {
        match self.lines.get(name) {
            Some(line) => Ok(line),
            None if self.config.read().buttons.contains_key(name) => {
                Err(ControllerError::NoLine(name.to_string()))
            }
            None => Err(ControllerError::UnknownButton(name.to_string())),
        }
    }

    pub fn has_line(&self, name: &str) -> bool {
        self.lines.contains_key(name)
    }

    pub fn line_kind(&self, name: &str) -> Option<LineKind> {
        self.lines.get(name).map(|line| line.kind)
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        self.claimed.lock().contains(name)
    }

    /// Drive a line on behalf of the running sequence and keep it claimed
    /// until [`release_claimed`](Self::release_claimed).
    pub(crate) fn drive_claimed(&self, name: &str, level: Level) -> Result<()> {
        let line = self.line(name)?;
        let mut claimed = self.claimed.lock();
        claimed.insert(name.to_string());
        line.pin.lock().set_level(level)?;
        Ok(())
    }

    /// Hand every claimed line back: watched lines return to input, trigger
    /// axes return to the released level.
    pub(crate) fn release_claimed(&self) {
        let release = self.config.read().release_level();
        let mut claimed = self.claimed.lock();
        for name in claimed.drain() {
            let Some(line) = self.lines.get(&name) else {
                continue;
            };
            let mut pin = line.pin.lock();
            let result = match line.kind {
                LineKind::Watched => pin.set_input(),
                LineKind::OutputOnly => pin.set_level(release),
            };
            if let Err(e) = result {
                warn!("Failed to release button {}: {}", name, e);
            }
        }
    }

    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    /// Release every line. Called once at shutdown.
    pub fn shutdown(&self) {
        for (name, line) in &self.lines {
            line.pin.lock().release();
            debug!("Released button {}", name);
        }
    }
}

fn open_line(
    driver: &dyn GpioDriver,
    name: &str,
    bcm: u8,
    kind: LineKind,
    release: Level,
    edges: &mpsc::UnboundedSender<EdgeEvent>,
) -> std::result::Result<Box<dyn PinLine>, GpioError> {
    match kind {
        LineKind::OutputOnly => driver.open(bcm, Direction::Output(release)),
        LineKind::Watched => {
            let mut pin = driver.open(bcm, Direction::Input)?;
            let tx = edges.clone();
            let button = name.to_string();
            let callback: EdgeCallback = Arc::new(move |value| {
                let _ = tx.send(EdgeEvent {
                    button: button.clone(),
                    value,
                });
            });
            pin.watch(callback)?;
            Ok(pin)
        }
    }
}
