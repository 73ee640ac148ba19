use thiserror::Error;

/// Failures raised by a GPIO driver or one of its lines.
#[derive(Error, Debug)]
pub enum GpioError {
    #[error("GPIO {0} is not a usable header line")]
    Unresolved(u32),

    #[error("GPIO {line}: {source}")]
    Driver {
        line: u8,
        #[source]
        source: rppal::gpio::Error,
    },

    #[error("GPIO {line}: {message}")]
    Line { line: u8, message: String },
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Unknown button: {0}")]
    UnknownButton(String),

    #[error("Button {0} has no open line")]
    NoLine(String),

    #[error("Button {0} is driven by the running sequence")]
    LineBusy(String),

    #[error("Repeat count must not be negative (got {0})")]
    InvalidRepeat(i64),

    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ControllerError>;
