use crate::config::Configuration;
use crate::error::{ControllerError, Result};
use serde::{Deserialize, Serialize};

/// Requests accepted from a remote client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
    GetConfig,
    SaveConfig {
        config: Configuration,
    },
    GetActiveTriggers,
    SetActiveTriggers {
        indices: Vec<usize>,
    },
    /// Enable one action's trigger, keeping the others.
    SetTrigger {
        index: usize,
    },
    #[serde(rename_all = "camelCase")]
    Execute {
        action_index: usize,
        #[serde(default)]
        repeat: Option<i64>,
    },
    PushButton {
        button: String,
    },
    ReleaseButton {
        button: String,
    },
}

/// Direct answer to a [`Command`]. Run outcomes arrive later as events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reply", rename_all = "camelCase")]
pub enum Reply {
    Config { config: Configuration },
    ActiveTriggers { indices: Vec<usize> },
    Accepted,
    Error { message: String },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetConfig => "getConfig",
            Command::SaveConfig { .. } => "saveConfig",
            Command::GetActiveTriggers => "getActiveTriggers",
            Command::SetActiveTriggers { .. } => "setActiveTriggers",
            Command::SetTrigger { .. } => "setTrigger",
            Command::Execute { .. } => "execute",
            Command::PushButton { .. } => "pushButton",
            Command::ReleaseButton { .. } => "releaseButton",
        }
    }
}

/// Repeat count for `execute`: absent means once, negative is rejected.
pub fn repeat_count(repeat: Option<i64>) -> Result<u32> {
    match repeat {
        None => Ok(1),
        Some(n) if n < 0 => Err(ControllerError::InvalidRepeat(n)),
        Some(n) => Ok(u32::try_from(n).unwrap_or(u32::MAX)),
    }
}

impl From<ControllerError> for Reply {
    fn from(e: ControllerError) -> Self {
        Reply::Error {
            message: e.to_string(),
        }
    }
}
