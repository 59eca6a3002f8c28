use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Actuator commands understood by the device firmware.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum CommandName {
    PumpOn,
    PumpOff,
    AutoOn,
}

impl CommandName {
    /// The wire name (`PUMP_ON`, ...).
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::PumpOn => "PUMP_ON",
            Self::PumpOff => "PUMP_OFF",
            Self::AutoOn => "AUTO_ON",
        }
    }
}

/// A command in flight. Lives only for the duration of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub name: CommandName,
    pub issued_at: DateTime<Utc>,
}

impl CommandRequest {
    pub fn new(name: CommandName) -> Self {
        Self {
            name,
            issued_at: Utc::now(),
        }
    }
}
