// ── Coordinator events ──
//
// Everything the presentation layer hears about: human-readable status
// lines plus typed notifications for state it renders.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::model::{DeviceDescriptor, SensorSnapshot};
use crate::scheduler::SchedulerState;

/// Which part of the system a status line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusSource {
    Api,
    Command,
    CommandError,
    Auth,
    Admin,
    Data,
    Auto,
    System,
}

impl StatusSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Api => "API",
            Self::Command => "COMMAND",
            Self::CommandError => "COMMAND_ERROR",
            Self::Auth => "Auth",
            Self::Admin => "Admin",
            Self::Data => "Data",
            Self::Auto => "Auto",
            Self::System => "System",
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, Self::CommandError)
    }
}

impl fmt::Display for StatusSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line for the event log, rendered `[HH:MM:SS] [SOURCE] message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub at: DateTime<Local>,
    pub source: StatusSource,
    pub message: String,
}

impl StatusLine {
    pub fn new(source: StatusSource, message: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            source,
            message: message.into(),
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.at.format("%H:%M:%S"),
            self.source,
            self.message
        )
    }
}

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionEndReason {
    /// The server answered 401.
    Expired,
    /// The user signed out.
    LoggedOut,
}

/// Broadcast to every subscriber of [`Coordinator::events`](super::Coordinator::events).
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    Status(StatusLine),
    DeviceUpdated(Arc<DeviceDescriptor>),
    SensorsUpdated(Arc<SensorSnapshot>),
    ControlsChanged { enabled: bool },
    SchedulerChanged(SchedulerState),
    SessionEnded { reason: SessionEndReason },
}
