// ── Command dispatcher guard ──
//
// At most one actuator command may be outstanding per device. The owner
// task acquires a ticket before spawning the worker; the worker carries a
// `CommandGuard` whose drop always reports back, so the slot is freed on
// every exit path (success, failure, watchdog, panic, abort).

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{CommandName, CommandRequest};

/// Identifies one acquisition of the command slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TicketId(u64);

/// How a command worker finished.
#[derive(Debug)]
pub struct CommandOutcome {
    pub ticket: TicketId,
    /// `None` when the worker went away without reporting.
    pub result: Option<Result<(), CoreError>>,
}

/// The outstanding-command slot.
pub struct CommandDispatcher {
    next_ticket: u64,
    outstanding: Option<(TicketId, CommandRequest)>,
    watchdog: Option<Duration>,
}

impl CommandDispatcher {
    pub fn new(watchdog: Option<Duration>) -> Self {
        Self {
            next_ticket: 0,
            outstanding: None,
            watchdog,
        }
    }

    pub fn watchdog(&self) -> Option<Duration> {
        self.watchdog
    }

    pub fn is_busy(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Claim the slot for `name`, or fail with `Busy`.
    pub fn try_acquire(&mut self, name: CommandName) -> Result<(TicketId, CommandRequest), CoreError> {
        if let Some((_, current)) = &self.outstanding {
            debug!(requested = %name, outstanding = %current.name, "command rejected: busy");
            return Err(CoreError::Busy);
        }

        self.next_ticket += 1;
        let ticket = TicketId(self.next_ticket);
        let request = CommandRequest::new(name);
        self.outstanding = Some((ticket, request.clone()));
        Ok((ticket, request))
    }

    /// Free the slot. Ignores tickets that no longer hold it.
    pub fn release(&mut self, ticket: TicketId) -> Option<CommandRequest> {
        match self.outstanding.take() {
            Some((held, request)) if held == ticket => Some(request),
            other => {
                warn!(?ticket, "release for a ticket that does not hold the slot");
                self.outstanding = other;
                None
            }
        }
    }
}

// ── Drop guard ───────────────────────────────────────────────────

/// Held by the command worker; reports exactly once.
pub struct CommandGuard {
    ticket: TicketId,
    tx: mpsc::UnboundedSender<CommandOutcome>,
    reported: bool,
}

impl CommandGuard {
    pub fn new(ticket: TicketId, tx: mpsc::UnboundedSender<CommandOutcome>) -> Self {
        Self {
            ticket,
            tx,
            reported: false,
        }
    }

    /// Report the worker's result and disarm the drop path.
    pub fn finish(mut self, result: Result<(), CoreError>) {
        self.reported = true;
        let _ = self.tx.send(CommandOutcome {
            ticket: self.ticket,
            result: Some(result),
        });
    }
}

impl Drop for CommandGuard {
    fn drop(&mut self) {
        if !self.reported {
            let _ = self.tx.send(CommandOutcome {
                ticket: self.ticket,
                result: None,
            });
        }
    }
}
