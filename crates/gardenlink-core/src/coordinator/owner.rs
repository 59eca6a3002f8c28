// ── Owner task ──
//
// The only place that mutates the session, the store, the scheduler and
// the command slot. It waits on four inputs (intents from handles, worker
// completions, command outcomes, scheduler ticks), applies what they say,
// and spawns workers for anything that needs the network. It never awaits
// a request itself.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use gardenlink_api::GardenClient;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::event::{CoordinatorEvent, SessionEndReason, StatusLine, StatusSource};
use super::worker::{self, Completion, Reply};
use crate::config::CoordinatorConfig;
use crate::dispatcher::{CommandDispatcher, CommandGuard, CommandOutcome, TicketId};
use crate::error::CoreError;
use crate::model::{CommandName, DeviceDescriptor, DeviceEdit, UserId};
use crate::scheduler::{PollingScheduler, SchedulerState, Tick};
use crate::session::AuthSession;
use crate::store::{Category, DeviceStateStore};

/// Requests from a `Coordinator` handle.
pub(crate) enum Intent {
    ManualRefresh { reply: Reply<()> },
    ToggleAuto { reply: Reply<SchedulerState> },
    StartPolling { reply: Reply<SchedulerState> },
    StopPolling { reply: Reply<SchedulerState> },
    SendCommand { name: CommandName, reply: Reply<()> },
    SaveDeviceInfo { edit: DeviceEdit, reply: Reply<Arc<DeviceDescriptor>> },
    ListUsers { reply: Reply<Vec<crate::model::UserRecord>> },
    DeleteUser { id: UserId, reply: Reply<()> },
    Logout { reply: Reply<()> },
}

/// Input channels the owner loop selects over.
pub(crate) struct Inbox {
    pub intents: mpsc::Receiver<Intent>,
    pub completions: mpsc::UnboundedReceiver<Completion>,
    pub commands: mpsc::UnboundedReceiver<CommandOutcome>,
    pub ticks: mpsc::Receiver<Tick>,
}

/// Channels the owner publishes on; handles hold the receiving ends.
pub(crate) struct Outputs {
    pub events: broadcast::Sender<CoordinatorEvent>,
    pub session_valid: watch::Sender<bool>,
    pub controls: watch::Sender<bool>,
}

/// A fetch cycle somebody is waiting on.
struct PendingCycle {
    remaining: u8,
    first_error: Option<CoreError>,
    reply: Reply<()>,
}

pub(crate) struct Owner {
    client: GardenClient,
    session: AuthSession,
    config: CoordinatorConfig,
    store: DeviceStateStore,
    scheduler: PollingScheduler,
    dispatcher: CommandDispatcher,
    out: Outputs,
    completion_tx: mpsc::UnboundedSender<Completion>,
    command_tx: mpsc::UnboundedSender<CommandOutcome>,
    pending_manual: VecDeque<Reply<()>>,
    cycles: HashMap<u64, PendingCycle>,
    next_cycle: u64,
    command_reply: Option<(TicketId, CommandName, Reply<()>)>,
}

impl Owner {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        client: GardenClient,
        session: AuthSession,
        config: CoordinatorConfig,
        store: DeviceStateStore,
        scheduler: PollingScheduler,
        dispatcher: CommandDispatcher,
        out: Outputs,
        completion_tx: mpsc::UnboundedSender<Completion>,
        command_tx: mpsc::UnboundedSender<CommandOutcome>,
    ) -> Self {
        Self {
            client,
            session,
            config,
            store,
            scheduler,
            dispatcher,
            out,
            completion_tx,
            command_tx,
            pending_manual: VecDeque::new(),
            cycles: HashMap::new(),
            next_cycle: 0,
            command_reply: None,
        }
    }

    pub(crate) async fn run(mut self, mut inbox: Inbox, cancel: CancellationToken) {
        self.status(
            StatusSource::System,
            format!(
                "Signed in as {} ({}), watching device {}",
                self.session.username(),
                self.session.role(),
                self.config.device_id
            ),
        );
        if self.config.auto_start {
            self.set_polling(true);
        }

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(outcome) = inbox.commands.recv() => self.on_command_outcome(outcome),
                Some(completion) = inbox.completions.recv() => self.on_completion(completion),
                Some(tick) = inbox.ticks.recv() => self.on_tick(tick),
                intent = inbox.intents.recv() => {
                    let Some(intent) = intent else { break };
                    self.on_intent(intent);
                }
            }
        }

        self.scheduler.stop();
        info!("coordinator stopped");
    }

    // ── Intents ──────────────────────────────────────────────────────

    fn on_intent(&mut self, intent: Intent) {
        match intent {
            Intent::ManualRefresh { reply } => {
                if let Err(e) = self.require_session() {
                    let _ = reply.send(Err(e));
                    return;
                }
                self.status(StatusSource::Data, "Manual refresh requested...");
                if self.scheduler.manual_refresh() {
                    self.pending_manual.push_back(reply);
                } else {
                    debug!("refresh already queued");
                    let _ = reply.send(Ok(()));
                }
            }
            Intent::ToggleAuto { reply } => {
                let _ = reply.send(self.toggle_polling());
            }
            Intent::StartPolling { reply } => {
                let _ = reply.send(self.polling_intent(true));
            }
            Intent::StopPolling { reply } => {
                let _ = reply.send(self.polling_intent(false));
            }
            Intent::SendCommand { name, reply } => self.dispatch_command(name, reply),
            Intent::SaveDeviceInfo { edit, reply } => self.save_device_info(edit, reply),
            Intent::ListUsers { reply } => self.list_users(reply),
            Intent::DeleteUser { id, reply } => self.delete_user(id, reply),
            Intent::Logout { reply } => {
                self.end_session(SessionEndReason::LoggedOut);
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn require_session(&self) -> Result<(), CoreError> {
        if self.session.is_valid() {
            Ok(())
        } else {
            Err(CoreError::NotAuthenticated)
        }
    }

    fn require_admin(&self, operation: &str) -> Result<(), CoreError> {
        self.require_session()?;
        if self.session.is_admin() {
            Ok(())
        } else {
            warn!(operation, username = self.session.username(), "admin operation refused");
            Err(CoreError::PermissionDenied {
                operation: operation.into(),
            })
        }
    }

    fn polling_intent(&mut self, enable: bool) -> Result<SchedulerState, CoreError> {
        if enable {
            self.require_session()?;
        }
        self.set_polling(enable);
        Ok(self.scheduler.state())
    }

    fn toggle_polling(&mut self) -> Result<SchedulerState, CoreError> {
        if !self.scheduler.is_running() {
            self.require_session()?;
        }
        let state = self.scheduler.toggle();
        self.announce_polling(state);
        Ok(state)
    }

    fn set_polling(&mut self, enable: bool) {
        let changed = if enable {
            self.scheduler.start()
        } else {
            self.scheduler.stop()
        };
        if changed {
            self.announce_polling(self.scheduler.state());
        }
    }

    fn announce_polling(&self, state: SchedulerState) {
        let message = match state {
            SchedulerState::Running => format!(
                "Auto refresh started (every {} ms).",
                self.scheduler.interval().as_millis()
            ),
            SchedulerState::Stopped => "Auto refresh stopped.".to_owned(),
        };
        self.status(StatusSource::Auto, message);
        self.emit(CoordinatorEvent::SchedulerChanged(state));
    }

    // ── Fetch cycles ─────────────────────────────────────────────────

    fn on_tick(&mut self, tick: Tick) {
        let reply = match tick {
            Tick::Manual => self.pending_manual.pop_front(),
            Tick::Timer { .. } => None,
        };

        if !self.scheduler.accepts(tick) {
            debug!(?tick, "ignoring tick from a stopped timer");
            return;
        }
        if let Err(e) = self.require_session() {
            if let Some(reply) = reply {
                let _ = reply.send(Err(e));
            }
            return;
        }

        self.issue_cycle(reply);
    }

    /// One telemetry fetch and one device fetch, issued together.
    fn issue_cycle(&mut self, reply: Option<Reply<()>>) {
        let cycle = reply.map(|reply| {
            self.next_cycle += 1;
            self.cycles.insert(
                self.next_cycle,
                PendingCycle {
                    remaining: 2,
                    first_error: None,
                    reply,
                },
            );
            self.next_cycle
        });

        self.issue_sensor_fetch(cycle);
        self.issue_device_fetch(cycle);
    }

    fn issue_sensor_fetch(&mut self, cycle: Option<u64>) {
        let seq = self.store.next_sequence(Category::Sensors);
        let client = self.client.clone();
        let token = self.session.token().clone();
        let template = self.config.telemetry_path.clone();
        let device_id = self.config.device_id.clone();
        let tx = self.completion_tx.clone();

        tokio::spawn(async move {
            let result = worker::fetch_sensors(&client, &token, &template, &device_id).await;
            let _ = tx.send(Completion::Sensors { cycle, seq, result });
        });
    }

    fn issue_device_fetch(&mut self, cycle: Option<u64>) {
        let seq = self.store.next_sequence(Category::Device);
        let client = self.client.clone();
        let token = self.session.token().clone();
        let device_id = self.config.device_id.clone();
        let tx = self.completion_tx.clone();

        tokio::spawn(async move {
            let result = worker::fetch_device(&client, &token, &device_id).await;
            let _ = tx.send(Completion::Device { cycle, seq, result });
        });
    }

    fn finish_cycle_part(&mut self, cycle: Option<u64>, error: Option<CoreError>) {
        let Some(id) = cycle else { return };
        let Some(pending) = self.cycles.get_mut(&id) else {
            return;
        };

        pending.remaining = pending.remaining.saturating_sub(1);
        if pending.first_error.is_none() {
            pending.first_error = error;
        }
        if pending.remaining > 0 {
            return;
        }

        if let Some(done) = self.cycles.remove(&id) {
            let result = match done.first_error {
                Some(e) => Err(e),
                None => self.require_session(),
            };
            let _ = done.reply.send(result);
        }
    }

    // ── Completions ──────────────────────────────────────────────────

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Sensors { cycle, seq, result } => {
                let error = match result {
                    Ok(_) if !self.session.is_valid() => {
                        debug!(%seq, "dropping telemetry that arrived after sign-out");
                        None
                    }
                    Ok(snapshot) => {
                        if self.store.apply_sensors(seq, snapshot).is_applied() {
                            self.emit(CoordinatorEvent::SensorsUpdated(
                                self.store.current_sensors(),
                            ));
                        }
                        None
                    }
                    Err(e) => {
                        self.on_fetch_error("Fetch error", &e);
                        Some(e)
                    }
                };
                self.finish_cycle_part(cycle, error);
            }
            Completion::Device { cycle, seq, result } => {
                let error = match result {
                    Ok(_) if !self.session.is_valid() => {
                        debug!(%seq, "dropping device info that arrived after sign-out");
                        None
                    }
                    Ok(descriptor) => {
                        if self.store.apply_device(seq, descriptor).is_applied() {
                            self.emit(CoordinatorEvent::DeviceUpdated(self.store.current_device()));
                        }
                        None
                    }
                    Err(e) => {
                        self.on_fetch_error("Error fetching info", &e);
                        Some(e)
                    }
                };
                self.finish_cycle_part(cycle, error);
            }
            Completion::DeviceSaved {
                seq,
                edit,
                result,
                reply,
            } => {
                let result = self.gate_late(result).map(|()| {
                    if self.store.merge_device_edit(seq, &edit).is_applied() {
                        self.emit(CoordinatorEvent::DeviceUpdated(self.store.current_device()));
                    }
                    self.status(StatusSource::Admin, "Device info saved.");
                    self.store.current_device()
                });
                if let Err(e) = &result {
                    self.on_admin_error("Failed to save device info", e);
                }
                let _ = reply.send(result);
            }
            Completion::UsersListed { result, reply } => {
                let result = self.gate_late(result);
                if let Err(e) = &result {
                    self.on_admin_error("Failed to load users", e);
                }
                let _ = reply.send(result);
            }
            Completion::UserDeleted { id, result, reply } => {
                let result = self.gate_late(result);
                match &result {
                    Ok(()) => self.status(StatusSource::Admin, format!("User {id} deleted.")),
                    Err(e) => self.on_admin_error(&format!("Failed to delete {id}"), e),
                }
                let _ = reply.send(result);
            }
        }
    }

    /// A success that arrives after the session ended is not applied; the
    /// caller learns the session is gone instead.
    fn gate_late<T>(&self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        let value = result?;
        self.require_session()?;
        Ok(value)
    }

    fn on_fetch_error(&mut self, what: &str, error: &CoreError) {
        if !self.session.is_valid() {
            debug!(error = %error, "dropping failure that arrived after sign-out");
            return;
        }
        if error.is_auth_expired() {
            self.end_session(SessionEndReason::Expired);
            return;
        }
        warn!(kind = error.kind(), error = %error, "{what}");
        self.status(StatusSource::Api, format!("{what}: {error}"));
    }

    fn on_admin_error(&mut self, what: &str, error: &CoreError) {
        if error.is_auth_expired() {
            self.end_session(SessionEndReason::Expired);
        } else if self.session.is_valid() {
            warn!(kind = error.kind(), error = %error, "{what}");
            self.status(StatusSource::Admin, format!("{what}: {error}"));
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    fn dispatch_command(&mut self, name: CommandName, reply: Reply<()>) {
        if let Err(e) = self.require_session() {
            let _ = reply.send(Err(e));
            return;
        }
        let (ticket, request) = match self.dispatcher.try_acquire(name) {
            Ok(acquired) => acquired,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        self.status(StatusSource::Command, format!("Sending command: {name}"));
        self.command_reply = Some((ticket, name, reply));
        self.refresh_controls();

        let guard = CommandGuard::new(ticket, self.command_tx.clone());
        let watchdog = self.dispatcher.watchdog();
        let client = self.client.clone();
        let token = self.session.token().clone();
        let device_id = self.config.device_id.clone();
        debug!(command = %request.name, issued_at = %request.issued_at, "command dispatched");

        tokio::spawn(async move {
            let call = worker::send_command(&client, &token, &device_id, name);
            let result = match watchdog {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or_else(|_| {
                        Err(CoreError::Network {
                            message: "command timed out".into(),
                        })
                    }),
                None => call.await,
            };
            guard.finish(result);
        });
    }

    fn on_command_outcome(&mut self, outcome: CommandOutcome) {
        self.dispatcher.release(outcome.ticket);
        let reply = match self.command_reply.take() {
            Some((ticket, name, reply)) if ticket == outcome.ticket => Some((name, reply)),
            other => {
                self.command_reply = other;
                None
            }
        };
        self.refresh_controls();

        let result = outcome.result.unwrap_or_else(|| {
            Err(CoreError::Network {
                message: "command worker stopped before reporting".into(),
            })
        });
        let name = reply
            .as_ref()
            .map_or_else(|| "command".to_owned(), |(name, _)| name.to_string());

        let result = if self.session.is_valid() {
            match &result {
                Ok(()) => {
                    self.status(
                        StatusSource::Command,
                        format!("Successfully sent '{name}' command."),
                    );
                    self.issue_device_fetch(None);
                }
                Err(e) if e.is_auth_expired() => {
                    self.status(StatusSource::CommandError, format!("Failed to send command: {e}"));
                    self.end_session(SessionEndReason::Expired);
                }
                Err(e) => {
                    warn!(command = %name, kind = e.kind(), error = %e, "command failed");
                    self.status(StatusSource::CommandError, format!("Failed to send command: {e}"));
                }
            }
            result
        } else {
            result.and(Err(CoreError::NotAuthenticated))
        };

        if let Some((_, reply)) = reply {
            let _ = reply.send(result);
        }
    }

    // ── Admin operations ─────────────────────────────────────────────

    fn save_device_info(&mut self, edit: DeviceEdit, reply: Reply<Arc<DeviceDescriptor>>) {
        if let Err(e) = self
            .require_admin("save device info")
            .and_then(|()| edit.validate())
        {
            let _ = reply.send(Err(e));
            return;
        }

        let seq = self.store.next_sequence(Category::Device);
        let client = self.client.clone();
        let token = self.session.token().clone();
        let device_id = self.config.device_id.clone();
        let tx = self.completion_tx.clone();

        tokio::spawn(async move {
            let result = worker::save_device(&client, &token, &device_id, &edit).await;
            let _ = tx.send(Completion::DeviceSaved {
                seq,
                edit,
                result,
                reply,
            });
        });
    }

    fn list_users(&mut self, reply: Reply<Vec<crate::model::UserRecord>>) {
        if let Err(e) = self.require_admin("list users") {
            let _ = reply.send(Err(e));
            return;
        }

        let client = self.client.clone();
        let token = self.session.token().clone();
        let tx = self.completion_tx.clone();

        tokio::spawn(async move {
            let result = worker::list_users(&client, &token).await;
            let _ = tx.send(Completion::UsersListed { result, reply });
        });
    }

    fn delete_user(&mut self, id: UserId, reply: Reply<()>) {
        if let Err(e) = self.require_admin("delete user") {
            let _ = reply.send(Err(e));
            return;
        }
        if self.session.user_id() == Some(&id) {
            let _ = reply.send(Err(CoreError::validation(
                "cannot delete the account you are signed in with",
            )));
            return;
        }

        let client = self.client.clone();
        let token = self.session.token().clone();
        let tx = self.completion_tx.clone();

        tokio::spawn(async move {
            let result = worker::delete_user(&client, &token, &id).await;
            let _ = tx.send(Completion::UserDeleted { id, result, reply });
        });
    }

    // ── Session and outputs ──────────────────────────────────────────

    /// Invalidate the session and tell everyone, exactly once.
    fn end_session(&mut self, reason: SessionEndReason) {
        if !self.session.invalidate() {
            return;
        }

        self.set_polling(false);
        self.out.session_valid.send_replace(false);
        self.refresh_controls();

        match reason {
            SessionEndReason::Expired => {
                warn!("session expired");
                self.status(StatusSource::Auth, "Token expired.");
            }
            SessionEndReason::LoggedOut => {
                info!("signed out");
                self.status(StatusSource::Auth, "Signed out.");
            }
        }
        self.emit(CoordinatorEvent::SessionEnded { reason });
    }

    fn refresh_controls(&mut self) {
        let enabled = self.session.is_valid() && !self.dispatcher.is_busy();
        let previous = self.out.controls.send_replace(enabled);
        if previous != enabled {
            self.emit(CoordinatorEvent::ControlsChanged { enabled });
        }
    }

    fn status(&self, source: StatusSource, message: impl Into<String>) {
        let line = StatusLine::new(source, message);
        debug!(source = %line.source, message = %line.message, "status");
        self.emit(CoordinatorEvent::Status(line));
    }

    fn emit(&self, event: CoordinatorEvent) {
        // No subscribers is fine.
        let _ = self.out.events.send(event);
    }
}
