// ── Coordinator ──
//
// Public handle over the owner task. Handles are cheap to clone; every
// intent travels over an mpsc channel with a oneshot reply, and every
// observable piece of state is a `watch` receiver or the event broadcast.

mod event;
mod owner;
mod worker;

pub use event::{CoordinatorEvent, SessionEndReason, StatusLine, StatusSource};

use std::sync::Arc;

use gardenlink_api::GardenClient;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use self::owner::{Inbox, Intent, Outputs, Owner};
use self::worker::Reply;
use crate::config::CoordinatorConfig;
use crate::dispatcher::CommandDispatcher;
use crate::error::CoreError;
use crate::model::{CommandName, DeviceDescriptor, DeviceEdit, SensorSnapshot, UserId, UserRecord};
use crate::scheduler::{PollingScheduler, SchedulerState};
use crate::session::{AuthSession, Identity};
use crate::store::DeviceStateStore;

const INTENT_CHANNEL_SIZE: usize = 64;
const TICK_CHANNEL_SIZE: usize = 16;
const EVENT_CHANNEL_SIZE: usize = 256;

/// Entry point for a presentation layer.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Owns nothing mutable
/// itself: the background owner task does, and this handle only sends it
/// intents and reads what it publishes.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    identity: Identity,
    intent_tx: mpsc::Sender<Intent>,
    event_tx: broadcast::Sender<CoordinatorEvent>,
    device: watch::Receiver<Arc<DeviceDescriptor>>,
    sensors: watch::Receiver<Arc<SensorSnapshot>>,
    scheduler: watch::Receiver<SchedulerState>,
    session_valid: watch::Receiver<bool>,
    controls: watch::Receiver<bool>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    /// Start the owner task for a signed-in session.
    ///
    /// Must be called from inside a tokio runtime. Polling begins
    /// immediately when `config.auto_start` is set.
    pub fn spawn(client: GardenClient, session: AuthSession, config: CoordinatorConfig) -> Self {
        let cancel = CancellationToken::new();
        let (intent_tx, intents) = mpsc::channel(INTENT_CHANNEL_SIZE);
        let (completion_tx, completions) = mpsc::unbounded_channel();
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (tick_tx, ticks) = mpsc::channel(TICK_CHANNEL_SIZE);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (session_valid_tx, session_valid) = watch::channel(session.is_valid());
        let (controls_tx, controls) = watch::channel(session.is_valid());

        let store = DeviceStateStore::new();
        let scheduler = PollingScheduler::new(config.refresh_interval, tick_tx, cancel.clone());
        let dispatcher = CommandDispatcher::new(config.command_watchdog);

        let device = store.subscribe_device();
        let sensors = store.subscribe_sensors();
        let scheduler_state = scheduler.subscribe();
        let identity = session.identity().clone();

        let owner = Owner::new(
            client,
            session,
            config.clone(),
            store,
            scheduler,
            dispatcher,
            Outputs {
                events: event_tx.clone(),
                session_valid: session_valid_tx,
                controls: controls_tx,
            },
            completion_tx,
            command_tx,
        );
        let inbox = Inbox {
            intents,
            completions,
            commands,
            ticks,
        };
        let task = tokio::spawn(owner.run(inbox, cancel.clone()));
        debug!(device_id = %config.device_id, "coordinator spawned");

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                identity,
                intent_tx,
                event_tx,
                device,
                sensors,
                scheduler: scheduler_state,
                session_valid,
                controls,
                cancel,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Who is signed in. Stays readable after the session ends.
    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    // ── Intents ──────────────────────────────────────────────────────

    /// Run one fetch cycle now and wait for both halves to land.
    pub async fn manual_refresh(&self) -> Result<(), CoreError> {
        self.request(|reply| Intent::ManualRefresh { reply }).await
    }

    /// Flip auto-refresh; returns the new scheduler state.
    pub async fn toggle_auto(&self) -> Result<SchedulerState, CoreError> {
        self.request(|reply| Intent::ToggleAuto { reply }).await
    }

    pub async fn start_polling(&self) -> Result<SchedulerState, CoreError> {
        self.request(|reply| Intent::StartPolling { reply }).await
    }

    pub async fn stop_polling(&self) -> Result<SchedulerState, CoreError> {
        self.request(|reply| Intent::StopPolling { reply }).await
    }

    /// Send an actuator command. Fails fast with `Busy` while another one
    /// is outstanding.
    pub async fn send_command(&self, name: CommandName) -> Result<(), CoreError> {
        self.request(|reply| Intent::SendCommand { name, reply }).await
    }

    /// Admin only. Returns the descriptor after the edit has been merged.
    pub async fn save_device_info(&self, edit: DeviceEdit) -> Result<Arc<DeviceDescriptor>, CoreError> {
        self.request(|reply| Intent::SaveDeviceInfo { edit, reply }).await
    }

    /// Admin only.
    pub async fn list_users(&self) -> Result<Vec<UserRecord>, CoreError> {
        self.request(|reply| Intent::ListUsers { reply }).await
    }

    /// Admin only; refuses the signed-in account.
    pub async fn delete_user(&self, id: UserId) -> Result<(), CoreError> {
        self.request(|reply| Intent::DeleteUser { id, reply }).await
    }

    /// End the session. Idempotent.
    pub async fn logout(&self) -> Result<(), CoreError> {
        self.request(|reply| Intent::Logout { reply }).await
    }

    /// Stop the owner task and wait for it to exit. In-flight workers are
    /// not awaited.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self.inner.task.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        debug!("coordinator shut down");
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Intent) -> Result<T, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .intent_tx
            .send(make(tx))
            .await
            .map_err(|_| CoreError::CoordinatorStopped)?;
        rx.await.map_err(|_| CoreError::CoordinatorStopped)?
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn current_device(&self) -> Arc<DeviceDescriptor> {
        Arc::clone(&self.inner.device.borrow())
    }

    pub fn current_sensors(&self) -> Arc<SensorSnapshot> {
        Arc::clone(&self.inner.sensors.borrow())
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        *self.inner.scheduler.borrow()
    }

    pub fn session_valid(&self) -> bool {
        *self.inner.session_valid.borrow()
    }

    /// `false` while a command is outstanding or after sign-out.
    pub fn controls_enabled(&self) -> bool {
        *self.inner.controls.borrow()
    }

    pub fn watch_device(&self) -> watch::Receiver<Arc<DeviceDescriptor>> {
        self.inner.device.clone()
    }

    pub fn watch_sensors(&self) -> watch::Receiver<Arc<SensorSnapshot>> {
        self.inner.sensors.clone()
    }

    pub fn watch_scheduler(&self) -> watch::Receiver<SchedulerState> {
        self.inner.scheduler.clone()
    }

    pub fn watch_session(&self) -> watch::Receiver<bool> {
        self.inner.session_valid.clone()
    }

    pub fn watch_controls(&self) -> watch::Receiver<bool> {
        self.inner.controls.clone()
    }

    /// Subscribe to status lines and state notifications.
    pub fn events(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.inner.event_tx.subscribe()
    }
}
