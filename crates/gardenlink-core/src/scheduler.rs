// ── Polling scheduler ──
//
// A cancellable periodic timer that asks the owner task for fetch cycles.
// The scheduler never performs I/O itself: it only emits `Tick`s. Each
// `start()` bumps a generation counter, and ticks from an older generation
// are refused, so a timer that fires just after `stop()` has no effect.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Whether the periodic timer is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Stopped,
    Running,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
        })
    }
}

/// A request for one fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// From the periodic timer armed by `start()`.
    Timer { generation: u64 },
    /// A one-shot refresh; valid in either state.
    Manual,
}

/// Shortest period the timer accepts; smaller intervals are raised to it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

pub struct PollingScheduler {
    interval: Duration,
    generation: u64,
    timer: Option<CancellationToken>,
    parent: CancellationToken,
    tick_tx: mpsc::Sender<Tick>,
    state: watch::Sender<SchedulerState>,
}

impl PollingScheduler {
    /// `parent` cancels any running timer when the owner shuts down.
    pub fn new(interval: Duration, tick_tx: mpsc::Sender<Tick>, parent: CancellationToken) -> Self {
        if interval < MIN_INTERVAL {
            warn!(
                requested_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
                "refresh interval too short, using the minimum"
            );
        }
        let interval = interval.max(MIN_INTERVAL);
        let (state, _) = watch::channel(SchedulerState::Stopped);
        Self {
            interval,
            generation: 0,
            timer: None,
            parent,
            tick_tx,
            state,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stopped → Running. The first tick fires immediately, then every
    /// `interval`. Returns `false` if already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }

        self.generation += 1;
        let cancel = self.parent.child_token();
        tokio::spawn(run_timer(
            self.interval,
            self.generation,
            self.tick_tx.clone(),
            cancel.clone(),
        ));
        self.timer = Some(cancel);
        self.state.send_replace(SchedulerState::Running);

        info!(
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            generation = self.generation,
            "polling started"
        );
        true
    }

    /// Running → Stopped. In-flight fetches are left to finish. Returns
    /// `false` if already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }

        if let Some(cancel) = self.timer.take() {
            cancel.cancel();
        }
        self.generation += 1;
        self.state.send_replace(SchedulerState::Stopped);

        info!("polling stopped");
        true
    }

    /// Flip between running and stopped; returns the new state.
    pub fn toggle(&mut self) -> SchedulerState {
        if self.is_running() {
            self.stop();
        } else {
            self.start();
        }
        self.state()
    }

    /// Queue one extra fetch cycle without touching the timer.
    pub fn manual_refresh(&self) -> bool {
        match self.tick_tx.try_send(Tick::Manual) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "manual refresh not queued");
                false
            }
        }
    }

    /// Whether `tick` should still produce a fetch cycle.
    pub fn accepts(&self, tick: Tick) -> bool {
        match tick {
            Tick::Manual => true,
            Tick::Timer { generation } => self.is_running() && generation == self.generation,
        }
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        if let Some(cancel) = self.timer.take() {
            cancel.cancel();
        }
    }
}

async fn run_timer(
    period: Duration,
    generation: u64,
    tx: mpsc::Sender<Tick>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if tx.send(Tick::Timer { generation }).await.is_err() {
                    break;
                }
            }
        }
    }
    debug!(generation, "poll timer exited");
}
