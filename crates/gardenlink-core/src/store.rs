// ── Device state store ──
//
// Single-owner storage for the last known device descriptor and sensor
// snapshot. Only the coordinator's owner task holds `&mut` access, so
// there is no locking here; readers get cheap `Arc` snapshots through
// `watch` channels.
//
// Every fetch takes a sequence number when it is issued. A response is
// applied only if its number is at least the last applied number for the
// same category, so a slow, older response can never overwrite a newer one.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::model::{DeviceDescriptor, DeviceEdit, SensorSnapshot};

/// Which stream of responses a sequence number belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Device,
    Sensors,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Device => "device",
            Self::Sensors => "sensors",
        })
    }
}

/// Issue-time ordering token for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sequence {
    category: Category,
    value: u64,
}

impl Sequence {
    pub fn category(self) -> Category {
        self.category
    }

    pub fn value(self) -> u64 {
        self.value
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.category, self.value)
    }
}

/// What happened to an update handed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// An update issued later has already been applied.
    Stale { latest: u64 },
}

impl ApplyOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

#[derive(Debug, Default)]
struct SequenceClock {
    issued: u64,
    applied: Option<u64>,
}

impl SequenceClock {
    fn next(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn admit(&mut self, seq: u64) -> ApplyOutcome {
        match self.applied {
            Some(latest) if seq < latest => ApplyOutcome::Stale { latest },
            _ => {
                self.applied = Some(seq);
                ApplyOutcome::Applied
            }
        }
    }
}

/// The single owner of the latest device descriptor and sensor snapshot.
pub struct DeviceStateStore {
    device_clock: SequenceClock,
    sensors_clock: SequenceClock,
    device: watch::Sender<Arc<DeviceDescriptor>>,
    sensors: watch::Sender<Arc<SensorSnapshot>>,
    last_update: watch::Sender<Option<DateTime<Utc>>>,
}

impl DeviceStateStore {
    pub fn new() -> Self {
        let (device, _) = watch::channel(Arc::new(DeviceDescriptor::default()));
        let (sensors, _) = watch::channel(Arc::new(SensorSnapshot::default()));
        let (last_update, _) = watch::channel(None);

        Self {
            device_clock: SequenceClock::default(),
            sensors_clock: SequenceClock::default(),
            device,
            sensors,
            last_update,
        }
    }

    // ── Sequencing ───────────────────────────────────────────────────

    /// Take the next issue-time sequence number for `category`.
    pub fn next_sequence(&mut self, category: Category) -> Sequence {
        let value = self.clock(category).next();
        trace!(%category, value, "sequence issued");
        Sequence { category, value }
    }

    fn clock(&mut self, category: Category) -> &mut SequenceClock {
        match category {
            Category::Device => &mut self.device_clock,
            Category::Sensors => &mut self.sensors_clock,
        }
    }

    fn admit(&mut self, seq: Sequence, expected: Category) -> ApplyOutcome {
        debug_assert_eq!(seq.category, expected);
        let outcome = self.clock(seq.category).admit(seq.value);
        if let ApplyOutcome::Stale { latest } = outcome {
            debug!(%seq, latest, "discarding stale response");
        }
        outcome
    }

    // ── Updates ──────────────────────────────────────────────────────

    /// Replace the device descriptor wholesale.
    pub fn apply_device(&mut self, seq: Sequence, descriptor: DeviceDescriptor) -> ApplyOutcome {
        let outcome = self.admit(seq, Category::Device);
        if outcome.is_applied() {
            self.device.send_replace(Arc::new(descriptor));
            self.touch();
        }
        outcome
    }

    /// Field-level merge of an acknowledged admin edit. Fields the edit
    /// doesn't name survive until the next full fetch.
    pub fn merge_device_edit(&mut self, seq: Sequence, edit: &DeviceEdit) -> ApplyOutcome {
        let outcome = self.admit(seq, Category::Device);
        if outcome.is_applied() {
            let mut merged = DeviceDescriptor::clone(&self.device.borrow());
            merged.merge_edit(edit);
            self.device.send_replace(Arc::new(merged));
            self.touch();
        }
        outcome
    }

    /// Replace the sensor snapshot wholesale.
    pub fn apply_sensors(&mut self, seq: Sequence, snapshot: SensorSnapshot) -> ApplyOutcome {
        let outcome = self.admit(seq, Category::Sensors);
        if outcome.is_applied() {
            self.sensors.send_replace(Arc::new(snapshot));
            self.touch();
        }
        outcome
    }

    fn touch(&self) {
        self.last_update.send_replace(Some(Utc::now()));
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn current_device(&self) -> Arc<DeviceDescriptor> {
        Arc::clone(&self.device.borrow())
    }

    pub fn current_sensors(&self) -> Arc<SensorSnapshot> {
        Arc::clone(&self.sensors.borrow())
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.borrow()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_device(&self) -> watch::Receiver<Arc<DeviceDescriptor>> {
        self.device.subscribe()
    }

    pub fn subscribe_sensors(&self) -> watch::Receiver<Arc<SensorSnapshot>> {
        self.sensors.subscribe()
    }
}

impl Default for DeviceStateStore {
    fn default() -> Self {
        Self::new()
    }
}
