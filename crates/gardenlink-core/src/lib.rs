// gardenlink-core: session, polling and command coordination between
// gardenlink-api and a presentation layer (the CLI).

pub mod classify;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod session;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use classify::{Classification, classify};
pub use config::{ConnectionConfig, CoordinatorConfig, DEFAULT_REFRESH_INTERVAL, TlsVerification};
pub use coordinator::{Coordinator, CoordinatorEvent, SessionEndReason, StatusLine, StatusSource};
pub use error::CoreError;
pub use scheduler::SchedulerState;
pub use session::{AuthSession, Authenticator, Identity, Registration};
pub use store::{ApplyOutcome, Category, DeviceStateStore, Sequence};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    CommandName, CommandRequest, DeviceDescriptor, DeviceEdit, Role, Sensor, SensorSnapshot,
    UNKNOWN_READING, UserId, UserRecord,
};
