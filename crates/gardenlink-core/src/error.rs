// ── Core error types ──
//
// One taxonomy for every caller: login, the poller, the command
// dispatcher and the admin operations all pattern-match on the same
// variants. Classification happens once per network call (see
// `classify`); nothing downstream re-wraps these.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Login failed: {message}")]
    InvalidCredentials { message: String },

    #[error("Session expired -- sign in again")]
    AuthExpired,

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("'{operation}' requires an admin account")]
    PermissionDenied { operation: String },

    // ── Request outcomes ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Rejected by server: {message}")]
    ServerRejected { message: String },

    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Connection error: {message}")]
    Network { message: String },

    #[error("Unexpected response from server: {message}")]
    MalformedResponse { message: String },

    // ── Coordination ─────────────────────────────────────────────────
    #[error("Another command is still in progress")]
    Busy,

    #[error("Coordinator is no longer running")]
    CoordinatorStopped,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` for the one kind that ends the session.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired)
    }

    /// Short tag used in status lines and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCredentials { .. } => "invalid_credentials",
            Self::AuthExpired => "auth_expired",
            Self::NotAuthenticated => "not_authenticated",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::Validation { .. } => "validation",
            Self::ServerRejected { .. } => "server_rejected",
            Self::Server { .. } => "server",
            Self::Network { .. } => "network",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::Busy => "busy",
            Self::CoordinatorStopped => "coordinator_stopped",
            Self::Config { .. } => "config",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<gardenlink_api::Error> for CoreError {
    fn from(err: gardenlink_api::Error) -> Self {
        match err {
            gardenlink_api::Error::Timeout { timeout_secs } => CoreError::Network {
                message: format!("request timed out after {timeout_secs}s"),
            },
            gardenlink_api::Error::Transport(ref e) if e.is_connect() => CoreError::Network {
                message: format!(
                    "cannot reach {}",
                    e.url()
                        .map_or_else(|| "<unknown>".into(), |u| u.to_string())
                ),
            },
            gardenlink_api::Error::Transport(e) => CoreError::Network {
                message: e.to_string(),
            },
            gardenlink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            gardenlink_api::Error::Tls(msg) => CoreError::Network {
                message: format!("TLS error: {msg}"),
            },
        }
    }
}
