//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use gardenlink_config::ConfigError;
use gardenlink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const PERMISSION: i32 = 5;
    pub const BUSY: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the gateway: {reason}")]
    #[diagnostic(
        code(gardenlink::connection_failed),
        help(
            "Check that the gateway is running and reachable from this machine.\n\
             Try: gardenlink status --server http://<host>:8080/api"
        )
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Login failed: {message}")]
    #[diagnostic(
        code(gardenlink::auth_failed),
        help(
            "Verify your email and password.\n\
             Run: gardenlink config set-password --profile {profile}"
        )
    )]
    AuthFailed { message: String, profile: String },

    #[error("Session expired")]
    #[diagnostic(
        code(gardenlink::session_expired),
        help("The gateway rejected the token. Run the command again to sign in.")
    )]
    SessionExpired,

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(gardenlink::no_credentials),
        help(
            "Configure credentials with: gardenlink config init\n\
             Or set GARDENLINK_EMAIL and GARDENLINK_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    #[error("'{operation}' requires an admin account")]
    #[diagnostic(
        code(gardenlink::permission_denied),
        help("Sign in with an admin account to edit devices or manage users.")
    )]
    PermissionDenied { operation: String },

    // ── Commands ─────────────────────────────────────────────────────
    #[error("Another command is still in progress")]
    #[diagnostic(
        code(gardenlink::busy),
        help("Wait for the previous command to finish and try again.")
    )]
    Busy,

    // ── API ──────────────────────────────────────────────────────────
    #[error("Server error (HTTP {status}): {message}")]
    #[diagnostic(code(gardenlink::server_error))]
    Server { status: u16, message: String },

    #[error("Rejected by server: {message}")]
    #[diagnostic(code(gardenlink::rejected))]
    Rejected { message: String },

    #[error("Unexpected response from server: {message}")]
    #[diagnostic(
        code(gardenlink::malformed_response),
        help("The gateway may be running an incompatible API version.")
    )]
    MalformedResponse { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(gardenlink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(gardenlink::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: gardenlink config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No gateway configured")]
    #[diagnostic(
        code(gardenlink::no_config),
        help(
            "Create a profile with: gardenlink config init\n\
             Or pass --server and --device.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(gardenlink::config))]
    Config(Box<ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(gardenlink::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Session plumbing ─────────────────────────────────────────────
    #[error("The session coordinator stopped unexpectedly")]
    #[diagnostic(code(gardenlink::coordinator_stopped))]
    CoordinatorStopped,

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::SessionExpired | Self::NoCredentials { .. } => {
                exit_code::AUTH
            }
            Self::PermissionDenied { .. } => exit_code::PERMISSION,
            Self::Busy => exit_code::BUSY,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Network { message } => CliError::ConnectionFailed { reason: message },

            CoreError::InvalidCredentials { message } => CliError::AuthFailed {
                message,
                profile: "current".into(),
            },

            CoreError::AuthExpired | CoreError::NotAuthenticated => CliError::SessionExpired,

            CoreError::PermissionDenied { operation } => CliError::PermissionDenied { operation },

            CoreError::Busy => CliError::Busy,

            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::ServerRejected { message } => CliError::Rejected { message },

            CoreError::Server { status, message } => CliError::Server { status, message },

            CoreError::MalformedResponse { message } => CliError::MalformedResponse { message },

            CoreError::CoordinatorStopped => CliError::CoordinatorStopped,

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: "(see: gardenlink config show)".into(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(Box::new(other)),
        }
    }
}
