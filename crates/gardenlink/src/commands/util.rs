//! Shared helpers for command handlers.

use std::io::IsTerminal;

use tracing::debug;

use gardenlink_core::{AuthSession, Authenticator, Coordinator, CoreError};

use crate::cli::GlobalOpts;
use crate::config::{self, Resolved};
use crate::error::CliError;

/// Sign in with the resolved profile's credentials.
pub async fn authenticate(global: &GlobalOpts) -> Result<(Resolved, Authenticator, AuthSession), CliError> {
    let resolved = config::resolve(global)?;
    let client = resolved.settings.connection.build_client()?;
    let auth = Authenticator::new(client);

    debug!(profile = %resolved.profile_name, email = %resolved.email, "signing in");
    let session = auth
        .login(&resolved.email, &resolved.password)
        .await
        .map_err(|e| match e {
            CoreError::InvalidCredentials { message } => CliError::AuthFailed {
                message,
                profile: resolved.profile_name.clone(),
            },
            other => other.into(),
        })?;

    Ok((resolved, auth, session))
}

/// Sign in and start a coordinator for the profile's device.
///
/// `tweak` adjusts the coordinator config (auto-start, interval) before
/// spawning.
pub async fn sign_in(
    global: &GlobalOpts,
    tweak: impl FnOnce(&mut gardenlink_core::CoordinatorConfig),
) -> Result<Coordinator, CliError> {
    let (resolved, auth, session) = authenticate(global).await?;
    let mut coordinator_config = resolved.settings.coordinator;
    tweak(&mut coordinator_config);
    Ok(Coordinator::spawn(
        auth.client().clone(),
        session,
        coordinator_config,
    ))
}

/// End the session and stop the owner task.
pub async fn sign_out(coordinator: &Coordinator) {
    // Already-ended sessions and stopped coordinators are both fine here.
    let _ = coordinator.logout().await;
    coordinator.shutdown().await;
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::validation("interactive", format!("prompt failed: {e}"))
}
