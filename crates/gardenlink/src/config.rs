//! Binary-side profile resolution: layers `GlobalOpts` overrides on top of
//! the stored profile, then hands the result to `gardenlink_config` for
//! translation into core types.

use std::io::IsTerminal;

use secrecy::SecretString;

use gardenlink_config::{Config, ConnectionSettings, Profile};
use gardenlink_core::ConnectionConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use gardenlink_config::{config_path, load_config_or_default, save_config};

/// Everything needed to sign in and start a coordinator.
pub struct Resolved {
    pub profile_name: String,
    pub settings: ConnectionSettings,
    pub email: String,
    pub password: SecretString,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// The stored profile with every CLI override applied.
///
/// Without a stored profile, `--server` and `--device` must both be given.
pub fn effective_profile(global: &GlobalOpts, cfg: &Config) -> Result<(String, Profile), CliError> {
    let (profile_name, mut profile) = base_profile(global, cfg)?;
    if let Some(ref device) = global.device {
        profile.device_id.clone_from(device);
    }
    if let Some(ref email) = global.email {
        profile.email = Some(email.clone());
    }

    if profile.device_id.trim().is_empty() {
        return Err(CliError::validation(
            "device",
            "no device id configured (use --device or `gardenlink config init`)",
        ));
    }

    Ok((profile_name, profile))
}

/// Stored profile (or a blank one when `--server` is given) with the
/// transport overrides applied.
fn base_profile(global: &GlobalOpts, cfg: &Config) -> Result<(String, Profile), CliError> {
    let profile_name = active_profile_name(global, cfg);
    let stored = cfg.profiles.get(&profile_name).cloned();

    if stored.is_none() && global.server.is_none() {
        // An explicit --profile that doesn't exist is a different mistake
        // from having no config at all.
        if global.profile.is_some() {
            let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
            available.sort();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    }

    let mut profile = stored.unwrap_or_default();
    if let Some(ref server) = global.server {
        profile.server.clone_from(server);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    Ok((profile_name, profile))
}

/// Resolve connection settings and credentials for a gateway-bound command.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config_or_default();
    let (profile_name, profile) = effective_profile(global, &cfg)?;
    let settings = gardenlink_config::profile_to_settings(&profile, &cfg.defaults)?;

    let email = match gardenlink_config::resolve_email(&profile, &profile_name) {
        Ok(email) => email,
        Err(err) => prompt_text("Email").ok_or(err)?,
    };
    let password = match gardenlink_config::resolve_password(&profile, &profile_name) {
        Ok(pw) => pw,
        Err(err) => prompt_secret("Password: ").ok_or(err)?,
    };

    Ok(Resolved {
        profile_name,
        settings,
        email,
        password,
    })
}

/// Connection settings only, for commands that don't sign in (register).
pub fn resolve_connection(global: &GlobalOpts) -> Result<ConnectionConfig, CliError> {
    let cfg = load_config_or_default();
    let (_, profile) = base_profile(global, &cfg)?;
    Ok(gardenlink_config::profile_to_connection(&profile, &cfg.defaults)?)
}

// ── Interactive fallbacks ────────────────────────────────────────────

fn prompt_text(label: &str) -> Option<String> {
    if !std::io::stdin().is_terminal() {
        return None;
    }
    dialoguer::Input::<String>::new()
        .with_prompt(label)
        .interact_text()
        .ok()
        .filter(|s| !s.trim().is_empty())
}

fn prompt_secret(label: &str) -> Option<SecretString> {
    if !std::io::stdin().is_terminal() {
        return None;
    }
    rpassword::prompt_password(label)
        .ok()
        .filter(|s| !s.is_empty())
        .map(SecretString::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["gardenlink"];
        argv.extend_from_slice(args);
        argv.push("status");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config_with_home() -> Config {
        let mut cfg = Config::default();
        cfg.default_profile = Some("home".into());
        cfg.profiles.insert(
            "home".into(),
            Profile {
                server: "http://10.0.0.2:8080/api".into(),
                device_id: "4".into(),
                email: Some("ana@example.com".into()),
                ..Profile::default()
            },
        );
        cfg
    }

    #[test]
    fn flags_override_stored_profile() {
        let cfg = config_with_home();
        let g = global(&["--device", "9", "--timeout", "7", "-k"]);
        let (name, profile) = effective_profile(&g, &cfg).unwrap();
        assert_eq!(name, "home");
        assert_eq!(profile.device_id, "9");
        assert_eq!(profile.timeout, Some(7));
        assert_eq!(profile.insecure, Some(true));
        assert_eq!(profile.server, "http://10.0.0.2:8080/api");
    }

    #[test]
    fn flags_alone_are_enough() {
        let cfg = Config::default();
        let g = global(&["--server", "http://127.0.0.1:8080/api", "--device", "1"]);
        let (name, profile) = effective_profile(&g, &cfg).unwrap();
        assert_eq!(name, "default");
        assert_eq!(profile.device_id, "1");
    }

    #[test]
    fn missing_profile_and_server_is_no_config() {
        let g = global(&[]);
        assert!(matches!(
            effective_profile(&g, &Config::default()),
            Err(CliError::NoConfig { .. })
        ));

        let g = global(&["--profile", "garage"]);
        assert!(matches!(
            effective_profile(&g, &config_with_home()),
            Err(CliError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn device_id_is_required() {
        let g = global(&["--server", "http://127.0.0.1:8080/api"]);
        assert!(matches!(
            effective_profile(&g, &Config::default()),
            Err(CliError::Validation { .. })
        ));
    }
}
