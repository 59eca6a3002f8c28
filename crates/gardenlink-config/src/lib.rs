//! Shared configuration for the gardenlink binary.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation to `gardenlink_core::{ConnectionConfig, CoordinatorConfig}`.
//! The CLI layers its `GlobalOpts` overrides on top of this.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use gardenlink_core::{ConnectionConfig, CoordinatorConfig, TlsVerification};

/// Keyring service name.
pub const KEYRING_SERVICE: &str = "gardenlink";

/// Environment variable consulted for the password after a profile's own
/// `password_env`.
pub const PASSWORD_ENV: &str = "GARDENLINK_PASSWORD";

/// Environment variable consulted for the login email when a profile
/// doesn't name one.
pub const EMAIL_ENV: &str = "GARDENLINK_EMAIL";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named gateway profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// The profile to use: an explicit name, else `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, p)| (k.as_str(), p))
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Polling period in seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    #[serde(default)]
    pub insecure: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            refresh_interval: default_refresh_interval(),
            insecure: false,
        }
    }
}

fn default_timeout() -> u64 {
    2
}
fn default_refresh_interval() -> u64 {
    1
}

/// A named gateway profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// API root (e.g., "http://192.168.39.89:8080/api").
    pub server: String,

    /// The device this profile watches.
    pub device_id: String,

    /// Telemetry path template; `{device_id}` is substituted.
    pub telemetry_path: Option<String>,

    /// Login email.
    pub email: Option<String>,

    /// Password (plaintext: prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override request timeout (seconds).
    pub timeout: Option<u64>,

    /// Override polling period (seconds).
    pub refresh_interval: Option<u64>,

    /// Force-release a stuck command after this many seconds.
    pub command_watchdog: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "gardenlink", "gardenlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("gardenlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit path. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("GARDENLINK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it can't be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn keyring_lookup(profile_name: &str) -> Option<String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name)).ok()?;
    entry.get_password().ok()
}

/// Resolve the login password: `password_env` → `GARDENLINK_PASSWORD` →
/// keyring → plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_password_with(profile, profile_name, env_lookup, keyring_lookup)
}

fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Some(val) = env(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Global env var
    if let Some(val) = env(PASSWORD_ENV) {
        return Ok(SecretString::from(val));
    }

    // 3. System keyring
    if let Some(secret) = keyring(profile_name) {
        return Ok(SecretString::from(secret));
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve the login email: profile, then `GARDENLINK_EMAIL`.
pub fn resolve_email(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .email
        .clone()
        .or_else(|| env_lookup(EMAIL_ENV))
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Save a password to the OS keyring for `profile_name`.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))
        .map_err(|e| ConfigError::Keyring(e.to_string()))?;
    entry
        .set_password(password)
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

// ── Translation to core config ──────────────────────────────────────

/// Everything core needs to connect and coordinate, minus credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub connection: ConnectionConfig,
    pub coordinator: CoordinatorConfig,
}

/// Build core settings from a profile, falling back to `defaults`.
pub fn profile_to_settings(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ConnectionSettings, ConfigError> {
    let connection = profile_to_connection(profile, defaults)?;

    if profile.device_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "device_id".into(),
            reason: "must not be empty".into(),
        });
    }

    let refresh_secs = profile
        .refresh_interval
        .unwrap_or(defaults.refresh_interval)
        .max(1);

    let mut coordinator = CoordinatorConfig::new(profile.device_id.trim());
    if let Some(ref path) = profile.telemetry_path {
        coordinator.telemetry_path.clone_from(path);
    }
    coordinator.refresh_interval = Duration::from_secs(refresh_secs);
    coordinator.command_watchdog = profile.command_watchdog.map(Duration::from_secs);

    Ok(ConnectionSettings {
        connection,
        coordinator,
    })
}

/// Just the transport half: enough for the auth endpoints, which don't
/// need a device.
pub fn profile_to_connection(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ConnectionConfig, ConfigError> {
    let api_url = parse_server(&profile.server)?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout).max(1));

    Ok(ConnectionConfig {
        api_url,
        tls,
        timeout,
    })
}

/// Parse and sanity-check a server URL.
pub fn parse_server(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.trim().parse().map_err(|_| ConfigError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "server".into(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn profile() -> Profile {
        Profile {
            server: "http://192.168.39.89:8080/api".into(),
            device_id: "4".into(),
            ..Profile::default()
        }
    }

    #[test]
    fn loads_profiles_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "home"

[defaults]
timeout = 5

[profiles.home]
server = "http://10.0.0.2:8080/api"
device_id = "4"
email = "ana@example.com"
refresh_interval = 3
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        let (name, home) = cfg.profile(None).unwrap();
        assert_eq!(name, "home");
        assert_eq!(home.email.as_deref(), Some("ana@example.com"));
        assert_eq!(cfg.defaults.timeout, 5);
        assert_eq!(cfg.defaults.refresh_interval, 1);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert("default".into(), profile());

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles["default"], profile());
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let cfg = Config::default();
        assert!(matches!(
            cfg.profile(Some("garage")),
            Err(ConfigError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn password_chain_order() {
        let mut p = profile();
        p.password = Some("plain".into());
        p.password_env = Some("MY_PW".into());

        let env = |name: &str| (name == "MY_PW").then(|| "from-env".to_owned());
        let pw = resolve_password_with(&p, "default", env, |_| None).unwrap();
        assert_eq!(pw.expose_secret(), "from-env");

        let global = |name: &str| (name == PASSWORD_ENV).then(|| "global".to_owned());
        let pw = resolve_password_with(&p, "default", global, |_| Some("ring".into())).unwrap();
        assert_eq!(pw.expose_secret(), "global");

        let pw = resolve_password_with(&p, "default", |_| None, |_| Some("ring".into())).unwrap();
        assert_eq!(pw.expose_secret(), "ring");

        let pw = resolve_password_with(&p, "default", |_| None, |_| None).unwrap();
        assert_eq!(pw.expose_secret(), "plain");

        p.password = None;
        assert!(matches!(
            resolve_password_with(&p, "default", |_| None, |_| None),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn settings_from_profile() {
        let mut p = profile();
        p.refresh_interval = Some(5);
        p.command_watchdog = Some(10);
        let s = profile_to_settings(&p, &Defaults::default()).unwrap();

        assert_eq!(s.connection.timeout, Duration::from_secs(2));
        assert_eq!(s.connection.tls, TlsVerification::SystemDefaults);
        assert_eq!(s.coordinator.device_id, "4");
        assert_eq!(s.coordinator.refresh_interval, Duration::from_secs(5));
        assert_eq!(s.coordinator.command_watchdog, Some(Duration::from_secs(10)));
        assert_eq!(
            s.coordinator.telemetry_path,
            "sensor-readings/device/{device_id}/latest"
        );
    }

    #[test]
    fn insecure_and_ca_cert() {
        let mut p = profile();
        p.ca_cert = Some("/etc/gardenlink/ca.pem".into());
        let s = profile_to_settings(&p, &Defaults::default()).unwrap();
        assert_eq!(
            s.connection.tls,
            TlsVerification::CustomCa("/etc/gardenlink/ca.pem".into())
        );

        p.insecure = Some(true);
        let s = profile_to_settings(&p, &Defaults::default()).unwrap();
        assert_eq!(s.connection.tls, TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn connection_without_device() {
        let mut p = profile();
        p.device_id = String::new();
        assert!(profile_to_settings(&p, &Defaults::default()).is_err());
        let conn = profile_to_connection(&p, &Defaults::default()).unwrap();
        assert_eq!(conn.api_url.as_str(), "http://192.168.39.89:8080/api");
    }

    #[test]
    fn bad_server_rejected() {
        let mut p = profile();
        p.server = "ftp://gateway/api".into();
        assert!(matches!(
            profile_to_settings(&p, &Defaults::default()),
            Err(ConfigError::Validation { .. })
        ));

        p.server = "not a url".into();
        assert!(profile_to_settings(&p, &Defaults::default()).is_err());
    }
}
