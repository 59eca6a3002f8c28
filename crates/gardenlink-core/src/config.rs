// ── Runtime connection configuration ──
//
// These types describe how to reach the gateway and how the coordinator
// should pace itself. They never touch disk: the binary resolves a
// profile and hands the result in.

use std::path::PathBuf;
use std::time::Duration;

use gardenlink_api::{DEFAULT_TELEMETRY_PATH, DEFAULT_TIMEOUT, GardenClient, TlsMode, TransportConfig};
use url::Url;

use crate::error::CoreError;

/// Default polling period.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed gateways).
    DangerAcceptInvalid,
}

/// Where the API lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// API root, e.g. `http://192.168.39.89:8080/api`.
    pub api_url: Url,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            tls: TlsVerification::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build the HTTP client for this connection.
    pub fn build_client(&self) -> Result<GardenClient, CoreError> {
        let transport = build_transport(self);
        Ok(GardenClient::new(self.api_url.clone(), &transport)?)
    }
}

/// Pacing and targeting for one coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// The single device this session focuses on.
    pub device_id: String,
    /// Telemetry path template relative to the API root; `{device_id}` is
    /// substituted.
    pub telemetry_path: String,
    /// Period between scheduled fetch cycles.
    pub refresh_interval: Duration,
    /// Force-release the command guard after this long. `None` leaves the
    /// transport timeout as the only bound.
    pub command_watchdog: Option<Duration>,
    /// Start polling as soon as the coordinator is spawned.
    pub auto_start: bool,
}

impl CoordinatorConfig {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            telemetry_path: DEFAULT_TELEMETRY_PATH.to_owned(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            command_watchdog: None,
            auto_start: false,
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn build_transport(config: &ConnectionConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_path_substitutes_device() {
        let cfg = CoordinatorConfig::new("4");
        assert_eq!(cfg.telemetry_path, DEFAULT_TELEMETRY_PATH);
        assert_eq!(cfg.refresh_interval, Duration::from_secs(1));
        assert!(cfg.command_watchdog.is_none());
    }

    #[test]
    fn tls_modes_map_through() {
        assert!(matches!(
            tls_to_transport(&TlsVerification::DangerAcceptInvalid),
            TlsMode::DangerAcceptInvalid
        ));
        let conn = ConnectionConfig::new(Url::parse("http://127.0.0.1:8080/api").unwrap());
        assert!(conn.build_client().is_ok());
    }
}
