#![allow(clippy::unwrap_used, clippy::float_cmp)]
// Integration tests for the coordinator's owner task, against wiremock.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use tokio::sync::broadcast;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gardenlink_api::{GardenClient, TransportConfig};
use gardenlink_core::{
    AuthSession, CommandName, Coordinator, CoordinatorConfig, CoordinatorEvent, CoreError,
    DeviceEdit, Identity, Role, SchedulerState, SessionEndReason, UserId,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn session(role: Role) -> AuthSession {
    AuthSession::new(
        SecretString::from("tok-123".to_string()),
        Identity {
            user_id: Some(UserId::new("1")),
            username: "ana".into(),
            email: Some("ana@example.com".into()),
            role,
        },
    )
}

fn client_for(server: &MockServer) -> GardenClient {
    let api_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    GardenClient::new(api_url, &TransportConfig::default()).unwrap()
}

fn spawn(server: &MockServer, role: Role) -> Coordinator {
    spawn_with(client_for(server), role, CoordinatorConfig::new("4"))
}

fn spawn_with(client: GardenClient, role: Role, config: CoordinatorConfig) -> Coordinator {
    Coordinator::spawn(client, session(role), config)
}

async fn mount_device(server: &MockServer, name: &str) {
    Mock::given(method("GET"))
        .and(path("/api/devices/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device": {"device_id": 4, "device_name": name, "auto_mode": false}
        })))
        .mount(server)
        .await;
}

async fn mount_telemetry(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/sensor-readings/device/4/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"temperature": 24.5, "soil_moisture": 42}
        })))
        .mount(server)
        .await;
}

/// Collect events until `stop` matches or the deadline passes.
async fn wait_for(
    rx: &mut broadcast::Receiver<CoordinatorEvent>,
    stop: impl Fn(&CoordinatorEvent) -> bool,
) -> Vec<CoordinatorEvent> {
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(3), async {
        while let Ok(event) = rx.recv().await {
            let done = stop(&event);
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    seen
}

fn drain(rx: &mut broadcast::Receiver<CoordinatorEvent>) -> Vec<CoordinatorEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    seen
}

// ── Refresh tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_manual_refresh_populates_store() {
    let server = MockServer::start().await;
    mount_device(&server, "Greenhouse").await;
    mount_telemetry(&server).await;

    let c = spawn(&server, Role::User);
    c.manual_refresh().await.unwrap();

    assert_eq!(c.current_device().device_name.as_deref(), Some("Greenhouse"));
    assert_eq!(
        c.current_sensors()
            .numeric(gardenlink_core::Sensor::SoilMoisture),
        Some(42.0)
    );
    assert_eq!(c.scheduler_state(), SchedulerState::Stopped);
    c.shutdown().await;
}

#[tokio::test]
async fn test_out_of_order_device_responses_keep_newest() {
    let server = MockServer::start().await;
    mount_telemetry(&server).await;

    // First device fetch is slow and returns stale data.
    Mock::given(method("GET"))
        .and(path("/api/devices/4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"device": {"device_name": "Old"}}))
                .set_delay(Duration::from_millis(400)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_device(&server, "New").await;

    let c = spawn(&server, Role::User);
    let slow = c.clone();
    let (first, second) = tokio::join!(slow.manual_refresh(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        c.manual_refresh().await
    });
    first.unwrap();
    second.unwrap();

    assert_eq!(c.current_device().device_name.as_deref(), Some("New"));
    c.shutdown().await;
}

#[tokio::test]
async fn test_polling_start_stop_toggle() {
    let server = MockServer::start().await;
    mount_device(&server, "Greenhouse").await;
    mount_telemetry(&server).await;

    let mut config = CoordinatorConfig::new("4");
    config.refresh_interval = Duration::from_millis(50);
    let c = spawn_with(client_for(&server), Role::User, config);
    let mut events = c.events();

    assert_eq!(c.start_polling().await.unwrap(), SchedulerState::Running);
    wait_for(&mut events, |e| matches!(e, CoordinatorEvent::DeviceUpdated(_))).await;
    assert_eq!(c.current_device().device_name.as_deref(), Some("Greenhouse"));

    assert_eq!(c.toggle_auto().await.unwrap(), SchedulerState::Stopped);
    assert_eq!(c.toggle_auto().await.unwrap(), SchedulerState::Running);
    assert_eq!(c.stop_polling().await.unwrap(), SchedulerState::Stopped);
    assert_eq!(c.scheduler_state(), SchedulerState::Stopped);
    c.shutdown().await;
}

// ── Session tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_device_401_ends_session_once() {
    let server = MockServer::start().await;
    mount_telemetry(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/devices/4"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "jwt expired"})))
        .mount(&server)
        .await;

    let mut config = CoordinatorConfig::new("4");
    config.refresh_interval = Duration::from_millis(50);
    let c = spawn_with(client_for(&server), Role::User, config);
    let mut events = c.events();

    c.start_polling().await.unwrap();
    let seen = wait_for(&mut events, |e| matches!(e, CoordinatorEvent::SessionEnded { .. })).await;
    assert!(matches!(
        seen.last(),
        Some(CoordinatorEvent::SessionEnded {
            reason: SessionEndReason::Expired
        })
    ));

    // Let any in-flight fetches land, then make sure nothing ended twice.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let extra = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, CoordinatorEvent::SessionEnded { .. }))
        .count();
    assert_eq!(extra, 0);

    assert!(!c.session_valid());
    assert!(!c.controls_enabled());
    assert_eq!(c.scheduler_state(), SchedulerState::Stopped);

    assert_eq!(c.manual_refresh().await, Err(CoreError::NotAuthenticated));
    assert_eq!(
        c.send_command(CommandName::PumpOn).await,
        Err(CoreError::NotAuthenticated)
    );
    c.shutdown().await;
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let server = MockServer::start().await;
    let c = spawn(&server, Role::User);
    let mut events = c.events();

    c.logout().await.unwrap();
    c.logout().await.unwrap();

    let ended = drain(&mut events)
        .into_iter()
        .filter(|e| {
            matches!(
                e,
                CoordinatorEvent::SessionEnded {
                    reason: SessionEndReason::LoggedOut
                }
            )
        })
        .count();
    assert_eq!(ended, 1);
    assert!(!c.session_valid());
    c.shutdown().await;
}

// ── Command tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_second_command_while_outstanding_is_busy() {
    let server = MockServer::start().await;
    mount_device(&server, "Greenhouse").await;
    Mock::given(method("PUT"))
        .and(path("/api/devices/4/command"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(400)))
        .expect(1)
        .mount(&server)
        .await;

    let c = spawn(&server, Role::User);
    let first = c.clone();
    let (a, b) = tokio::join!(first.send_command(CommandName::PumpOn), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let controls = c.controls_enabled();
        (c.send_command(CommandName::PumpOff).await, controls)
    });

    assert_eq!(a, Ok(()));
    assert_eq!(b.0, Err(CoreError::Busy));
    assert!(!b.1, "controls should be disabled while a command is outstanding");
    assert!(c.controls_enabled());
    c.shutdown().await;
}

#[tokio::test]
async fn test_command_body_and_refetch_after_success() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/devices/4/command"))
        .and(body_json(json!({"command": "AUTO_ON"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device": {"device_name": "Greenhouse", "auto_mode": true}
        })))
        .expect(1..)
        .mount(&server)
        .await;

    let c = spawn(&server, Role::User);
    let mut device = c.watch_device();
    c.send_command(CommandName::AutoOn).await.unwrap();

    tokio::time::timeout(Duration::from_secs(3), device.changed())
        .await
        .unwrap()
        .unwrap();
    assert!(c.current_device().auto_mode);
    c.shutdown().await;
}

#[tokio::test]
async fn test_guard_released_after_server_error() {
    let server = MockServer::start().await;
    mount_device(&server, "Greenhouse").await;
    Mock::given(method("PUT"))
        .and(path("/api/devices/4/command"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "pump jammed"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/devices/4/command"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let c = spawn(&server, Role::User);
    let err = c.send_command(CommandName::PumpOn).await.unwrap_err();
    assert_eq!(
        err,
        CoreError::Server {
            status: 500,
            message: "pump jammed".into()
        }
    );
    assert!(c.controls_enabled());
    assert_eq!(c.send_command(CommandName::PumpOn).await, Ok(()));
    c.shutdown().await;
}

#[tokio::test]
async fn test_guard_released_after_network_error() {
    let api_url = Url::parse("http://127.0.0.1:9/api").unwrap();
    let client = GardenClient::new(api_url, &TransportConfig::default()).unwrap();
    let c = spawn_with(client, Role::User, CoordinatorConfig::new("4"));

    for _ in 0..2 {
        let err = c.send_command(CommandName::PumpOff).await.unwrap_err();
        assert!(matches!(err, CoreError::Network { .. }), "got {err:?}");
    }
    assert!(c.controls_enabled());
    c.shutdown().await;
}

#[tokio::test]
async fn test_watchdog_releases_stuck_command() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/devices/4/command"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1500)))
        .mount(&server)
        .await;

    let mut config = CoordinatorConfig::new("4");
    config.command_watchdog = Some(Duration::from_millis(100));
    let c = spawn_with(client_for(&server), Role::User, config);

    let err = c.send_command(CommandName::PumpOn).await.unwrap_err();
    assert_eq!(
        err,
        CoreError::Network {
            message: "command timed out".into()
        }
    );
    assert!(c.controls_enabled());
    c.shutdown().await;
}

// ── Admin tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_non_admin_writes_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/devices/4/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let c = spawn(&server, Role::User);
    let edit = DeviceEdit::new(Some("Shed"), Some("esp32"), Some("Yard")).unwrap();

    assert!(matches!(
        c.save_device_info(edit).await,
        Err(CoreError::PermissionDenied { .. })
    ));
    assert!(matches!(
        c.delete_user(UserId::new("7")).await,
        Err(CoreError::PermissionDenied { .. })
    ));
    c.shutdown().await;
}

#[tokio::test]
async fn test_admin_location_edit_sends_and_merges_only_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device": {
                "device_id": 4,
                "device_name": "Greenhouse",
                "device_type": "esp32",
                "auto_mode": true
            }
        })))
        .mount(&server)
        .await;
    mount_telemetry(&server).await;
    Mock::given(method("PUT"))
        .and(path("/api/devices/4/"))
        .and(body_json(json!({"location": "Yard"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let c = spawn(&server, Role::Admin);
    c.manual_refresh().await.unwrap();

    let edit = DeviceEdit::new(None, None, Some("Yard")).unwrap();
    let updated = c.save_device_info(edit).await.unwrap();

    assert_eq!(updated.device_name.as_deref(), Some("Greenhouse"));
    assert_eq!(updated.device_type.as_deref(), Some("esp32"));
    assert_eq!(updated.location.as_deref(), Some("Yard"));
    assert!(updated.auto_mode);
    assert_eq!(c.current_device().location.as_deref(), Some("Yard"));
    c.shutdown().await;
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let c = spawn(&server, Role::Admin);
    assert!(matches!(
        c.delete_user(UserId::new("1")).await,
        Err(CoreError::Validation { .. })
    ));
    c.shutdown().await;
}

#[tokio::test]
async fn test_admin_lists_and_deletes_users() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": 1, "username": "ana", "email": "ana@example.com", "role": "admin"},
                {"id": 7, "username": "budi", "email": "budi@example.com", "role": "user"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/users/7/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let c = spawn(&server, Role::Admin);
    let users = c.list_users().await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[1].role, Role::User);

    c.delete_user(UserId::new("7")).await.unwrap();
    c.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_intents() {
    let server = MockServer::start().await;
    let c = spawn(&server, Role::User);
    c.shutdown().await;
    assert_eq!(c.manual_refresh().await, Err(CoreError::CoordinatorStopped));
}
