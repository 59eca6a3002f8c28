#![allow(clippy::unwrap_used)]
// Integration tests for login and registration, against wiremock.

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gardenlink_api::{GardenClient, TransportConfig};
use gardenlink_core::{Authenticator, CoreError, Registration, Role};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Authenticator) {
    let server = MockServer::start().await;
    let api_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let client = GardenClient::new(api_url, &TransportConfig::default()).unwrap();
    (server, Authenticator::new(client))
}

fn secret(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

fn registration(password: &str, confirm: &str) -> Registration {
    Registration {
        username: "budi".into(),
        email: "budi@example.com".into(),
        password: secret(password),
        confirm: secret(confirm),
    }
}

// ── Login tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_success_builds_session() {
    let (server, auth) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "abc",
            "user": {"id": 1, "username": "ana", "role": "admin"}
        })))
        .mount(&server)
        .await;

    let session = auth.login(" ana@example.com ", &secret("pw")).await.unwrap();
    assert!(session.is_valid());
    assert!(session.is_admin());
    assert_eq!(session.username(), "ana");
    assert_eq!(session.role(), Role::Admin);
}

#[tokio::test]
async fn test_login_without_user_is_malformed() {
    let (server, auth) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "abc"})))
        .mount(&server)
        .await;

    let err = auth.login("ana@example.com", &secret("pw")).await.unwrap_err();
    assert!(matches!(err, CoreError::MalformedResponse { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_login_rejected_carries_server_message() {
    let (server, auth) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "wrong password"})),
        )
        .mount(&server)
        .await;

    let err = auth.login("ana@example.com", &secret("nope")).await.unwrap_err();
    assert_eq!(
        err,
        CoreError::InvalidCredentials {
            message: "wrong password".into()
        }
    );
}

#[tokio::test]
async fn test_login_server_error_is_not_a_credential_failure() {
    let (server, auth) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = auth.login("ana@example.com", &secret("pw")).await.unwrap_err();
    assert!(matches!(err, CoreError::Server { status: 503, .. }));
}

#[tokio::test]
async fn test_login_empty_fields_never_hit_network() {
    let (server, auth) = setup().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = auth.login("  ", &secret("pw")).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
}

#[tokio::test]
async fn test_login_connection_error() {
    let api_url = Url::parse("http://127.0.0.1:9/api").unwrap();
    let client = GardenClient::new(api_url, &TransportConfig::default()).unwrap();
    let auth = Authenticator::new(client);

    let err = auth.login("ana@example.com", &secret("pw")).await.unwrap_err();
    assert!(matches!(err, CoreError::Network { .. }), "got {err:?}");
}

// ── Registration tests ──────────────────────────────────────────────

#[tokio::test]
async fn test_register_created() {
    let (server, auth) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 8})))
        .expect(1)
        .mount(&server)
        .await;

    auth.register(&registration("pw", "pw")).await.unwrap();
}

#[tokio::test]
async fn test_register_mismatch_is_local() {
    let (server, auth) = setup().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let err = auth.register(&registration("pw", "other")).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
}

#[tokio::test]
async fn test_register_rejected_by_server() {
    let (server, auth) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"message": "email already used"})),
        )
        .mount(&server)
        .await;

    let err = auth.register(&registration("pw", "pw")).await.unwrap_err();
    assert_eq!(
        err,
        CoreError::ServerRejected {
            message: "email already used".into()
        }
    );
}
