// ── Authentication session ──
//
// `Authenticator` performs login and registration against the API;
// a successful login yields an `AuthSession`, which is immutable apart
// from `invalidate()`. The coordinator owns the session exclusively and
// lends the token to workers at request-issue time.

use gardenlink_api::GardenClient;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::classify::{Classification, body_message, classify};
use crate::error::CoreError;
use crate::model::{Role, UserId, id_string};

const DEFAULT_USERNAME: &str = "User";
const LOGIN_REQUIRED_KEYS: &[&str] = &["token", "user"];

// ── AuthSession ──────────────────────────────────────────────────

/// The signed-in identity plus its bearer token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    token: SecretString,
    identity: Identity,
    valid: bool,
}

/// The non-secret half of a session, safe to hand to a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: Option<UserId>,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
}

impl AuthSession {
    pub fn new(token: SecretString, identity: Identity) -> Self {
        Self {
            token,
            identity,
            valid: true,
        }
    }

    /// Build a session from a successful login body.
    ///
    /// The identity lives under `user`; older servers put it at the top
    /// level, so that is the fallback.
    pub fn from_login_body(body: &Value, email: &str) -> Result<Self, CoreError> {
        let token = body
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CoreError::MalformedResponse {
                message: "login response has no token".into(),
            })?;

        let user = body.get("user").filter(|u| u.is_object()).unwrap_or(body);
        let identity = Identity {
            user_id: user.get("id").and_then(id_string).map(UserId::new),
            username: user
                .get("username")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_USERNAME)
                .to_owned(),
            email: Some(
                user.get("email")
                    .and_then(Value::as_str)
                    .map_or_else(|| email.to_owned(), str::to_owned),
            ),
            role: Role::parse(user.get("role").and_then(Value::as_str)),
        };

        Ok(Self::new(SecretString::from(token.to_owned()), identity))
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Mark the session dead. Returns `true` only for the call that
    /// actually ended it, so callers can emit a single session-ended signal.
    pub fn invalidate(&mut self) -> bool {
        std::mem::replace(&mut self.valid, false)
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn role(&self) -> Role {
        self.identity.role
    }

    pub fn is_admin(&self) -> bool {
        self.identity.role == Role::Admin
    }

    pub fn username(&self) -> &str {
        &self.identity.username
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.identity.user_id.as_ref()
    }
}

// ── Registration form ────────────────────────────────────────────

/// Account registration input, validated locally before any request.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: SecretString,
    pub confirm: SecretString,
}

impl Registration {
    pub fn validate(&self) -> Result<(), CoreError> {
        let password = self.password.expose_secret().trim();
        if self.username.trim().is_empty() || self.email.trim().is_empty() || password.is_empty() {
            return Err(CoreError::validation("all fields are required"));
        }
        if password != self.confirm.expose_secret().trim() {
            return Err(CoreError::validation("passwords do not match"));
        }
        Ok(())
    }
}

// ── Authenticator ────────────────────────────────────────────────

/// Login and registration against the auth endpoints.
#[derive(Debug, Clone)]
pub struct Authenticator {
    client: GardenClient,
}

impl Authenticator {
    pub fn new(client: GardenClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GardenClient {
        &self.client
    }

    /// Sign in and return a fresh session.
    ///
    /// Any 4xx (401 included) is a credential failure; the server's
    /// message is kept when it sends one.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<AuthSession, CoreError> {
        let email = email.trim();
        if email.is_empty() || password.expose_secret().trim().is_empty() {
            return Err(CoreError::validation("email and password are required"));
        }

        debug!(email, "logging in");
        let outcome = self.client.login(email, password).await;
        let hint = outcome
            .as_ref()
            .ok()
            .and_then(body_message)
            .map(str::to_owned);

        match classify(outcome, LOGIN_REQUIRED_KEYS) {
            Classification::Success(body) => {
                let session = AuthSession::from_login_body(&body, email)?;
                info!(
                    username = session.username(),
                    role = %session.role(),
                    "login succeeded"
                );
                Ok(session)
            }
            Classification::AuthExpired | Classification::Validation(_) => {
                warn!("login rejected");
                Err(CoreError::InvalidCredentials {
                    message: hint.unwrap_or_else(|| "check your credentials".into()),
                })
            }
            Classification::Server { status, message } => Err(CoreError::Server { status, message }),
            Classification::Network(message) => Err(CoreError::Network { message }),
            Classification::Malformed(message) => Err(CoreError::MalformedResponse { message }),
        }
    }

    /// Create an account. Does not sign in.
    pub async fn register(&self, form: &Registration) -> Result<(), CoreError> {
        form.validate()?;

        let username = form.username.trim();
        let email = form.email.trim();
        let password = SecretString::from(form.password.expose_secret().trim().to_owned());

        debug!(username, email, "registering account");
        let outcome = self.client.register(username, email, &password).await;
        let hint = outcome
            .as_ref()
            .ok()
            .and_then(body_message)
            .map(str::to_owned);

        match classify(outcome, &[]) {
            Classification::Success(_) => {
                info!(username, "account created");
                Ok(())
            }
            Classification::Network(message) => Err(CoreError::Network { message }),
            Classification::Malformed(message) => Err(CoreError::MalformedResponse { message }),
            Classification::AuthExpired
            | Classification::Validation(_)
            | Classification::Server { .. } => Err(CoreError::ServerRejected {
                message: hint.unwrap_or_else(|| "server error".into()),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registration(password: &str, confirm: &str) -> Registration {
        Registration {
            username: "ana".into(),
            email: "ana@example.com".into(),
            password: SecretString::from(password.to_owned()),
            confirm: SecretString::from(confirm.to_owned()),
        }
    }

    #[test]
    fn identity_from_nested_user() {
        let s = AuthSession::from_login_body(
            &json!({"token": "t", "user": {"id": 1, "username": "ana", "role": "admin"}}),
            "ana@example.com",
        )
        .unwrap();
        assert!(s.is_admin());
        assert_eq!(s.user_id().unwrap().as_str(), "1");
        assert_eq!(s.identity().email.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn identity_falls_back_to_top_level() {
        let s = AuthSession::from_login_body(&json!({"token": "t", "id": "9"}), "x@y.z").unwrap();
        assert_eq!(s.username(), "User");
        assert_eq!(s.role(), Role::User);
        assert_eq!(s.user_id().unwrap().as_str(), "9");
    }

    #[test]
    fn empty_token_is_malformed() {
        let err = AuthSession::from_login_body(&json!({"token": "", "user": {}}), "a").unwrap_err();
        assert!(matches!(err, CoreError::MalformedResponse { .. }));
    }

    #[test]
    fn invalidate_reports_first_call_only() {
        let mut s = AuthSession::from_login_body(&json!({"token": "t", "user": {}}), "a").unwrap();
        assert!(s.is_valid());
        assert!(s.invalidate());
        assert!(!s.invalidate());
        assert!(!s.is_valid());
    }

    #[test]
    fn registration_validation() {
        assert!(registration("pw", "pw").validate().is_ok());
        assert!(registration("pw", "other").validate().is_err());
        assert!(registration("  ", "  ").validate().is_err());
    }
}
