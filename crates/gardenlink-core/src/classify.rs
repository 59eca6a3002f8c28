// ── Outcome classification ──
//
// A pure mapping from "what the transport brought back" to the small
// taxonomy every component acts on. Auth expiry is detected here and
// nowhere else, so login, polling, commands, and admin calls all agree
// on what a 401 means.

use gardenlink_api::{ApiResponse, StatusCode};
use serde_json::Value;

use crate::error::CoreError;

/// The classified result of one network call.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// 2xx with the expected payload (`Value::Null` when there was no body).
    Success(Value),
    /// HTTP 401.
    AuthExpired,
    /// Any other 4xx, with the server-supplied message.
    Validation(String),
    /// HTTP 5xx (or any other non-2xx that isn't a client error).
    Server { status: u16, message: String },
    /// Timeout, connection refused, DNS failure, TLS failure.
    Network(String),
    /// 2xx but the payload lacks keys the caller needs.
    Malformed(String),
}

impl Classification {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Collapse into the crate-wide error type.
    pub fn into_result(self) -> Result<Value, CoreError> {
        match self {
            Self::Success(v) => Ok(v),
            Self::AuthExpired => Err(CoreError::AuthExpired),
            Self::Validation(message) => Err(CoreError::Validation { message }),
            Self::Server { status, message } => Err(CoreError::Server { status, message }),
            Self::Network(message) => Err(CoreError::Network { message }),
            Self::Malformed(message) => Err(CoreError::MalformedResponse { message }),
        }
    }
}

/// Classify a transport outcome.
///
/// `required_keys` lists top-level keys a successful body must carry;
/// pass `&[]` for endpoints whose success body is irrelevant (commands,
/// edits, deletes).
pub fn classify(
    outcome: Result<ApiResponse, gardenlink_api::Error>,
    required_keys: &[&str],
) -> Classification {
    let resp = match outcome {
        Ok(resp) => resp,
        Err(e) => {
            let message = match CoreError::from(e) {
                CoreError::Network { message } | CoreError::Config { message } => message,
                other => other.to_string(),
            };
            return Classification::Network(message);
        }
    };

    let status = resp.status;
    if status == StatusCode::UNAUTHORIZED {
        return Classification::AuthExpired;
    }

    if status.is_success() {
        return check_payload(resp.body, required_keys);
    }

    let message = server_message(&resp);
    if status.is_client_error() {
        Classification::Validation(message)
    } else {
        Classification::Server {
            status: status.as_u16(),
            message,
        }
    }
}

fn check_payload(body: Option<Value>, required_keys: &[&str]) -> Classification {
    if required_keys.is_empty() {
        return Classification::Success(body.unwrap_or(Value::Null));
    }

    let Some(Value::Object(map)) = body else {
        return Classification::Malformed("expected a JSON object".into());
    };

    let missing: Vec<&str> = required_keys
        .iter()
        .copied()
        .filter(|k| !map.contains_key(*k))
        .collect();

    if missing.is_empty() {
        Classification::Success(Value::Object(map))
    } else {
        Classification::Malformed(format!("missing {}", missing.join(", ")))
    }
}

/// The server-supplied message, if the body carries one.
///
/// Servers in the wild use `message`, `error`, or `detail`.
pub fn body_message(resp: &ApiResponse) -> Option<&str> {
    ["message", "error", "detail"]
        .iter()
        .find_map(|k| resp.str_field(k))
}

/// Pull a human-readable message out of an error body, falling back to
/// the status' reason phrase.
pub fn server_message(resp: &ApiResponse) -> String {
    body_message(resp)
        .map(str::to_owned)
        .unwrap_or_else(|| {
            resp.status
                .canonical_reason()
                .map_or_else(|| format!("HTTP {}", resp.status.as_u16()), str::to_owned)
        })
}

// ── Payload unwrapping ───────────────────────────────────────────────

/// Telemetry arrives as `{"data": {...}}` or as the bare mapping.
pub fn unwrap_telemetry(body: Value) -> Value {
    unwrap_key(body, "data")
}

/// Device info arrives as `{"device": {...}}` or as the bare object.
pub fn unwrap_device(body: Value) -> Value {
    unwrap_key(body, "device")
}

/// User lists arrive as `{"users": [...]}`, `{"data": [...]}`, or a bare array.
pub fn unwrap_users(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("users").or_else(|| map.remove("data")) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn unwrap_key(body: Value, key: &str) -> Value {
    match body {
        Value::Object(mut map) if map.get(key).is_some_and(Value::is_object) => {
            map.remove(key).unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resp(status: u16, body: Option<Value>) -> Result<ApiResponse, gardenlink_api::Error> {
        Ok(ApiResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body,
        })
    }

    #[test]
    fn unauthorized_is_auth_expired() {
        let c = classify(resp(401, Some(json!({"message": "jwt expired"}))), &[]);
        assert_eq!(c, Classification::AuthExpired);
    }

    #[test]
    fn client_errors_carry_server_message() {
        let c = classify(resp(422, Some(json!({"error": "bad command"}))), &[]);
        assert_eq!(c, Classification::Validation("bad command".into()));

        let c = classify(resp(403, None), &[]);
        assert_eq!(c, Classification::Validation("Forbidden".into()));
    }

    #[test]
    fn server_errors_keep_status() {
        let c = classify(resp(503, None), &[]);
        assert_eq!(
            c,
            Classification::Server {
                status: 503,
                message: "Service Unavailable".into()
            }
        );
    }

    #[test]
    fn success_without_body_is_null() {
        assert_eq!(classify(resp(204, None), &[]), Classification::Success(Value::Null));
    }

    #[test]
    fn missing_required_keys_is_malformed() {
        let c = classify(resp(200, Some(json!({"token": "t"}))), &["token", "user"]);
        assert_eq!(c, Classification::Malformed("missing user".into()));

        let c = classify(resp(200, Some(json!([1, 2]))), &["token"]);
        assert!(matches!(c, Classification::Malformed(_)));
    }

    #[test]
    fn into_result_maps_variants() {
        assert_eq!(
            Classification::AuthExpired.into_result(),
            Err(CoreError::AuthExpired)
        );
        assert_eq!(
            Classification::Network("refused".into()).into_result(),
            Err(CoreError::Network {
                message: "refused".into()
            })
        );
    }

    #[test]
    fn telemetry_unwraps_data_or_passes_through() {
        let wrapped = json!({"data": {"humidity": 60}});
        assert_eq!(unwrap_telemetry(wrapped), json!({"humidity": 60}));

        let bare = json!({"humidity": 60});
        assert_eq!(unwrap_telemetry(bare.clone()), bare);
    }

    #[test]
    fn users_accept_every_known_shape() {
        assert_eq!(unwrap_users(json!({"users": [{"id": 1}]})).len(), 1);
        assert_eq!(unwrap_users(json!({"data": [{"id": 1}, {"id": 2}]})).len(), 2);
        assert_eq!(unwrap_users(json!([{"id": 3}])).len(), 1);
        assert!(unwrap_users(json!({"count": 0})).is_empty());
    }
}
