// Request bodies sent to the API.
//
// Responses are kept as `serde_json::Value` at this layer: the payload
// shapes vary between server versions (wrapped in `data` / `device` /
// `users` or bare), and unwrapping belongs to the classifier in core.

use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};

#[allow(clippy::trivially_copy_pass_by_ref)]
fn expose<S: Serializer>(secret: &&SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// `POST /auth/login`
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    #[serde(serialize_with = "expose")]
    pub password: &'a SecretString,
}

/// `POST /auth/register`
#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    #[serde(serialize_with = "expose")]
    pub password: &'a SecretString,
}

/// `PUT /devices/{id}/command`
#[derive(Debug, Serialize)]
pub struct DeviceCommandRequest<'a> {
    pub command: &'a str,
}
