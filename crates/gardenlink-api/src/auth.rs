// Account endpoints
//
// Login returns a bearer token plus the user record; register just
// creates the account. Neither call carries an Authorization header.

use secrecy::SecretString;
use tracing::debug;

use crate::client::{ApiResponse, GardenClient};
use crate::error::Error;
use crate::models::{LoginRequest, RegisterRequest};

impl GardenClient {
    /// `POST /auth/login` with `{email, password}`.
    ///
    /// A successful body looks like `{"token": "...", "user": {...}}`.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<ApiResponse, Error> {
        debug!(email, "logging in");
        self.post(&["auth", "login"], None, &LoginRequest { email, password })
            .await
    }

    /// `POST /auth/register` with `{username, email, password}`.
    ///
    /// The server answers 200 or 201 on success, otherwise an error body
    /// with a `message` field.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<ApiResponse, Error> {
        debug!(username, email, "registering account");
        self.post(
            &["auth", "register"],
            None,
            &RegisterRequest {
                username,
                email,
                password,
            },
        )
        .await
    }
}
