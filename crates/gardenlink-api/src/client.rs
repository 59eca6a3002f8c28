// Device API HTTP client
//
// Wraps `reqwest::Client` with URL construction and bearer authentication.
// Endpoint groups (auth, devices, users) are implemented as inherent
// methods in separate files to keep this module focused on transport
// mechanics. Status codes are passed through untouched; deciding what a
// 401 or a 500 means is the caller's job.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// A completed HTTP exchange: the status plus the decoded JSON body, if any.
///
/// Bodies that are empty or not valid JSON are reported as `None` rather
/// than failing the request, since several endpoints answer writes with an
/// empty 200/204.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Look up a top-level string field in an object body.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.body.as_ref()?.get(key)?.as_str()
    }
}

/// Raw HTTP client for the smart-garden API.
///
/// All paths are relative to the API root (e.g. `http://gateway:8080/api`).
/// Cheap to clone: the inner `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct GardenClient {
    http: reqwest::Client,
    api_url: Url,
    timeout: Duration,
}

impl GardenClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(api_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            api_url,
            timeout: transport.timeout,
        })
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL by appending `segments` to the API root.
    ///
    /// Each segment is percent-encoded on its own, so an id containing `/`
    /// or `?` stays one segment. An empty last segment yields the trailing
    /// slash some endpoints insist on.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut full = self.api_url.clone();
        full.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(segments);
        Ok(full)
    }

    // ── Request helpers ──────────────────────────────────────────────

    pub(crate) async fn get(
        &self,
        path: &[&str],
        token: Option<&SecretString>,
    ) -> Result<ApiResponse, Error> {
        self.send::<()>(Method::GET, path, token, None).await
    }

    pub(crate) async fn post<B: Serialize + Sync>(
        &self,
        path: &[&str],
        token: Option<&SecretString>,
        body: &B,
    ) -> Result<ApiResponse, Error> {
        self.send(Method::POST, path, token, Some(body)).await
    }

    pub(crate) async fn put<B: Serialize + Sync>(
        &self,
        path: &[&str],
        token: Option<&SecretString>,
        body: &B,
    ) -> Result<ApiResponse, Error> {
        self.send(Method::PUT, path, token, Some(body)).await
    }

    pub(crate) async fn delete(
        &self,
        path: &[&str],
        token: Option<&SecretString>,
    ) -> Result<ApiResponse, Error> {
        self.send::<()>(Method::DELETE, path, token, None).await
    }

    /// Perform one request and capture status + body.
    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &[&str],
        token: Option<&SecretString>,
        body: Option<&B>,
    ) -> Result<ApiResponse, Error> {
        let url = self.url(path)?;
        debug!(%method, %url, "sending request");

        let mut builder = self.http.request(method, url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(|e| self.map_send_error(e))?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| self.map_send_error(e))?;

        let body = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice::<Value>(&bytes).ok()
        };
        trace!(%status, has_body = body.is_some(), "response received");

        Ok(ApiResponse { status, body })
    }

    fn map_send_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::Transport(err)
        }
    }
}
