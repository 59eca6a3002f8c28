//! Async HTTP client for the smart-garden API.
//!
//! This is the transport leaf of the workspace. It knows how to reach each
//! endpoint, attach the bearer token, and bring back the status and JSON
//! body. It deliberately does not decide what a status means: every
//! completed exchange is an [`ApiResponse`], and only failures to finish
//! the round trip are an [`Error`]. `gardenlink-core` classifies both.

pub mod auth;
pub mod client;
pub mod devices;
pub mod error;
pub mod models;
pub mod transport;
pub mod users;

pub use client::{ApiResponse, GardenClient};
pub use devices::{DEFAULT_TELEMETRY_PATH, telemetry_segments};
pub use error::Error;
pub use transport::{DEFAULT_TIMEOUT, TlsMode, TransportConfig};

pub use reqwest::StatusCode;
