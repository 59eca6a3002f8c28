// Device and telemetry endpoints

use secrecy::SecretString;
use serde_json::{Map, Value};

use crate::client::{ApiResponse, GardenClient};
use crate::error::Error;
use crate::models::DeviceCommandRequest;

/// Placeholder substituted with the device id in telemetry path templates.
pub const DEVICE_ID_PLACEHOLDER: &str = "{device_id}";

/// Telemetry path used when a profile doesn't override it.
pub const DEFAULT_TELEMETRY_PATH: &str = "sensor-readings/device/{device_id}/latest";

/// Split a telemetry path template into segments, substituting the device
/// id for the placeholder segment.
pub fn telemetry_segments<'a>(template: &'a str, device_id: &'a str) -> Vec<&'a str> {
    template
        .trim_start_matches('/')
        .split('/')
        .map(|seg| if seg == DEVICE_ID_PLACEHOLDER { device_id } else { seg })
        .collect()
}

impl GardenClient {
    /// `GET /devices/{id}`: device metadata, usually wrapped as `{"device": {...}}`.
    pub async fn device(&self, token: &SecretString, device_id: &str) -> Result<ApiResponse, Error> {
        self.get(&["devices", device_id], Some(token)).await
    }

    /// `PUT /devices/{id}/` with the edited fields.
    pub async fn update_device(
        &self,
        token: &SecretString,
        device_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<ApiResponse, Error> {
        self.put(&["devices", device_id, ""], Some(token), fields)
            .await
    }

    /// `PUT /devices/{id}/command` with `{"command": name}`.
    pub async fn device_command(
        &self,
        token: &SecretString,
        device_id: &str,
        command: &str,
    ) -> Result<ApiResponse, Error> {
        self.put(
            &["devices", device_id, "command"],
            Some(token),
            &DeviceCommandRequest { command },
        )
        .await
    }

    /// `GET <telemetry path>`: latest sensor readings, usually `{"data": {...}}`.
    ///
    /// `template` is relative to the API root; its `{device_id}` segment is
    /// replaced with `device_id`.
    pub async fn telemetry(
        &self,
        token: &SecretString,
        template: &str,
        device_id: &str,
    ) -> Result<ApiResponse, Error> {
        self.get(&telemetry_segments(template, device_id), Some(token))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_segments() {
        assert_eq!(
            telemetry_segments(DEFAULT_TELEMETRY_PATH, "4"),
            ["sensor-readings", "device", "4", "latest"]
        );
    }

    #[test]
    fn placeholder_must_be_a_whole_segment() {
        assert_eq!(
            telemetry_segments("/readings/{device_id}/", "a/b"),
            ["readings", "a/b", ""]
        );
    }
}
