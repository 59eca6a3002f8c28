use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Last-known device metadata and mode.
///
/// Fields the dashboard cares about are typed; everything else the server
/// sends is kept in `extra` and passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    #[serde(default, deserialize_with = "super::de_opt_id")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "super::de_flag")]
    pub auto_mode: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceDescriptor {
    /// Parse an (already unwrapped) device payload.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        if !value.is_object() {
            return Err(CoreError::MalformedResponse {
                message: "device payload is not an object".into(),
            });
        }
        serde_json::from_value(value).map_err(|e| CoreError::MalformedResponse {
            message: format!("device payload: {e}"),
        })
    }

    pub fn display_name(&self) -> &str {
        self.device_name.as_deref().unwrap_or("Unnamed Device")
    }

    /// Field-level merge of an admin edit. Only the fields the edit names
    /// change; mode, id and pass-through fields are left as is.
    pub fn merge_edit(&mut self, edit: &DeviceEdit) {
        if let Some(name) = &edit.device_name {
            self.device_name = Some(name.clone());
        }
        if let Some(kind) = &edit.device_type {
            self.device_type = Some(kind.clone());
        }
        if let Some(location) = &edit.location {
            self.location = Some(location.clone());
        }
    }

    pub fn mode_label(&self) -> &'static str {
        if self.auto_mode { "AUTO" } else { "MANUAL" }
    }
}

/// The editable subset of a device descriptor. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEdit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl DeviceEdit {
    /// Build an edit from raw form input. Given fields are trimmed; a given
    /// device name must not be empty, and at least one field must be set.
    pub fn new(
        device_name: Option<&str>,
        device_type: Option<&str>,
        location: Option<&str>,
    ) -> Result<Self, CoreError> {
        let trimmed = |v: Option<&str>| v.map(|s| s.trim().to_owned());
        let edit = Self {
            device_name: trimmed(device_name),
            device_type: trimmed(device_type),
            location: trimmed(location),
        };
        edit.validate()?;
        Ok(edit)
    }

    pub fn is_empty(&self) -> bool {
        self.device_name.is_none() && self.device_type.is_none() && self.location.is_none()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.is_empty() {
            return Err(CoreError::validation("device edit changes nothing"));
        }
        if let Some(name) = &self.device_name {
            if name.trim().is_empty() {
                return Err(CoreError::validation("device name must not be empty"));
            }
        }
        Ok(())
    }

    /// The request body for `PUT /devices/{id}/`: only the edited fields.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        let named = [
            ("device_name", &self.device_name),
            ("device_type", &self.device_type),
            ("location", &self.location),
        ];
        for (key, value) in named {
            if let Some(v) = value {
                fields.insert(key.into(), Value::String(v.clone()));
            }
        }
        fields
    }
}
