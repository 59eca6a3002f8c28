// ── Domain model ──
//
// Canonical types for the device, its telemetry, actuator commands, and
// user accounts. Wire payloads are lenient about shapes (ids as numbers
// or strings, flags as bools or 0/1); these types normalise them.

pub mod command;
pub mod device;
pub mod sensor;
pub mod user;

pub use command::{CommandName, CommandRequest};
pub use device::{DeviceDescriptor, DeviceEdit};
pub use sensor::{Sensor, SensorSnapshot, UNKNOWN_READING};
pub use user::{Role, UserId, UserRecord};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Render a JSON scalar id (`4`, `"4"`) as a string.
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(id_string))
}

/// Accept `true`, `1`, `"true"`, `"1"`, `"on"` as true.
pub(crate) fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "on"),
        _ => false,
    })
}
