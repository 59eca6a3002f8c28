// ── Telemetry snapshot and logical sensors ──
//
// Firmware revisions disagree on key names (`soil_moisture_percent` vs
// `soil_moisture`), so each logical sensor owns an ordered alias list and
// the first key present in the payload wins.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::error::CoreError;

/// Rendered in place of a reading the device didn't report.
pub const UNKNOWN_READING: &str = "--";

/// A logical sensor shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Sensor {
    Temperature,
    Humidity,
    SoilMoisture,
    WaterLevel,
    PumpStatus,
    SystemStatus,
}

impl Sensor {
    /// Payload keys to try, highest priority first.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Temperature => &["temperature"],
            Self::Humidity => &["humidity"],
            Self::SoilMoisture => &["soil_moisture_percent", "soil_moisture"],
            Self::WaterLevel => &["water_percentage", "water_level"],
            Self::PumpStatus => &["pump_status"],
            Self::SystemStatus => &["system_status"],
        }
    }

    pub fn unit(self) -> Option<&'static str> {
        match self {
            Self::Temperature => Some("°C"),
            Self::Humidity | Self::SoilMoisture | Self::WaterLevel => Some("%"),
            Self::PumpStatus | Self::SystemStatus => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
            Self::SoilMoisture => "Soil moisture",
            Self::WaterLevel => "Water level",
            Self::PumpStatus => "Pump",
            Self::SystemStatus => "System",
        }
    }
}

/// The latest telemetry reading, replaced wholesale on every successful poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub readings: Map<String, Value>,
    pub captured_at: Option<DateTime<Utc>>,
}

impl SensorSnapshot {
    /// Build a snapshot from an (already unwrapped) telemetry mapping.
    pub fn from_value(value: Value, captured_at: DateTime<Utc>) -> Result<Self, CoreError> {
        match value {
            Value::Object(readings) => Ok(Self {
                readings,
                captured_at: Some(captured_at),
            }),
            other => Err(CoreError::MalformedResponse {
                message: format!("telemetry is not a mapping: {other}"),
            }),
        }
    }

    /// The raw value for `sensor`: the first alias present in the payload.
    pub fn resolve(&self, sensor: Sensor) -> Option<&Value> {
        sensor
            .aliases()
            .iter()
            .find_map(|key| self.readings.get(*key))
    }

    /// Numeric reading, accepting numbers and numeric strings.
    pub fn numeric(&self, sensor: Sensor) -> Option<f64> {
        match self.resolve(sensor)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Human-readable reading: one decimal plus unit for numeric sensors, uppercased
    /// text for statuses, `--` when absent or unparseable.
    pub fn display(&self, sensor: Sensor) -> String {
        if let Some(unit) = sensor.unit() {
            return match self.numeric(sensor) {
                Some(v) => format!("{v:.1} {unit}"),
                None => UNKNOWN_READING.to_owned(),
            };
        }

        match self.resolve(sensor) {
            None | Some(Value::Null) => UNKNOWN_READING.to_owned(),
            Some(Value::String(s)) if s == UNKNOWN_READING => UNKNOWN_READING.to_owned(),
            Some(Value::String(s)) => s.to_uppercase(),
            Some(other) => other.to_string().to_uppercase(),
        }
    }

    /// Every logical sensor with its rendered reading, in dashboard order.
    pub fn rows(&self) -> Vec<(Sensor, String)> {
        Sensor::iter().map(|s| (s, self.display(s))).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn snapshot(value: Value) -> SensorSnapshot {
        SensorSnapshot::from_value(value, Utc::now()).unwrap()
    }

    #[test]
    fn fallback_alias_resolves() {
        let s = snapshot(json!({"soil_moisture": 42}));
        assert_eq!(s.resolve(Sensor::SoilMoisture), Some(&json!(42)));
        assert_eq!(s.display(Sensor::SoilMoisture), "42.0 %");
    }

    #[test]
    fn primary_alias_wins_over_fallback() {
        let s = snapshot(json!({"water_percentage": 80, "water_level": 12}));
        assert_eq!(s.numeric(Sensor::WaterLevel), Some(80.0));
    }

    #[test]
    fn absent_and_garbage_render_unknown() {
        let s = snapshot(json!({"temperature": "n/a", "pump_status": null}));
        assert_eq!(s.display(Sensor::Temperature), UNKNOWN_READING);
        assert_eq!(s.display(Sensor::Humidity), UNKNOWN_READING);
        assert_eq!(s.display(Sensor::PumpStatus), UNKNOWN_READING);
    }

    #[test]
    fn statuses_are_uppercased() {
        let s = snapshot(json!({"pump_status": "on", "system_status": "ok"}));
        assert_eq!(s.display(Sensor::PumpStatus), "ON");
        assert_eq!(s.display(Sensor::SystemStatus), "OK");
    }

    #[test]
    fn numeric_strings_parse() {
        let s = snapshot(json!({"temperature": "24.46"}));
        assert_eq!(s.display(Sensor::Temperature), "24.5 °C");
    }

    #[test]
    fn non_mapping_rejected() {
        let err = SensorSnapshot::from_value(json!([1, 2]), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::MalformedResponse { .. }));
    }

    #[test]
    fn rows_follow_dashboard_order() {
        let rows = snapshot(json!({})).rows();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].0, Sensor::Temperature);
        assert_eq!(rows[5].0, Sensor::SystemStatus);
    }
}
