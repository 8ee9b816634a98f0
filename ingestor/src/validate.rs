use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use telemetry::catalog;
use telemetry::{SensorStatus, TelemetryReading};
use thiserror::Error;

const HUMIDITY_MIN: f64 = 0.0;
const HUMIDITY_MAX: f64 = 100.0;
const BATTERY_MIN: f64 = 0.0;
const BATTERY_MAX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Timestamp,
    Text,
    Float,
    Integer,
}

impl FieldKind {
    pub fn describe(&self) -> &'static str {
        match self {
            FieldKind::Timestamp => "an RFC 3339 timestamp string",
            FieldKind::Text => "a string",
            FieldKind::Float => "a number",
            FieldKind::Integer => "a 32-bit integer",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::Timestamp => value
                .as_str()
                .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
            FieldKind::Text => value.is_string(),
            FieldKind::Float => value.is_number(),
            FieldKind::Integer => value.as_i64().is_some_and(|v| i32::try_from(v).is_ok()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: true,
    }
}

/// Wire schema of a reading. `status` may be omitted and is then derived.
pub const FIELDS: &[FieldSpec] = &[
    required("timestamp", FieldKind::Timestamp),
    required("sensorId", FieldKind::Text),
    required("zone", FieldKind::Text),
    required("latitude", FieldKind::Float),
    required("longitude", FieldKind::Float),
    required("deviceModel", FieldKind::Text),
    required("firmwareVersion", FieldKind::Text),
    required("batteryLevel", FieldKind::Integer),
    required("signalStrength", FieldKind::Integer),
    FieldSpec {
        name: "status",
        kind: FieldKind::Text,
        required: false,
    },
    required("temperature", FieldKind::Float),
    required("humidity", FieldKind::Float),
    required("trafficDensity", FieldKind::Integer),
    required("pollutionLevel", FieldKind::Float),
    required("co2Level", FieldKind::Integer),
    required("noiseLevel", FieldKind::Float),
    required("lightLevel", FieldKind::Integer),
    required("occupancy", FieldKind::Integer),
];

/// Outcome of checking one decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid(TelemetryReading),
    Invalid(InvalidReason),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidReason {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("field '{field}' value {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("field '{field}' must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("unknown sensor '{0}'")]
    UnknownSensor(String),

    #[error("status '{status}' does not match batteryLevel {battery_level}")]
    InconsistentStatus { status: String, battery_level: i32 },

    #[error("undecodable reading: {0}")]
    Malformed(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReading {
    timestamp: DateTime<Utc>,
    sensor_id: String,
    zone: String,
    latitude: f64,
    longitude: f64,
    device_model: String,
    firmware_version: String,
    battery_level: i32,
    signal_strength: i32,
    #[serde(default)]
    status: Option<String>,
    temperature: f64,
    humidity: f64,
    traffic_density: i32,
    pollution_level: f64,
    co2_level: i32,
    noise_level: f64,
    light_level: i32,
    occupancy: i32,
}

/// Validates a decoded payload against the wire schema and the catalog.
pub fn validate(payload: &Value) -> Validation {
    match check(payload) {
        Ok(reading) => Validation::Valid(reading),
        Err(reason) => Validation::Invalid(reason),
    }
}

fn check(payload: &Value) -> Result<TelemetryReading, InvalidReason> {
    let object = payload.as_object().ok_or(InvalidReason::NotAnObject)?;
    check_structure(object)?;

    let wire: WireReading = serde_json::from_value(payload.clone())
        .map_err(|e| InvalidReason::Malformed(e.to_string()))?;
    let reading = into_reading(wire)?;
    check_values(&reading)?;

    Ok(reading)
}

fn check_structure(object: &Map<String, Value>) -> Result<(), InvalidReason> {
    for field in FIELDS {
        match object.get(field.name) {
            None | Some(Value::Null) if !field.required => {}
            None => return Err(InvalidReason::MissingField(field.name)),
            Some(value) if !field.kind.accepts(value) => {
                return Err(InvalidReason::WrongType {
                    field: field.name,
                    expected: field.kind.describe(),
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn into_reading(wire: WireReading) -> Result<TelemetryReading, InvalidReason> {
    let derived = SensorStatus::from_battery(wire.battery_level);
    if let Some(status) = wire.status {
        if status != derived.as_str() {
            return Err(InvalidReason::InconsistentStatus {
                status,
                battery_level: wire.battery_level,
            });
        }
    }

    Ok(TelemetryReading {
        timestamp: wire.timestamp,
        sensor_id: wire.sensor_id,
        zone: wire.zone,
        latitude: wire.latitude,
        longitude: wire.longitude,
        device_model: wire.device_model,
        firmware_version: wire.firmware_version,
        battery_level: wire.battery_level,
        signal_strength: wire.signal_strength,
        status: derived,
        temperature: wire.temperature,
        humidity: wire.humidity,
        traffic_density: wire.traffic_density,
        pollution_level: wire.pollution_level,
        co2_level: wire.co2_level,
        noise_level: wire.noise_level,
        light_level: wire.light_level,
        occupancy: wire.occupancy,
    })
}

fn check_values(reading: &TelemetryReading) -> Result<(), InvalidReason> {
    if !catalog::is_known(&reading.sensor_id) {
        return Err(InvalidReason::UnknownSensor(reading.sensor_id.clone()));
    }

    for (field, value) in [
        ("zone", &reading.zone),
        ("deviceModel", &reading.device_model),
        ("firmwareVersion", &reading.firmware_version),
    ] {
        if value.trim().is_empty() {
            return Err(InvalidReason::EmptyField(field));
        }
    }

    check_range("batteryLevel", reading.battery_level.into(), BATTERY_MIN, BATTERY_MAX)?;
    check_range("humidity", reading.humidity, HUMIDITY_MIN, HUMIDITY_MAX)?;
    check_range("latitude", reading.latitude, -90.0, 90.0)?;
    check_range("longitude", reading.longitude, -180.0, 180.0)?;

    for (field, value) in [
        ("trafficDensity", f64::from(reading.traffic_density)),
        ("pollutionLevel", reading.pollution_level),
        ("co2Level", f64::from(reading.co2_level)),
        ("noiseLevel", reading.noise_level),
        ("lightLevel", f64::from(reading.light_level)),
        ("occupancy", f64::from(reading.occupancy)),
    ] {
        if value < 0.0 {
            return Err(InvalidReason::Negative { field, value });
        }
    }

    Ok(())
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), InvalidReason> {
    if value < min || value > max {
        return Err(InvalidReason::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use telemetry::testing::sample_reading;

    fn valid_payload() -> Value {
        serde_json::to_value(sample_reading("sensor-001", 0, 25.0)).unwrap()
    }

    fn with(field: &str, value: Value) -> Value {
        let mut payload = valid_payload();
        payload[field] = value;
        payload
    }

    fn without(field: &str) -> Value {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().remove(field);
        payload
    }

    fn reason(payload: &Value) -> InvalidReason {
        match validate(payload) {
            Validation::Invalid(reason) => reason,
            Validation::Valid(reading) => panic!("expected invalid, got {:?}", reading),
        }
    }

    #[test]
    fn test_valid_telemetry() {
        let expected = sample_reading("sensor-001", 0, 25.0);
        assert_eq!(validate(&valid_payload()), Validation::Valid(expected));
    }

    #[test]
    fn test_status_is_derived_when_absent() {
        match validate(&without("status")) {
            Validation::Valid(reading) => assert_eq!(reading.status, SensorStatus::Ok),
            Validation::Invalid(reason) => panic!("unexpected {}", reason),
        }

        let mut low = without("status");
        low["batteryLevel"] = json!(10);
        match validate(&low) {
            Validation::Valid(reading) => assert_eq!(reading.status, SensorStatus::LowBattery),
            Validation::Invalid(reason) => panic!("unexpected {}", reason),
        }
    }

    #[test]
    fn test_inconsistent_status() {
        let payload = with("status", json!("low_battery"));
        assert!(matches!(
            reason(&payload),
            InvalidReason::InconsistentStatus { battery_level: 80, .. }
        ));
    }

    #[test]
    fn test_not_an_object() {
        assert_eq!(reason(&json!([1, 2, 3])), InvalidReason::NotAnObject);
        assert_eq!(reason(&json!("reading")), InvalidReason::NotAnObject);
    }

    #[test]
    fn test_missing_field_is_named() {
        assert_eq!(
            reason(&without("humidity")),
            InvalidReason::MissingField("humidity")
        );
        assert_eq!(
            reason(&with("sensorId", Value::Null)),
            InvalidReason::WrongType {
                field: "sensorId",
                expected: "a string"
            }
        );
    }

    #[test]
    fn test_numeric_strings_are_not_coerced() {
        assert!(matches!(
            reason(&with("temperature", json!("25.10"))),
            InvalidReason::WrongType {
                field: "temperature",
                ..
            }
        ));
    }

    #[test]
    fn test_integer_fields_reject_fractions() {
        assert!(matches!(
            reason(&with("occupancy", json!(1.5))),
            InvalidReason::WrongType {
                field: "occupancy",
                ..
            }
        ));
        assert!(matches!(
            reason(&with("co2Level", json!(5_000_000_000i64))),
            InvalidReason::WrongType { field: "co2Level", .. }
        ));
    }

    #[test]
    fn test_bad_timestamp() {
        assert!(matches!(
            reason(&with("timestamp", json!("yesterday"))),
            InvalidReason::WrongType {
                field: "timestamp",
                ..
            }
        ));
    }

    #[test]
    fn test_temperature_has_no_range() {
        for temperature in [-80.0, 150.0] {
            match validate(&with("temperature", json!(temperature))) {
                Validation::Valid(reading) => assert_eq!(reading.temperature, temperature),
                Validation::Invalid(reason) => panic!("rejected {}: {}", temperature, reason),
            }
        }
    }

    #[test]
    fn test_invalid_humidity() {
        assert!(matches!(
            reason(&with("humidity", json!(150.0))),
            InvalidReason::OutOfRange { field: "humidity", .. }
        ));
    }

    #[test]
    fn test_invalid_battery() {
        assert!(matches!(
            reason(&with("batteryLevel", json!(101))),
            InvalidReason::OutOfRange {
                field: "batteryLevel",
                ..
            }
        ));
        assert!(matches!(
            reason(&with("batteryLevel", json!(-1))),
            InvalidReason::OutOfRange { .. }
        ));
    }

    #[test]
    fn test_negative_counts() {
        assert_eq!(
            reason(&with("trafficDensity", json!(-3))),
            InvalidReason::Negative {
                field: "trafficDensity",
                value: -3.0
            }
        );
    }

    #[test]
    fn test_zero_occupancy_is_valid() {
        assert!(matches!(
            validate(&with("occupancy", json!(0))),
            Validation::Valid(_)
        ));
    }

    #[test]
    fn test_unknown_sensor() {
        assert_eq!(
            reason(&with("sensorId", json!("sensor-999"))),
            InvalidReason::UnknownSensor("sensor-999".to_string())
        );
    }

    #[test]
    fn test_empty_zone() {
        assert_eq!(
            reason(&with("zone", json!(" "))),
            InvalidReason::EmptyField("zone")
        );
    }

    #[test]
    fn test_schema_lists_every_field_once() {
        let names: std::collections::HashSet<_> = FIELDS.iter().map(|f| f.name).collect();
        assert_eq!(names.len(), FIELDS.len());
        assert_eq!(FIELDS.iter().filter(|f| !f.required).count(), 1);
        assert_eq!(valid_payload().as_object().unwrap().len(), FIELDS.len());
    }
}
