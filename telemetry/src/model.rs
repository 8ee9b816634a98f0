use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Readings below this battery level are reported as `low_battery`.
pub const LOW_BATTERY_THRESHOLD: i32 = 25;

/// Device health derived from the battery level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    Ok,
    LowBattery,
}

impl SensorStatus {
    pub fn from_battery(battery_level: i32) -> Self {
        if battery_level < LOW_BATTERY_THRESHOLD {
            SensorStatus::LowBattery
        } else {
            SensorStatus::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorStatus::Ok => "ok",
            SensorStatus::LowBattery => "low_battery",
        }
    }
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sensor reading as it travels through the broker and lands in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReading {
    pub timestamp: DateTime<Utc>,
    pub sensor_id: String,
    pub zone: String,
    pub latitude: f64,
    pub longitude: f64,
    pub device_model: String,
    pub firmware_version: String,
    pub battery_level: i32,
    pub signal_strength: i32,
    pub status: SensorStatus,
    pub temperature: f64,
    pub humidity: f64,
    pub traffic_density: i32,
    pub pollution_level: f64,
    pub co2_level: i32,
    pub noise_level: f64,
    pub light_level: i32,
    pub occupancy: i32,
}

/// Means over a set of persisted readings.
///
/// The averages are `None` when `sample_count` is zero; callers must check the
/// count before trusting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSnapshot {
    pub avg_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_pollution: Option<f64>,
    pub sample_count: i64,
}

impl AggregateSnapshot {
    pub fn empty() -> Self {
        Self {
            avg_temperature: None,
            avg_humidity: None,
            avg_pollution: None,
            sample_count: 0,
        }
    }

    pub fn from_readings<'a, I>(readings: I) -> Self
    where
        I: IntoIterator<Item = &'a TelemetryReading>,
    {
        let mut count = 0i64;
        let (mut temperature, mut humidity, mut pollution) = (0.0, 0.0, 0.0);

        for reading in readings {
            count += 1;
            temperature += reading.temperature;
            humidity += reading.humidity;
            pollution += reading.pollution_level;
        }

        if count == 0 {
            return Self::empty();
        }

        let n = count as f64;
        Self {
            avg_temperature: Some(temperature / n),
            avg_humidity: Some(humidity / n),
            avg_pollution: Some(pollution / n),
            sample_count: count,
        }
    }
}

/// Optional subset selection for aggregate queries. Time bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingFilter {
    pub sensor_id: Option<String>,
    pub zone: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ReadingFilter {
    pub fn is_empty(&self) -> bool {
        self.sensor_id.is_none() && self.zone.is_none() && self.since.is_none() && self.until.is_none()
    }

    pub fn matches(&self, reading: &TelemetryReading) -> bool {
        self.sensor_id.as_ref().map_or(true, |id| *id == reading.sensor_id)
            && self.zone.as_ref().map_or(true, |zone| *zone == reading.zone)
            && self.since.map_or(true, |since| reading.timestamp >= since)
            && self.until.map_or(true, |until| reading.timestamp <= until)
    }
}
