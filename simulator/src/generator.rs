use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use telemetry::catalog::{SensorDescriptor, SENSOR_CATALOG};
use telemetry::{SensorStatus, TelemetryReading};

const DEVICE_MODELS: &[&str] = &["EnviroSense-X2", "UrbanNode-400", "AirQ-Pro"];
const FIRMWARE_VERSIONS: &[&str] = &["2.4.1", "2.5.0", "3.0.2"];

/// Maximum per-reading offset applied to a sensor's base coordinates, in degrees.
pub const COORDINATE_JITTER: f64 = 0.0005;

/// Produces synthetic readings for the sensors of a fixed catalog.
#[derive(Debug, Clone, Copy)]
pub struct Generator {
    catalog: &'static [SensorDescriptor],
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            catalog: SENSOR_CATALOG,
        }
    }
}

impl Generator {
    /// Draws one reading for a uniformly chosen sensor.
    pub fn generate(&self, rng: &mut impl Rng) -> TelemetryReading {
        let sensor = &self.catalog[rng.gen_range(0..self.catalog.len())];
        let battery_level = rng.gen_range(0..=100);

        TelemetryReading {
            timestamp: Utc::now(),
            sensor_id: sensor.id.to_string(),
            zone: sensor.zone.to_string(),
            latitude: round(sensor.latitude + rng.gen_range(-COORDINATE_JITTER..=COORDINATE_JITTER), 6),
            longitude: round(sensor.longitude + rng.gen_range(-COORDINATE_JITTER..=COORDINATE_JITTER), 6),
            device_model: pick(rng, DEVICE_MODELS),
            firmware_version: pick(rng, FIRMWARE_VERSIONS),
            battery_level,
            signal_strength: rng.gen_range(-110..=-50),
            status: SensorStatus::from_battery(battery_level),
            temperature: round(rng.gen_range(20.0..30.0), 2),
            humidity: round(rng.gen_range(40.0..70.0), 2),
            traffic_density: rng.gen_range(0..100),
            pollution_level: round(rng.gen_range(50.0..100.0), 2),
            co2_level: rng.gen_range(400..=1200),
            noise_level: round(rng.gen_range(35.0..95.0), 1),
            light_level: rng.gen_range(0..=20_000),
            occupancy: rng.gen_range(0..=50),
        }
    }
}

fn pick(rng: &mut impl Rng, values: &[&str]) -> String {
    values.choose(rng).copied().unwrap_or_default().to_string()
}

fn round(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
