use crate::errors::StoreError;
use crate::model::{AggregateSnapshot, ReadingFilter, SensorStatus, TelemetryReading};
use crate::store::TelemetryStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::time::Duration;
use tracing::info;

const MAX_CONNECTIONS: u32 = 20;

const READING_COLUMNS: &str = "ts, sensor_id, zone, latitude, longitude, device_model, \
    firmware_version, battery_level, signal_strength, temperature, humidity, traffic_density, \
    pollution_level, co2_level, noise_level, light_level, occupancy";

pub async fn make_pool(database_url: &str, acquire_timeout: Duration) -> Result<PgPool, StoreError> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;

    info!("Database connection established");
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

/// Postgres-backed store. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, acquire_timeout: Duration) -> Result<Self, StoreError> {
        Ok(Self::new(make_pool(database_url, acquire_timeout).await?))
    }
}

#[derive(sqlx::FromRow)]
struct ReadingRow {
    ts: DateTime<Utc>,
    sensor_id: String,
    zone: String,
    latitude: f64,
    longitude: f64,
    device_model: String,
    firmware_version: String,
    battery_level: i32,
    signal_strength: i32,
    temperature: f64,
    humidity: f64,
    traffic_density: i32,
    pollution_level: f64,
    co2_level: i32,
    noise_level: f64,
    light_level: i32,
    occupancy: i32,
}

impl From<ReadingRow> for TelemetryReading {
    fn from(row: ReadingRow) -> Self {
        TelemetryReading {
            timestamp: row.ts,
            sensor_id: row.sensor_id,
            zone: row.zone,
            latitude: row.latitude,
            longitude: row.longitude,
            device_model: row.device_model,
            firmware_version: row.firmware_version,
            battery_level: row.battery_level,
            signal_strength: row.signal_strength,
            // The table constraint keeps the stored status equal to this.
            status: SensorStatus::from_battery(row.battery_level),
            temperature: row.temperature,
            humidity: row.humidity,
            traffic_density: row.traffic_density,
            pollution_level: row.pollution_level,
            co2_level: row.co2_level,
            noise_level: row.noise_level,
            light_level: row.light_level,
            occupancy: row.occupancy,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AveragesRow {
    avg_temperature: Option<f64>,
    avg_humidity: Option<f64>,
    avg_pollution: Option<f64>,
    sample_count: i64,
}

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &ReadingFilter) {
    let mut separator = " WHERE ";

    if let Some(sensor_id) = &filter.sensor_id {
        query.push(separator).push("sensor_id = ").push_bind(sensor_id.clone());
        separator = " AND ";
    }
    if let Some(zone) = &filter.zone {
        query.push(separator).push("zone = ").push_bind(zone.clone());
        separator = " AND ";
    }
    if let Some(since) = filter.since {
        query.push(separator).push("ts >= ").push_bind(since);
        separator = " AND ";
    }
    if let Some(until) = filter.until {
        query.push(separator).push("ts <= ").push_bind(until);
    }
}

#[async_trait]
impl TelemetryStore for PgStore {
    async fn insert(&self, reading: &TelemetryReading) -> Result<(), StoreError> {
        let query = format!(
            "INSERT INTO telemetry_readings ({}, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
            READING_COLUMNS
        );

        sqlx::query(&query)
            .bind(reading.timestamp)
            .bind(&reading.sensor_id)
            .bind(&reading.zone)
            .bind(reading.latitude)
            .bind(reading.longitude)
            .bind(&reading.device_model)
            .bind(&reading.firmware_version)
            .bind(reading.battery_level)
            .bind(reading.signal_strength)
            .bind(reading.temperature)
            .bind(reading.humidity)
            .bind(reading.traffic_density)
            .bind(reading.pollution_level)
            .bind(reading.co2_level)
            .bind(reading.noise_level)
            .bind(reading.light_level)
            .bind(reading.occupancy)
            .bind(SensorStatus::from_battery(reading.battery_level).as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<TelemetryReading>, StoreError> {
        let query = format!(
            "SELECT {} FROM telemetry_readings ORDER BY ts DESC, id DESC LIMIT $1",
            READING_COLUMNS
        );

        let rows = sqlx::query_as::<_, ReadingRow>(&query)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(TelemetryReading::from).collect())
    }

    async fn averages(&self, filter: &ReadingFilter) -> Result<AggregateSnapshot, StoreError> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT AVG(temperature) AS avg_temperature, \
                    AVG(humidity) AS avg_humidity, \
                    AVG(pollution_level) AS avg_pollution, \
                    COUNT(*) AS sample_count \
             FROM telemetry_readings",
        );
        push_filter(&mut query, filter);

        let row: AveragesRow = query.build_query_as().fetch_one(&self.pool).await?;

        if row.sample_count == 0 {
            return Ok(AggregateSnapshot::empty());
        }
        Ok(AggregateSnapshot {
            avg_temperature: row.avg_temperature,
            avg_humidity: row.avg_humidity,
            avg_pollution: row.avg_pollution,
            sample_count: row.sample_count,
        })
    }

    async fn close(&self) {
        info!("Closing database pool");
        self.pool.close().await;
    }
}
