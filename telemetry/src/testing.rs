//! In-memory stand-ins for the broker and the store.
//!
//! `MemoryBroker` keeps every published payload in an append-only log. A
//! subscription starts at the end of the log as it is when subscribing, so
//! dropping a subscription and subscribing again never replays messages that
//! were already in the log.

use crate::broker::{TelemetrySink, TelemetrySource};
use crate::errors::{BrokerError, StoreError};
use crate::model::{AggregateSnapshot, ReadingFilter, SensorStatus, TelemetryReading};
use crate::store::TelemetryStore;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// A valid reading for `sensor_id`, `seconds` after a fixed epoch.
pub fn sample_reading(sensor_id: &str, seconds: i64, temperature: f64) -> TelemetryReading {
    let timestamp = Utc
        .timestamp_opt(1_700_000_000 + seconds, 0)
        .single()
        .unwrap_or_else(Utc::now);

    TelemetryReading {
        timestamp,
        sensor_id: sensor_id.to_string(),
        zone: "downtown".to_string(),
        latitude: 40.7128,
        longitude: -74.006,
        device_model: "EnviroSense-X2".to_string(),
        firmware_version: "2.4.1".to_string(),
        battery_level: 80,
        signal_strength: -70,
        status: SensorStatus::Ok,
        temperature,
        humidity: 55.0,
        traffic_density: 12,
        pollution_level: 60.0,
        co2_level: 450,
        noise_level: 48.5,
        light_level: 300,
        occupancy: 0,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<TelemetryReading>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_readings(readings: impl IntoIterator<Item = TelemetryReading>) -> Self {
        let store = Self::new();
        lock(&store.rows).extend(readings);
        store
    }

    /// Every stored reading in insertion order.
    pub fn readings(&self) -> Vec<TelemetryReading> {
        lock(&self.rows).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn insert(&self, reading: &TelemetryReading) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        lock(&self.rows).push(reading.clone());
        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<TelemetryReading>, StoreError> {
        self.check_reads()?;

        let rows = lock(&self.rows);
        let mut indexed: Vec<(usize, &TelemetryReading)> = rows.iter().enumerate().collect();
        indexed.sort_by(|(ia, a), (ib, b)| b.timestamp.cmp(&a.timestamp).then(ib.cmp(ia)));

        Ok(indexed
            .into_iter()
            .take(limit as usize)
            .map(|(_, reading)| reading.clone())
            .collect())
    }

    async fn averages(&self, filter: &ReadingFilter) -> Result<AggregateSnapshot, StoreError> {
        self.check_reads()?;

        let rows = lock(&self.rows);
        Ok(AggregateSnapshot::from_readings(
            rows.iter().filter(|reading| filter.matches(reading)),
        ))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LogState {
    published: usize,
    disconnected: bool,
}

#[derive(Debug)]
struct BrokerInner {
    log: Mutex<Vec<Vec<u8>>>,
    state: watch::Sender<LogState>,
    reject_publishes: AtomicBool,
}

#[derive(Debug, Clone)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LogState::default());
        Self {
            inner: Arc::new(BrokerInner {
                log: Mutex::new(Vec::new()),
                state,
                reject_publishes: AtomicBool::new(false),
            }),
        }
    }

    /// Appends a raw payload to the log, bypassing any sink.
    pub fn publish_raw(&self, payload: impl Into<Vec<u8>>) {
        lock(&self.inner.log).push(payload.into());
        self.inner.state.send_modify(|state| state.published += 1);
    }

    pub fn published(&self) -> Vec<Vec<u8>> {
        lock(&self.inner.log).clone()
    }

    pub fn sink(&self) -> MemorySink {
        MemorySink {
            broker: self.clone(),
        }
    }

    /// Subscribes from the current end of the log.
    pub fn subscribe(&self) -> MemorySubscription {
        MemorySubscription {
            offset: lock(&self.inner.log).len(),
            state: self.inner.state.subscribe(),
            broker: self.clone(),
        }
    }

    /// Makes every open subscription fail and every publish fail.
    pub fn disconnect(&self) {
        self.inner.state.send_modify(|state| state.disconnected = true);
    }

    pub fn reconnect(&self) {
        self.inner.state.send_modify(|state| state.disconnected = false);
    }

    pub fn set_reject_publishes(&self, reject: bool) {
        self.inner.reject_publishes.store(reject, Ordering::SeqCst);
    }

    fn is_disconnected(&self) -> bool {
        self.inner.state.borrow().disconnected
    }
}

#[derive(Debug, Clone)]
pub struct MemorySink {
    broker: MemoryBroker,
}

#[async_trait]
impl TelemetrySink for MemorySink {
    async fn publish(&self, payload: String) -> Result<(), BrokerError> {
        if self.broker.is_disconnected() {
            return Err(BrokerError::Disconnected);
        }
        if self.broker.inner.reject_publishes.load(Ordering::SeqCst) {
            return Err(BrokerError::Rejected("publishing disabled".to_string()));
        }
        self.broker.publish_raw(payload);
        Ok(())
    }
}

#[derive(Debug)]
pub struct MemorySubscription {
    broker: MemoryBroker,
    state: watch::Receiver<LogState>,
    offset: usize,
}

impl MemorySubscription {
    /// Index of the next log entry this subscription will deliver.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

#[async_trait]
impl TelemetrySource for MemorySubscription {
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, BrokerError> {
        loop {
            if self.state.borrow().disconnected {
                return Err(BrokerError::Disconnected);
            }

            let next = lock(&self.broker.inner.log).get(self.offset).cloned();
            if let Some(payload) = next {
                self.offset += 1;
                return Ok(Some(payload));
            }

            if self.state.changed().await.is_err() {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_recent_orders_newest_first() {
        let store = MemoryStore::new();
        for (i, t) in [10.0, 20.0, 30.0].into_iter().enumerate() {
            store.insert(&sample_reading("sensor-001", i as i64, t)).await.unwrap();
        }

        let recent = store.recent(2).await.unwrap();
        let temps: Vec<f64> = recent.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![30.0, 20.0]);
    }

    #[tokio::test]
    async fn test_recent_breaks_ties_by_insertion() {
        let store = MemoryStore::new();
        store.insert(&sample_reading("sensor-001", 5, 1.0)).await.unwrap();
        store.insert(&sample_reading("sensor-002", 5, 2.0)).await.unwrap();
        store.insert(&sample_reading("sensor-003", 1, 3.0)).await.unwrap();

        let ids: Vec<String> = store
            .recent(10)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.sensor_id)
            .collect();
        assert_eq!(ids, vec!["sensor-002", "sensor-001", "sensor-003"]);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.insert(&sample_reading("sensor-001", 0, 1.0)).await.is_err());
        assert!(store.is_empty());

        store.set_fail_reads(true);
        assert!(store.recent(1).await.is_err());
        assert!(store.averages(&ReadingFilter::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_subscription_starts_at_end_of_log() {
        let broker = MemoryBroker::new();
        broker.publish_raw("before");

        let mut subscription = broker.subscribe();
        assert_eq!(subscription.offset(), 1);

        broker.publish_raw("after");
        let message = subscription.next_message().await.unwrap();
        assert_eq!(message.as_deref(), Some(&b"after"[..]));
    }

    #[tokio::test]
    async fn test_subscription_wakes_on_publish() {
        let broker = MemoryBroker::new();
        let mut subscription = broker.subscribe();

        let publisher = broker.sink();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish("late".to_string()).await.unwrap();
        });

        let message = tokio::time::timeout(Duration::from_secs(1), subscription.next_message())
            .await
            .expect("subscription should wake up")
            .unwrap();
        assert_eq!(message.as_deref(), Some(&b"late"[..]));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_fails_subscription_and_sink() {
        let broker = MemoryBroker::new();
        let mut subscription = broker.subscribe();

        broker.disconnect();
        assert!(matches!(
            subscription.next_message().await,
            Err(BrokerError::Disconnected)
        ));
        assert!(broker.sink().publish("x".to_string()).await.is_err());

        broker.reconnect();
        assert!(broker.sink().publish("y".to_string()).await.is_ok());
    }
}
