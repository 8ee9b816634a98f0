use crate::broker::{TelemetrySink, TelemetrySource};
use crate::config::{format_broker_list, BrokerAddress};
use crate::errors::BrokerError;
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeReasonCode,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CAPACITY: usize = 1000;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// An established MQTT session: the ConnAck has been received.
pub struct MqttConnection {
    client: AsyncClient,
    eventloop: EventLoop,
    address: BrokerAddress,
}

impl MqttConnection {
    pub fn address(&self) -> &BrokerAddress {
        &self.address
    }
}

/// Connects to the first reachable broker of `addresses`, in order.
///
/// The whole sequence must finish within `timeout`.
pub async fn connect(
    addresses: &[BrokerAddress],
    client_id: &str,
    clean_session: bool,
    timeout: Duration,
) -> Result<MqttConnection, BrokerError> {
    let listed = format_broker_list(addresses);

    let attempts = async {
        let mut last_error = String::from("no broker addresses configured");
        for address in addresses {
            info!("Connecting to MQTT broker at {}", address);
            match connect_one(address, client_id, clean_session).await {
                Ok(connection) => {
                    info!("Connected to MQTT broker at {}", address);
                    return Ok(connection);
                }
                Err(e) => {
                    warn!("Failed to connect to MQTT broker at {}: {}", address, e);
                    last_error = e.to_string();
                }
            }
        }
        Err(BrokerError::Unreachable {
            addresses: listed.clone(),
            reason: last_error,
        })
    };

    let outcome = tokio::time::timeout(timeout, attempts).await;
    match outcome {
        Ok(result) => result,
        Err(_) => Err(BrokerError::ConnectTimeout {
            addresses: listed,
            timeout,
        }),
    }
}

async fn connect_one(
    address: &BrokerAddress,
    client_id: &str,
    clean_session: bool,
) -> Result<MqttConnection, BrokerError> {
    let mut mqtt_options = MqttOptions::new(client_id, address.host.as_str(), address.port);
    mqtt_options.set_keep_alive(KEEP_ALIVE);
    mqtt_options.set_clean_session(clean_session);

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
            return Ok(MqttConnection {
                client,
                eventloop,
                address: address.clone(),
            });
        }
    }
}

/// Topic filter that makes members of `group` share the topic's messages.
pub fn shared_subscription(group: &str, topic: &str) -> String {
    format!("$share/{}/{}", group, topic)
}

/// Publishes to one topic; a background task drives the event loop and lets
/// rumqttc reconnect after transient failures.
///
/// While the connection is down `publish` fails instead of queueing, so a
/// reading is never held back and sent late.
pub struct MqttSink {
    client: AsyncClient,
    topic: String,
    connected: Arc<AtomicBool>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl MqttSink {
    pub fn spawn(connection: MqttConnection, topic: impl Into<String>) -> Self {
        let MqttConnection {
            client,
            mut eventloop,
            address,
        } = connection;

        let connected = Arc::new(AtomicBool::new(true));
        let state = connected.clone();

        let driver = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        if !state.swap(true, Ordering::SeqCst) {
                            info!("Reconnected to MQTT broker at {}", address);
                        }
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        debug!("MQTT disconnect sent");
                        break;
                    }
                    Ok(_) => {}
                    Err(ConnectionError::RequestsDone) => break,
                    Err(e) => {
                        if state.swap(false, Ordering::SeqCst) {
                            error!("Lost connection to MQTT broker at {}: {}", address, e);
                        } else {
                            debug!("MQTT reconnect to {} failed: {}", address, e);
                        }
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
            state.store(false, Ordering::SeqCst);
        });

        Self {
            client,
            topic: topic.into(),
            connected,
            driver: Mutex::new(Some(driver)),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetrySink for MqttSink {
    async fn publish(&self, payload: String) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::Disconnected);
        }
        // Never waits on a full request queue; the caller skips the tick instead.
        self.client
            .try_publish(self.topic.as_str(), QoS::AtLeastOnce, false, payload)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.client.disconnect().await?;
        if let Some(driver) = self.driver.lock().await.take() {
            if tokio::time::timeout(DISCONNECT_TIMEOUT, driver).await.is_err() {
                warn!("MQTT event loop did not stop within {:?}", DISCONNECT_TIMEOUT);
            }
        }
        Ok(())
    }
}

/// Delivers messages of a shared subscription, one at a time.
///
/// Any event loop error ends the stream: reconnecting is left to the process
/// supervisor.
pub struct MqttSource {
    client: AsyncClient,
    eventloop: EventLoop,
    filter: String,
}

impl MqttSource {
    pub async fn subscribe(
        connection: MqttConnection,
        topic: &str,
        group: &str,
    ) -> Result<Self, BrokerError> {
        let filter = shared_subscription(group, topic);
        connection
            .client
            .subscribe(filter.as_str(), QoS::AtLeastOnce)
            .await?;
        info!("Subscribing to {} with QoS 1", filter);

        Ok(Self {
            client: connection.client,
            eventloop: connection.eventloop,
            filter,
        })
    }
}

#[async_trait]
impl TelemetrySource for MqttSource {
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, BrokerError> {
        loop {
            match self.eventloop.poll().await? {
                Event::Incoming(Packet::Publish(publish)) => {
                    debug!(
                        "Received message on topic {}, size: {} bytes",
                        publish.topic,
                        publish.payload.len()
                    );
                    return Ok(Some(publish.payload.to_vec()));
                }
                Event::Incoming(Packet::SubAck(ack)) => {
                    if ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        return Err(BrokerError::SubscribeRejected(self.filter.clone()));
                    }
                    info!("Subscribed to {}", self.filter);
                }
                Event::Incoming(Packet::Disconnect) => return Err(BrokerError::Disconnected),
                _ => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        self.client.disconnect().await?;
        let flush = async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(DISCONNECT_TIMEOUT, flush).await.is_err() {
            warn!("MQTT disconnect did not complete within {:?}", DISCONNECT_TIMEOUT);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_shared_subscription_filter() {
        assert_eq!(
            shared_subscription("telemetry-consumer-group", "telemetry"),
            "$share/telemetry-consumer-group/telemetry"
        );
    }

    #[tokio::test]
    async fn test_connect_fails_when_nothing_listens() {
        // Bind and drop to get a local port that refuses connections.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let addresses = vec![BrokerAddress {
            host: "127.0.0.1".to_string(),
            port,
        }];
        let result = connect(&addresses, "test-client", true, Duration::from_secs(5)).await;

        assert!(matches!(
            result,
            Err(BrokerError::Unreachable { .. }) | Err(BrokerError::ConnectTimeout { .. })
        ));
    }

    /// Accepts one client, answers its CONNECT with a CONNACK, then goes away.
    async fn broker_that_vanishes() -> BrokerAddress {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            let _ = socket.read(&mut buf).await.unwrap();
            socket.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            // Dropping both closes the session and refuses reconnects.
        });

        BrokerAddress {
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn test_publish_fails_while_broker_is_down() {
        let address = broker_that_vanishes().await;
        let connection = connect(&[address], "sink-test", true, Duration::from_secs(5))
            .await
            .unwrap();
        let sink = MqttSink::spawn(connection, "telemetry");

        tokio::time::timeout(Duration::from_secs(5), async {
            while sink.is_connected() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("sink should notice the lost connection");

        for _ in 0..20 {
            assert!(matches!(
                sink.publish("{}".to_string()).await,
                Err(BrokerError::Disconnected)
            ));
        }
    }
}
