use clap::Parser;
use simulator::config::Args;
use simulator::errors::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use telemetry::errors::BrokerError;
use telemetry::testing::{MemoryBroker, MemorySink};
use tokio_util::sync::CancellationToken;

fn args(topic: &str) -> Args {
    Args::try_parse_from([
        "simulator",
        "--broker-addresses",
        "localhost:1883",
        "--topic",
        topic,
        "--publish-interval-ms",
        "5",
    ])
    .unwrap()
}

async fn launch_with(topic: &str, broker: MemoryBroker, shutdown: CancellationToken) -> (Result<u64, Error>, bool) {
    let connected = Arc::new(AtomicBool::new(false));
    let flag = connected.clone();

    let result = simulator::launch(args(topic), shutdown, move |_config| async move {
        flag.store(true, Ordering::SeqCst);
        Ok::<MemorySink, BrokerError>(broker.sink())
    })
    .await
    .map(|stats| stats.published);

    (result, connected.load(Ordering::SeqCst))
}

#[tokio::test]
async fn test_invalid_topic_fails_before_connecting() {
    for topic in ["sensor data", "city/telemetry", ""] {
        let (result, connected) =
            launch_with(topic, MemoryBroker::new(), CancellationToken::new()).await;

        assert!(matches!(result, Err(Error::Config(_))), "topic {:?}", topic);
        assert!(!connected, "connected despite invalid topic {:?}", topic);
    }
}

#[tokio::test]
async fn test_connect_failure_is_fatal() {
    let result = simulator::launch(args("telemetry"), CancellationToken::new(), |_config| async {
        Err::<MemorySink, BrokerError>(BrokerError::Disconnected)
    })
    .await;

    assert!(matches!(result, Err(Error::Broker(_))));
}

#[tokio::test]
async fn test_valid_topic_publishes_until_shutdown() {
    let broker = MemoryBroker::new();
    let shutdown = CancellationToken::new();

    let stopper = shutdown.clone();
    let watcher = broker.clone();
    tokio::spawn(async move {
        while watcher.published().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        stopper.cancel();
    });

    let (result, connected) = tokio::time::timeout(
        Duration::from_secs(5),
        launch_with("telemetry", broker.clone(), shutdown),
    )
    .await
    .expect("publisher should stop after shutdown");

    assert!(connected);
    assert!(result.unwrap() >= 2);
}
