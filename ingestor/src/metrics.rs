use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_messages_total",
        "Total messages received from the broker"
    ))
    .expect("valid metric options");
    pub static ref PERSISTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_persisted_total",
        "Total readings written to the store"
    ))
    .expect("valid metric options");
    pub static ref MALFORMED_MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_malformed_messages_total",
        "Total messages skipped because they could not be decoded"
    ))
    .expect("valid metric options");
    pub static ref INVALID_MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_invalid_messages_total",
        "Total messages skipped because they failed validation"
    ))
    .expect("valid metric options");
    pub static ref DB_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_db_failures_total",
        "Total readings dropped because the insert failed"
    ))
    .expect("valid metric options");
    pub static ref PERSIST_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "ingestor_persist_latency_seconds",
            "Time taken to insert one reading"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .expect("valid metric options");
}

pub fn init_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PERSISTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MALFORMED_MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INVALID_MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DB_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PERSIST_LATENCY_SECONDS.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

async fn metrics_handler() -> String {
    gather_metrics()
}

/// Binds the metrics listener. Called before consuming starts so that an
/// unusable address fails startup.
pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);
    Ok(listener)
}

/// Serves `/metrics` until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, shutdown: CancellationToken) -> std::io::Result<()> {
    let app = Router::new().route("/metrics", get(metrics_handler));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_contains_registered_counters() {
        // Registration is global; a second call from another test would fail.
        let _ = init_metrics();
        MESSAGES_TOTAL.inc();

        let text = gather_metrics();
        assert!(text.contains("ingestor_messages_total"));
        assert!(text.contains("ingestor_persist_latency_seconds"));
    }

    #[tokio::test]
    async fn test_bind_fails_on_used_address() {
        let taken = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = taken.local_addr().unwrap();

        assert!(bind(addr).await.is_err());
    }
}
