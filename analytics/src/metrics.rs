use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("analytics_queries_total", "Total queries served, by endpoint and outcome"),
        &["endpoint", "outcome"]
    )
    .expect("valid metric options");
    pub static ref QUERY_LATENCY_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "analytics_query_latency_seconds",
            "Time taken to answer a query"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["endpoint"]
    )
    .expect("valid metric options");
}

pub fn init_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(QUERIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUERY_LATENCY_SECONDS.clone()))?;
    Ok(())
}

/// Records one finished query.
pub fn observe(endpoint: &str, outcome: &str, seconds: f64) {
    QUERIES_TOTAL.with_label_values(&[endpoint, outcome]).inc();
    QUERY_LATENCY_SECONDS
        .with_label_values(&[endpoint])
        .observe(seconds);
}

pub fn gather_metrics() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
