use analytics::config::{Args, Config};
use analytics::errors::Result;
use analytics::metrics;
use analytics::query::QueryService;
use analytics::rest;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use telemetry::config::redact_url;
use telemetry::db::PgStore;
use telemetry::{logging, shutdown};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init();

    let args = Args::parse();
    info!("Starting Analytics API");

    if let Err(e) = run(args).await {
        error!("Analytics API failed: {}", e);
        std::process::exit(1);
    }

    info!("Shutting down");
}

async fn run(args: Args) -> Result<()> {
    let config = Config::try_from(args)?;
    info!("Database: {}", redact_url(&config.database_url));

    metrics::init_metrics()?;

    let store = PgStore::connect(&config.database_url, config.startup_timeout).await?;
    let service = QueryService::new(Arc::new(store));

    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", http_addr, e);
            service.close().await;
            return Err(e.into());
        }
    };
    info!("HTTP server listening on {}", http_addr);

    let shutdown = shutdown::signal_token();
    let app = rest::create_router(service.clone());
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    service.close().await;
    served.map_err(Into::into)
}
