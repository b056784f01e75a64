use anyhow::{Context, Result};
use flash_service::api::start_api_server;
use flash_service::config::{Config, StoreBackend};
use flash_service::{
    AppState, Connector, Flash, FlashSaleWriter, InMemoryStore, Inventory, Metric, MetricReader,
    PgConnector, StoreHandle,
};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        backend = ?config.database.backend,
        "Starting Nier Flash Sale Service"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    let connector: Box<dyn Connector> = match config.database.backend {
        StoreBackend::Postgres => Box::new(PgConnector::new(config.database.max_connections)),
        StoreBackend::Memory => Box::new(InMemoryStore::new()),
    };

    // One handle per collection, each against the shared connection settings
    let flash = StoreHandle::<Flash>::provision(
        connector.as_ref(),
        &config.db_config(&config.collections.flash),
    )
    .await
    .context("Failed to provision flash collection")?;

    let metric = StoreHandle::<Metric>::provision(
        connector.as_ref(),
        &config.db_config(&config.collections.metric),
    )
    .await
    .context("Failed to provision metric collection")?;

    let inventory = StoreHandle::<Inventory>::provision(
        connector.as_ref(),
        &config.db_config(&config.collections.inventory),
    )
    .await
    .context("Failed to provision inventory collection")?;

    info!(inventory = %inventory.collection(), "Inventory collection provisioned");

    let api_state = AppState {
        writer: Arc::new(FlashSaleWriter::new(flash)),
        reader: Arc::new(MetricReader::with_policy(
            metric,
            config.empty_result_policy(),
        )),
        max_batch_size: config.api.max_batch_size,
    };

    // Spawn API server task
    let api_config = config.api.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = start_api_server(api_state, &api_config).await {
            error!(error = %e, "API server error");
        }
    });

    info!("Flash sale service started successfully");

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down flash sale service");

    api_handle.abort();

    info!("Flash sale service stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
