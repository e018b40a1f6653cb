//! Object Detection Service
//!
//! Serves object detections from an OpenVINO SSD model over a small REST API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use tpu_vision::api::rest::{create_rest_router, AppState, DETECTION_ROUTE};
use tpu_vision::cli::Cli;
use tpu_vision::config::Config;
use tpu_vision::engine::OpenVinoDetector;
use tpu_vision::labels::LabelTable;
use tpu_vision::service::DetectionService;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(cli.log_level())
        .with_target(false)
        .init();

    info!("Starting Object Detection Service v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = Config::load(&cli.config).unwrap_or_else(|e| {
        info!("Using default config ({})", e);
        Config::default()
    });
    cli.apply(&mut config);

    info!("Configuration loaded:");
    info!("  Port: {}", config.server.port);
    info!("  Device: {}", config.inference.device);
    info!("  Model: {}", config.models.model.display());
    info!("  Labels: {}", config.models.labels.display());
    info!("  Request timeout: {}s", config.server.request_timeout_secs);

    // Model and labels are required; failing here aborts startup
    let engine = OpenVinoDetector::load(&config.inference, &config.models.model)
        .with_context(|| format!("failed to load model {}", config.models.model.display()))?;
    info!("Loaded engine with model: {}", config.models.model.display());

    let labels = LabelTable::load(&config.models.labels)
        .with_context(|| format!("failed to load labels {}", config.models.labels.display()))?;
    info!("Loaded {} labels", labels.len());

    let service = Arc::new(DetectionService::new(
        Arc::new(engine),
        labels,
        config.inference.detect_params(),
        Duration::from_secs(config.server.request_timeout_secs),
    ));

    let app_state = Arc::new(AppState::new(service));
    let router = create_rest_router(app_state, config.server.max_body_bytes);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("REST API listening on http://{}", addr);
    info!("Detection: POST http://{}{}", addr, DETECTION_ROUTE);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Goodbye!");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, cleaning up...");
}
