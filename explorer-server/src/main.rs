use std::sync::Arc;

use explorer_engine::ExplorerEngine;
use explorer_server::{spawn_session_sweeper, HttpServer, ServerConfig};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "explorer_server=debug,explorer_engine=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tabular Explorer v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env()?;
    let addr = config.socket_addr()?;

    info!("Configuration loaded:");
    info!("  Listen address: {}", addr);
    info!("  Upload limit: {} MB", config.upload_limit_mb);
    info!("  Session timeout: {} min", config.session_timeout_mins);
    info!("  Preview rows: {}", config.preview_rows);
    if let Some(font) = &config.font_family {
        info!("  Chart font: {}", font);
    }

    let engine = Arc::new(ExplorerEngine::new(config.engine_settings()));
    info!("Explorer engine initialized successfully");

    let sweeper = spawn_session_sweeper(engine.clone(), config.cleanup_interval());

    let http_server = HttpServer::new(engine, config.upload_limit_bytes());
    let http_handle = tokio::spawn(async move {
        if let Err(e) = http_server.start(addr).await {
            error!("HTTP server error: {}", e);
        }
    });

    info!("Tabular Explorer started successfully");
    info!("Open http://{} in a browser", addr);

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal, gracefully shutting down...");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
        }
    }

    http_handle.abort();
    sweeper.abort();

    info!("Tabular Explorer shutdown complete");
    Ok(())
}
