use std::sync::Arc;

use crate::api::{self, ApiState};
use crate::cleanup::CleanupScheduler;
use crate::config::ActivityConfig;
use crate::error::{ActivityError, Result};
use crate::logger::Logger;

/// Execute the `serve` command: run the read API with scheduled cleanup.
pub async fn execute(
    logger: Arc<Logger>,
    mut config: ActivityConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    // Override config with CLI arguments
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    if config.admin_token.is_none() {
        tracing::warn!("No admin_token configured; every read request will be refused");
    }

    let cleanup = Arc::new(CleanupScheduler::new(logger.clone()))
        .spawn(config.cleanup_interval());

    let bind_addr = config.bind_address();
    let app = api::router(ApiState::new(logger.clone(), config.admin_token.clone()));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| ActivityError::Config(format!("Failed to bind to {bind_addr}: {e}")))?;

    println!("A3S Activity read API listening on http://{}", bind_addr);
    println!("Press Ctrl+C to stop");
    tracing::info!(
        backend = logger.storage().name(),
        retention_months = logger.retention_months(),
        "Server listening on {bind_addr}"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await;

    cleanup.abort();
    logger.shutdown();
    served.map_err(ActivityError::Io)
}
