pub mod http;

use crate::media::MediaGateway;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

pub async fn run(bind: SocketAddr, gateway: MediaGateway) -> Result<()> {
    let merging = gateway.ffmpeg_available();
    let app = http::router(Arc::new(gateway));

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(
        "Listening on http://{} (merged downloads: {})",
        listener.local_addr()?,
        if merging { "enabled" } else { "disabled" }
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
