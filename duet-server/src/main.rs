use anyhow::{Context, Result};
use clap::Parser;
use duet_server::{RelayService, ServerConfig, router};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::parse();
    let service = RelayService::new(&config);
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Signaling relay listening on ws://{}/ws", config.bind);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
