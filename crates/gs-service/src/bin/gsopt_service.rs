use std::sync::Arc;

use gs_service::{serve, AppState, ServiceConfig};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServiceConfig::from_env()?;
    let listener = TcpListener::bind(&config.addr).await?;
    info!(
        addr = %config.addr,
        commit = %config.commit,
        history_policy = ?config.history_policy,
        padding_policy = ?config.padding_policy,
        "gsopt service listening"
    );

    serve(listener, Arc::new(AppState::new(config))).await?;
    Ok(())
}
