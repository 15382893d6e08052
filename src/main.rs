use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use agent_gateway::build_state;
use agent_gateway::config::Config;
use agent_gateway::handlers::create_router;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Missing configuration is fatal
    let config = Config::load()?;

    let bind: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid GATEWAY_HTTP_BIND '{}'", config.server.bind))?;

    let state = build_state(&config).await?;
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(
        %bind,
        policy = ?config.session.policy,
        "Starting agent gateway"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
