pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod tools;
pub mod transport;

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::handlers::AppState;
use crate::orchestrator::SessionOrchestrator;
use crate::retry::RetryPolicy;
use crate::tools::ToolRegistry;
use crate::transport::{AgentTransport, FoundryTransport};

/// Wire the agent service client, the tool registry and the orchestrator together
pub async fn build_state(cfg: &Config) -> Result<AppState> {
    let tools = Arc::new(ToolRegistry::with_defaults());
    let transport = Arc::new(FoundryTransport::new(
        &cfg.agent,
        RetryPolicy::from_config(&cfg.retry),
        Arc::clone(&tools),
    )?);

    let orchestrator = SessionOrchestrator::connect(
        transport as Arc<dyn AgentTransport>,
        cfg,
        &tools,
    )
    .await?;

    Ok(AppState::new(Arc::new(orchestrator), cfg.upload.clone()))
}
