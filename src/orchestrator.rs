//! Conversation-session orchestration.
//!
//! Turns a `(thread id?, message)` pair into a `(thread id, answer)` pair by driving runs on
//! the hosted agent service. Threads are never stored locally: the client carries the
//! thread id between requests and the agent service is the source of truth.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{Config, SessionPolicy};
use crate::error::{GatewayError, Result};
use crate::models::{
    AgentDefinition, DocumentContext, NO_RESPONSE, NewMessage, Reply, Role, Run, RunOutcome,
    RunStatus, ThreadMessage,
};
use crate::tools::ToolRegistry;
use crate::transport::AgentTransport;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub policy: SessionPolicy,
    pub poll_interval: Duration,
    /// Upper bound on how long a single run is polled
    pub max_run_wait: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            policy: cfg.session.policy,
            poll_interval: cfg.poll_interval(),
            max_run_wait: cfg.max_run_wait(),
        }
    }
}

pub struct SessionOrchestrator {
    transport: Arc<dyn AgentTransport>,
    agent_id: String,
    settings: OrchestratorSettings,
}

impl SessionOrchestrator {
    pub fn new(
        transport: Arc<dyn AgentTransport>,
        agent_id: impl Into<String>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            transport,
            agent_id: agent_id.into(),
            settings,
        }
    }

    /// Resolve the agent to converse with and build the orchestrator.
    ///
    /// A configured agent id is verified against the service; otherwise a new agent is
    /// created from the configured model deployment with the registry's tools attached.
    pub async fn connect(
        transport: Arc<dyn AgentTransport>,
        cfg: &Config,
        tools: &ToolRegistry,
    ) -> Result<Self> {
        let agent = match &cfg.agent.agent_id {
            Some(agent_id) => {
                info!(agent_id = %agent_id, "Using configured agent");
                transport.get_agent(agent_id).await?
            }
            None => {
                let model = cfg.agent.model_deployment.clone().ok_or_else(|| {
                    GatewayError::Config(
                        "MODEL_DEPLOYMENT_NAME is required to create an agent".into(),
                    )
                })?;
                let definition = AgentDefinition {
                    model,
                    name: cfg.agent.name.clone(),
                    instructions: cfg.agent.instructions.clone(),
                    description: cfg.agent.description.clone(),
                    tools: tools.definitions(),
                };
                info!(
                    name = %definition.name,
                    model = %definition.model,
                    tools = definition.tools.len(),
                    "Creating agent"
                );
                transport.create_agent(&definition).await?
            }
        };

        info!(agent_id = %agent.id, policy = ?cfg.session.policy, "Agent ready");
        Ok(Self::new(
            transport,
            agent.id,
            OrchestratorSettings::from_config(cfg),
        ))
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Open a conversation grounded in an uploaded document and return its thread id
    pub async fn start_conversation(&self, document: &DocumentContext) -> Result<String> {
        let thread = self
            .transport
            .create_thread(Some(NewMessage::user(document.framing_prompt())))
            .await?;
        info!(
            thread_id = %thread.id,
            filename = %document.filename,
            bytes = document.content.len(),
            "Seeded conversation with document"
        );

        let run = self.transport.create_run(&thread.id, &self.agent_id).await?;
        match self.drive_turn(&thread.id, run).await? {
            RunOutcome::Succeeded(_) => Ok(thread.id),
            RunOutcome::Failed(detail) => Err(GatewayError::upstream(format!(
                "Document seeding run failed: {detail}"
            ))),
        }
    }

    /// Answer `message`, continuing the conversation `thread_id` when one is given.
    ///
    /// A thread that cannot be found or used is replaced by a fresh conversation seeded with
    /// the same message; the caller learns about it only through the returned thread id.
    /// Failed and timed-out runs are not recovered.
    pub async fn continue_conversation(
        &self,
        thread_id: Option<&str>,
        message: &str,
    ) -> Result<Reply> {
        let Some(thread_id) = thread_id else {
            return match self.settings.policy {
                SessionPolicy::AutoCreate => self.open_conversation(message).await,
                SessionPolicy::RequireSession => Err(GatewayError::InvalidRequest(
                    "thread_id is required; upload a document to start a conversation".into(),
                )),
            };
        };

        match self.resume(thread_id, message).await {
            Ok(reply) => Ok(reply),
            Err(err @ GatewayError::Upstream { .. }) => {
                warn!(
                    thread_id = %thread_id,
                    error = %err,
                    "Could not continue thread, starting a new conversation"
                );
                self.open_conversation(message).await
            }
            Err(err) => Err(err),
        }
    }

    async fn open_conversation(&self, message: &str) -> Result<Reply> {
        let thread = self
            .transport
            .create_thread(Some(NewMessage::user(message)))
            .await?;
        info!(thread_id = %thread.id, "Created conversation");

        let run = self.transport.create_run(&thread.id, &self.agent_id).await?;
        let text = self.finish_turn(&thread.id, run).await?;
        Ok(Reply {
            thread_id: thread.id,
            text,
        })
    }

    async fn resume(&self, thread_id: &str, message: &str) -> Result<Reply> {
        let thread = self.transport.get_thread(thread_id).await?;
        self.transport
            .create_message(&thread.id, NewMessage::user(message))
            .await?;
        let run = self.transport.create_run(&thread.id, &self.agent_id).await?;
        let text = self.finish_turn(&thread.id, run).await?;
        Ok(Reply {
            thread_id: thread.id,
            text,
        })
    }

    async fn finish_turn(&self, thread_id: &str, run: Run) -> Result<String> {
        match self.drive_turn(thread_id, run).await? {
            RunOutcome::Succeeded(text) => Ok(text),
            RunOutcome::Failed(detail) => Err(GatewayError::RunFailed(detail)),
        }
    }

    /// Wait for `run` to finish and read the reply it produced
    async fn drive_turn(&self, thread_id: &str, run: Run) -> Result<RunOutcome> {
        let run = self.wait_for_run(thread_id, run).await?;
        match run.status {
            RunStatus::Failed => {
                let detail = run.failure_detail();
                warn!(thread_id = %thread_id, run_id = %run.id, detail = %detail, "Run failed");
                Ok(RunOutcome::Failed(detail))
            }
            status => {
                if status != RunStatus::Completed {
                    warn!(
                        thread_id = %thread_id,
                        run_id = %run.id,
                        status = ?status,
                        "Run ended without completing, reading latest reply"
                    );
                }
                let messages = self.transport.list_messages(thread_id).await?;
                Ok(RunOutcome::Succeeded(latest_assistant_text(&messages)))
            }
        }
    }

    async fn wait_for_run(&self, thread_id: &str, mut run: Run) -> Result<Run> {
        let started = Instant::now();
        while run.status.is_pending() {
            if started.elapsed() >= self.settings.max_run_wait {
                warn!(
                    thread_id = %thread_id,
                    run_id = %run.id,
                    status = ?run.status,
                    "Run exceeded the wait limit"
                );
                return Err(GatewayError::Timeout(self.settings.max_run_wait));
            }
            sleep(self.settings.poll_interval).await;
            run = self.transport.get_run(thread_id, &run.id).await?;
            debug!(thread_id = %thread_id, run_id = %run.id, status = ?run.status, "Polled run");
        }
        Ok(run)
    }
}

/// Text of the newest assistant message, or the no-response sentinel.
/// `messages` must be ordered newest first.
pub fn latest_assistant_text(messages: &[ThreadMessage]) -> String {
    messages
        .iter()
        .find(|m| m.role == Role::Assistant)
        .and_then(ThreadMessage::text)
        .filter(|text| !text.is_empty())
        .unwrap_or(NO_RESPONSE)
        .to_string()
}
