use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;

#[cfg(test)]
use mockall::automock;

use crate::config::AgentConfig;
use crate::error::{GatewayError, Result};
use crate::models::{
    Agent, AgentDefinition, ListResponse, NewMessage, Run, Thread, ThreadMessage,
};
use crate::retry::RetryPolicy;
use crate::tools::ToolRegistry;

/// How many messages to read back when looking for the latest reply
const MESSAGE_PAGE_SIZE: &str = "20";

/// Request/response contract with the hosted agent service
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AgentTransport: Send + Sync + 'static {
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<Agent>;
    async fn get_agent(&self, agent_id: &str) -> Result<Agent>;
    /// Create a thread, optionally seeded with a first message
    async fn create_thread(&self, seed: Option<NewMessage>) -> Result<Thread>;
    async fn get_thread(&self, thread_id: &str) -> Result<Thread>;
    async fn create_message(&self, thread_id: &str, message: NewMessage) -> Result<ThreadMessage>;
    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run>;
    /// Fetch a run. Pending tool calls are resolved before the run is returned.
    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;
    /// Messages of a thread, newest first
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>>;
}

/// Agent service client for Azure AI Foundry project endpoints
pub struct FoundryTransport {
    client: Client,
    endpoint: Url,
    api_version: String,
    api_token: String,
    retry: RetryPolicy,
    tools: Arc<ToolRegistry>,
}

impl FoundryTransport {
    pub fn new(cfg: &AgentConfig, retry: RetryPolicy, tools: Arc<ToolRegistry>) -> Result<Self> {
        let endpoint = Url::parse(cfg.endpoint.trim()).map_err(|e| {
            GatewayError::Config(format!("Invalid PROJECT_ENDPOINT '{}': {e}", cfg.endpoint))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(GatewayError::Config(format!(
                "PROJECT_ENDPOINT '{}' cannot be used as a base URL",
                cfg.endpoint
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_seconds))
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_version: cfg.api_version.clone(),
            api_token: cfg.api_token.clone(),
            retry,
            tools,
        })
    }

    /// Endpoint joined with percent-encoded path segments
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Internal("Endpoint cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<T> {
        RetryIf::spawn(
            self.retry.strategy(),
            || self.send(Method::GET, segments, query, None),
            |e: &GatewayError| {
                let retry = e.is_transient();
                if retry {
                    tracing::warn!("Retrying GET /{}: {}", segments.join("/"), e);
                }
                retry
            },
        )
        .await
    }

    /// POSTs are only retried when throttled, the service has not acted on them
    async fn post<T: DeserializeOwned>(&self, segments: &[&str], body: Value) -> Result<T> {
        RetryIf::spawn(
            self.retry.strategy(),
            || self.send(Method::POST, segments, &[], Some(&body)),
            |e: &GatewayError| {
                let retry = e.is_throttled();
                if retry {
                    tracing::warn!("Throttled on POST /{}, retrying", segments.join("/"));
                }
                retry
            },
        )
        .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<T> {
        let path = segments.join("/");
        let mut request = self
            .client
            .request(method.clone(), self.url(segments)?)
            .bearer_auth(&self.api_token)
            .query(&[("api-version", self.api_version.as_str())])
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            if status == StatusCode::UNAUTHORIZED {
                tracing::error!(
                    "Agent service rejected the credential; AZURE_AI_AGENTS_TOKEN may have expired"
                );
                return Err(GatewayError::Upstream {
                    status: Some(status.as_u16()),
                    message: format!(
                        "{method} /{path} returned {status}: credential rejected, \
                         refresh AZURE_AI_AGENTS_TOKEN: {text}"
                    ),
                });
            }
            return Err(GatewayError::Upstream {
                status: Some(status.as_u16()),
                message: format!("{method} /{path} returned {status}: {text}"),
            });
        }

        response.json().await.map_err(|e| GatewayError::Upstream {
            status: Some(status.as_u16()),
            message: format!("Failed to decode response of {method} /{path}: {e}"),
        })
    }

    /// Execute the tool calls a paused run is waiting on and hand the outputs back
    async fn submit_pending_tool_outputs(&self, thread_id: &str, run: Run) -> Result<Run> {
        let Some(calls) = run.pending_tool_calls() else {
            return Ok(run);
        };

        let outputs = self.tools.resolve(calls);
        tracing::info!(
            thread_id = %thread_id,
            run_id = %run.id,
            count = outputs.len(),
            "Submitting tool outputs"
        );
        self.post(
            &["threads", thread_id, "runs", run.id.as_str(), "submit_tool_outputs"],
            json!({ "tool_outputs": outputs }),
        )
        .await
    }
}

#[async_trait]
impl AgentTransport for FoundryTransport {
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<Agent> {
        self.post(&["assistants"], serde_json::to_value(definition)?).await
    }

    async fn get_agent(&self, agent_id: &str) -> Result<Agent> {
        self.get(&["assistants", agent_id], &[]).await
    }

    async fn create_thread(&self, seed: Option<NewMessage>) -> Result<Thread> {
        let body = match seed {
            Some(message) => json!({ "messages": [message] }),
            None => json!({}),
        };
        self.post(&["threads"], body).await
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread> {
        self.get(&["threads", thread_id], &[]).await
    }

    async fn create_message(&self, thread_id: &str, message: NewMessage) -> Result<ThreadMessage> {
        self.post(&["threads", thread_id, "messages"], serde_json::to_value(message)?)
            .await
    }

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run> {
        self.post(
            &["threads", thread_id, "runs"],
            json!({ "assistant_id": agent_id }),
        )
        .await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let run: Run = self.get(&["threads", thread_id, "runs", run_id], &[]).await?;
        self.submit_pending_tool_outputs(thread_id, run).await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        let page: ListResponse<ThreadMessage> = self
            .get(
                &["threads", thread_id, "messages"],
                &[("order", "desc"), ("limit", MESSAGE_PAGE_SIZE)],
            )
            .await?;
        Ok(page.data)
    }
}
