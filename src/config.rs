use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{GatewayError, Result};

/// Main configuration structure for the gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub agent: AgentConfig,
    pub polling: PollingConfig,
    pub retry: RetryConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_bytes: usize,
    /// Accepted file extension, without the leading dot
    pub allowed_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Project endpoint of the agent service
    pub endpoint: String,
    pub api_version: String,
    /// Bearer credential issued by the identity provider. It is read once at startup and
    /// never refreshed; Entra access tokens expire after about an hour, after which every
    /// upstream call fails with 401 until the gateway is restarted with a new token.
    pub api_token: String,
    /// Existing agent to use. When absent an agent is created at startup.
    pub agent_id: Option<String>,
    pub model_deployment: Option<String>,
    pub name: String,
    pub instructions: String,
    pub description: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub max_wait_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub policy: SessionPolicy,
    /// Policy override that did not name a known policy
    #[serde(skip)]
    pub unknown_policy: Option<String>,
}

/// What `/chat` does with a request that carries no thread id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// Start a new conversation seeded with the message.
    #[default]
    AutoCreate,
    /// Reject the request; a conversation must first be opened through `/upload`.
    RequireSession,
}

impl SessionPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "auto_create" | "auto" => Some(Self::AutoCreate),
            "require_session" | "require" => Some(Self::RequireSession),
            _ => None,
        }
    }
}

impl Config {
    /// Load configuration from `.env`, an optional YAML file and environment overrides.
    /// Missing required values are fatal.
    pub fn load() -> Result<Self> {
        let mut env_loaded = false;
        for path in [".env", "../.env"] {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }
        if !env_loaded {
            tracing::debug!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("GATEWAY_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        let mut config = Self::from_file_or_default(Path::new(&config_path));

        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML config file, falling back to defaults when it is missing or unreadable
    pub fn from_file_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("Config file not found at {} - using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to parse config file {}: {} - using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!(
                    "Failed to read config file {}: {} - using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Apply overrides from a key lookup, normally the process environment
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Server
        if let Some(bind) = lookup("GATEWAY_HTTP_BIND") {
            self.server.bind = bind;
        }

        // Upload
        if let Some(max) = lookup("GATEWAY_MAX_UPLOAD_BYTES").and_then(|v| v.parse().ok()) {
            self.upload.max_bytes = max;
        }

        // Agent service
        if let Some(endpoint) = lookup("PROJECT_ENDPOINT") {
            self.agent.endpoint = endpoint;
        }
        if let Some(version) = lookup("PROJECT_API_VERSION") {
            self.agent.api_version = version;
        }
        if let Some(token) = lookup("AZURE_AI_AGENTS_TOKEN") {
            self.agent.api_token = token;
        }
        if let Some(agent_id) = lookup("AGENT_ID").filter(|v| !v.trim().is_empty()) {
            self.agent.agent_id = Some(agent_id);
        }
        if let Some(model) = lookup("MODEL_DEPLOYMENT_NAME").filter(|v| !v.trim().is_empty()) {
            self.agent.model_deployment = Some(model);
        }

        // Polling
        if let Some(ms) = lookup("GATEWAY_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.polling.interval_ms = ms;
        }
        if let Some(secs) = lookup("GATEWAY_MAX_RUN_WAIT_SECS").and_then(|v| v.parse().ok()) {
            self.polling.max_wait_seconds = secs;
        }

        // Session policy
        if let Some(raw) = lookup("GATEWAY_SESSION_POLICY") {
            match SessionPolicy::parse(&raw) {
                Some(policy) => {
                    self.session.policy = policy;
                    self.session.unknown_policy = None;
                }
                None => self.session.unknown_policy = Some(raw),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let endpoint = self.agent.endpoint.trim();
        if endpoint.is_empty() {
            return Err(GatewayError::Config(
                "PROJECT_ENDPOINT missing in environment or config".into(),
            ));
        }
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(GatewayError::Config(format!(
                "PROJECT_ENDPOINT must be an http(s) URL, got '{endpoint}'"
            )));
        }
        if self.agent.api_token.trim().is_empty() {
            return Err(GatewayError::Config(
                "AZURE_AI_AGENTS_TOKEN must be set".into(),
            ));
        }
        if self.agent.agent_id.is_none() && self.agent.model_deployment.is_none() {
            return Err(GatewayError::Config(
                "Either AGENT_ID or MODEL_DEPLOYMENT_NAME must be set".into(),
            ));
        }

        if let Some(raw) = &self.session.unknown_policy {
            return Err(GatewayError::Config(format!(
                "Unknown GATEWAY_SESSION_POLICY '{raw}', expected auto_create or require_session"
            )));
        }

        if self.polling.interval_ms == 0 {
            return Err(GatewayError::Config("Poll interval cannot be 0".into()));
        }
        if self.polling.max_wait_seconds.saturating_mul(1000) < self.polling.interval_ms {
            return Err(GatewayError::Config(
                "Max run wait must be at least one poll interval".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(GatewayError::Config("Retry max_attempts cannot be 0".into()));
        }
        if self.upload.allowed_extension.trim_start_matches('.').is_empty() {
            return Err(GatewayError::Config(
                "Upload allowed_extension cannot be empty".into(),
            ));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.interval_ms)
    }

    pub fn max_run_wait(&self) -> Duration {
        Duration::from_secs(self.polling.max_wait_seconds)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024,
            allowed_extension: "txt".to_string(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_version: "2025-05-01".to_string(),
            api_token: String::new(),
            agent_id: None,
            model_deployment: None,
            name: "company-info-web-agent".to_string(),
            instructions: "You are an expert assistant that provides company information. \
                Answer user queries about the company's details, mission, vision, values, \
                contact info, and legal policies. When the user has uploaded a document, \
                answer from its content. Always provide accurate, clear, and professional \
                responses."
                .to_string(),
            description: "Web-based company info assistant".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_wait_seconds: 120,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}
