use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Returned when a run finishes without an assistant reply
pub const NO_RESPONSE: &str = "No response from agent.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message to post into a thread
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Uploaded document used to seed a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentContext {
    pub filename: String,
    pub content: String,
}

impl DocumentContext {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// First user turn of a document-grounded conversation
    pub fn framing_prompt(&self) -> String {
        format!(
            "I have uploaded a document called '{}'. Here is its content:\n\n{}\n\n\
             Please answer my questions based on the information provided in this document.",
            self.filename, self.content
        )
    }
}

// ---------------------------------------------------------------------------
// Agent service wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Body for creating an agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentDefinition {
    pub model: String,
    pub name: String,
    pub instructions: String,
    pub description: String,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

impl ThreadMessage {
    /// First text part of the message, if any
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|part| match part {
            MessageContent::Text { text } => Some(text.value.as_str()),
            MessageContent::Other => None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub value: String,
}

/// Paged list envelope used by the agent service
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Statuses that keep the poll loop going
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Queued | Self::InProgress | Self::RequiresAction)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
}

impl Run {
    pub fn failure_detail(&self) -> String {
        self.last_error
            .as_ref()
            .map(RunError::to_string)
            .unwrap_or_else(|| "no error detail reported".to_string())
    }

    /// Tool calls the service is waiting on, if the run is paused for them
    pub fn pending_tool_calls(&self) -> Option<&[ToolCall]> {
        if self.status != RunStatus::RequiresAction {
            return None;
        }
        self.required_action
            .as_ref()
            .and_then(|action| action.submit_tool_outputs.as_ref())
            .map(|outputs| outputs.tool_calls.as_slice())
            .filter(|calls| !calls.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub submit_tool_outputs: Option<SubmitToolOutputs>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitToolOutputs {
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// Result of driving one conversation turn to a terminal run status
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Succeeded(String),
    Failed(String),
}

/// Answer to a chat turn together with the thread it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub thread_id: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_with_required_action_deserializes() {
        let run: Run = serde_json::from_value(json!({
            "id": "run_1",
            "object": "thread.run",
            "thread_id": "thread_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_company_details", "arguments": "{}"}
                    }]
                }
            },
            "last_error": null
        }))
        .expect("run should deserialize");

        assert!(run.status.is_pending());
        let calls = run.pending_tool_calls().expect("tool calls");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "get_company_details");
    }

    #[test]
    fn test_failed_run_detail() {
        let run: Run = serde_json::from_value(json!({
            "id": "run_1",
            "thread_id": "thread_1",
            "status": "failed",
            "last_error": {"code": "server_error", "message": "Sorry, something went wrong."}
        }))
        .expect("run should deserialize");

        assert!(!run.status.is_pending());
        assert_eq!(run.failure_detail(), "server_error: Sorry, something went wrong.");
        assert!(run.pending_tool_calls().is_none());
    }

    #[test]
    fn test_unknown_status_is_terminal() {
        let run: Run = serde_json::from_value(json!({
            "id": "run_1",
            "thread_id": "thread_1",
            "status": "paused_for_review"
        }))
        .expect("run should deserialize");
        assert_eq!(run.status, RunStatus::Unknown);
        assert!(!run.status.is_pending());
    }

    #[test]
    fn test_message_text_skips_non_text_parts() {
        let msg: ThreadMessage = serde_json::from_value(json!({
            "id": "msg_1",
            "role": "assistant",
            "created_at": 1_700_000_000,
            "content": [
                {"type": "image_file", "image_file": {"file_id": "file_1"}},
                {"type": "text", "text": {"value": "Revenue grew.", "annotations": []}}
            ]
        }))
        .expect("message should deserialize");
        assert_eq!(msg.text(), Some("Revenue grew."));
    }

    #[test]
    fn test_framing_prompt_embeds_document() {
        let doc = DocumentContext::new("report.txt", "Quarterly revenue grew 12%.");
        let prompt = doc.framing_prompt();
        assert!(prompt.starts_with("I have uploaded a document called 'report.txt'"));
        assert!(prompt.contains("Quarterly revenue grew 12%."));
        assert!(prompt.ends_with("based on the information provided in this document."));
    }
}
