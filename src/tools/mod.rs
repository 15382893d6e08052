/// Functions the agent can call during a run
pub mod company;

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde_json::{Value, json};

use crate::error::Result;
use crate::models::{FunctionDefinition, ToolCall, ToolDefinition, ToolOutput};

/// A tool implementation: parsed JSON arguments in, JSON result out
pub type ToolFn = fn(Value) -> Result<Value>;

struct RegisteredTool {
    definition: FunctionDefinition,
    handler: ToolFn,
}

/// Maps tool names to their schema and implementation.
///
/// The registry is handed to the agent service at agent creation (as tool definitions) and
/// to the transport, which resolves pending tool calls while a run is in progress.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in company information tool
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register::<company::CompanyDetailsParams>(
            company::TOOL_NAME,
            company::TOOL_DESCRIPTION,
            company::get_company_details,
        );
        registry
    }

    /// Register `handler` under `name`, deriving the parameter schema from `P`
    pub fn register<P: JsonSchema>(&mut self, name: &str, description: &str, handler: ToolFn) {
        let mut parameters = Value::from(schemars::schema_for!(P));
        if let Some(obj) = parameters.as_object_mut() {
            obj.remove("$schema");
            obj.remove("title");
        }
        let definition = FunctionDefinition {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        };
        if self
            .tools
            .insert(name.to_string(), RegisteredTool { definition, handler })
            .is_some()
        {
            tracing::warn!("Tool '{}' registered twice, keeping the latest", name);
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| ToolDefinition {
                kind: "function".to_string(),
                function: tool.definition.clone(),
            })
            .collect()
    }

    /// Run a tool and render its output as a JSON string.
    /// Failures become an `{"error": ...}` payload so the agent can react to them.
    pub fn invoke(&self, name: &str, arguments: &str) -> String {
        let Some(tool) = self.tools.get(name) else {
            tracing::warn!("Agent requested unknown tool '{}'", name);
            return json!({ "error": format!("unknown tool '{name}'") }).to_string();
        };

        let args = if arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(arguments) {
                Ok(args) => args,
                Err(e) => {
                    return json!({ "error": format!("invalid arguments for '{name}': {e}") })
                        .to_string();
                }
            }
        };

        match (tool.handler)(args) {
            Ok(value) => value.to_string(),
            Err(e) => {
                tracing::warn!("Tool '{}' failed: {}", name, e);
                json!({ "error": e.to_string() }).to_string()
            }
        }
    }

    pub fn resolve(&self, calls: &[ToolCall]) -> Vec<ToolOutput> {
        calls
            .iter()
            .map(|call| ToolOutput {
                tool_call_id: call.id.clone(),
                output: self.invoke(&call.function.name, &call.function.arguments),
            })
            .collect()
    }
}
