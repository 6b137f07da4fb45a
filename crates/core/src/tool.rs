//! Tool trait — the abstraction over copilot capabilities.
//!
//! Tools are what let the copilot act inside the console: navigate to a
//! page, query the device directory, aggregate fleet statistics.
//!
//! Execution never fails past the registry boundary. Unknown tools, schema
//! mismatches, tool errors and timeouts all come back as a normal
//! [`ToolOutcome`] with `success: false`, which the agent loop folds into the
//! transcript like any other result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::schema::validate_args;

/// Default per-execution timeout applied by the registry.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(15);

/// A request to execute a tool, as parsed from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to execute
    #[serde(rename = "tool")]
    pub name: String,

    /// Arguments as a JSON value
    #[serde(default = "empty_args")]
    pub args: serde_json::Value,
}

fn empty_args() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// The result of a tool execution: `{success, data?, message?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Whether the tool executed successfully
    pub success: bool,

    /// Optional structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Optional human-readable message (always set on failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToolOutcome {
    /// A successful outcome carrying `data`.
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// A successful outcome carrying `data` and a message.
    pub fn ok_with_message(data: serde_json::Value, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }

    /// A failed outcome with a descriptive message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }

    /// Compact JSON rendering used in transcripts and prompts.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"success":{},"message":"unserializable outcome"}}"#, self.success)
        })
    }
}

impl From<ToolError> for ToolOutcome {
    fn from(err: ToolError) -> Self {
        Self::failure(err.to_string())
    }
}

/// The core Tool trait.
///
/// Each console capability implements this trait and is registered in the
/// [`ToolRegistry`]. Implementations should still check their own required
/// arguments and return [`ToolError::InvalidArguments`] instead of panicking.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "navigate_to").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: serde_json::Value) -> std::result::Result<ToolOutcome, ToolError>;

    /// Render this tool's catalogue entry for the prompt.
    fn describe(&self) -> String {
        format!(
            "## Tool: {}\nDescription: {}\nParameters: {}",
            self.name(),
            self.description(),
            self.parameters_schema()
        )
    }
}

/// An insertion-ordered registry of available tools.
///
/// The agent loop uses this to:
/// 1. Render the tool catalogue into the prompt
/// 2. Check whether a parsed tool call names a registered tool
/// 3. Execute that call with validation and a timeout
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Set the per-execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool under its own name.
    ///
    /// Re-registering a name replaces the tool in place, keeping its
    /// position in the catalogue.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&pos) => self.tools[pos] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&pos| self.tools[pos].as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// List all registered tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render every tool's catalogue entry, joined by blank lines, in
    /// registration order.
    pub fn describe_all(&self) -> String {
        self.tools
            .iter()
            .map(|t| t.describe())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Execute a tool call. Never fails: every error becomes a failed outcome.
    pub async fn execute(&self, call: &ToolCall) -> ToolOutcome {
        let Some(tool) = self.get(&call.name) else {
            warn!(tool = %call.name, "Requested tool is not registered");
            return ToolError::NotFound(call.name.clone()).into();
        };

        if let Err(reason) = validate_args(&tool.parameters_schema(), &call.args) {
            debug!(tool = %call.name, %reason, "Tool arguments rejected by schema");
            return ToolError::InvalidArguments(reason).into();
        }

        let start = Instant::now();
        let outcome = match tokio::time::timeout(self.timeout, tool.execute(call.args.clone())).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                e.into()
            }
            Err(_) => {
                warn!(tool = %call.name, timeout_secs = self.timeout.as_secs(), "Tool execution timed out");
                ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_secs: self.timeout.as_secs(),
                }
                .into()
            }
        };

        debug!(
            tool = %call.name,
            success = outcome.success,
            duration_ms = start.elapsed().as_millis() as u64,
            "Tool executed"
        );
        outcome
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, args: serde_json::Value) -> std::result::Result<ToolOutcome, ToolError> {
            Ok(ToolOutcome::ok(serde_json::json!({ "input": args })))
        }
    }

    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str { "broken" }
        fn description(&self) -> &str { "Always fails" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object", "properties": {} })
        }
        async fn execute(&self, _args: serde_json::Value) -> std::result::Result<ToolOutcome, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "broken".into(),
                reason: "backend unreachable".into(),
            })
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str { "slow" }
        fn description(&self) -> &str { "Never finishes in time" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }
        async fn execute(&self, _args: serde_json::Value) -> std::result::Result<ToolOutcome, ToolError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ToolOutcome::ok(serde_json::Value::Null))
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.contains("echo"));
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn describe_all_follows_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(BrokenTool));

        let catalogue = registry.describe_all();
        assert!(catalogue.starts_with("## Tool: echo\nDescription: Echoes back the input\nParameters: {"));
        assert!(catalogue.contains("\n\n## Tool: broken\nDescription: Always fails\nParameters: "));
        assert!(catalogue.find("echo").unwrap() < catalogue.find("broken").unwrap());
    }

    #[test]
    fn reregistering_keeps_position() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(BrokenTool));
        registry.register(Box::new(EchoTool));
        assert_eq!(registry.names(), vec!["echo", "broken"]);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let call = ToolCall::new("echo", serde_json::json!({"text": "hello world"}));
        let outcome = registry.execute(&call).await;
        assert!(outcome.success);
        assert_eq!(outcome.data.unwrap()["input"]["text"], "hello world");
    }

    #[tokio::test]
    async fn missing_tool_is_a_failed_outcome() {
        let registry = ToolRegistry::new();
        let outcome = registry.execute(&ToolCall::new("nonexistent", serde_json::json!({}))).await;
        assert!(!outcome.success);
        assert!(outcome.message.unwrap().contains("nonexistent"));
    }

    #[tokio::test]
    async fn schema_mismatch_is_a_failed_outcome() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let outcome = registry.execute(&ToolCall::new("echo", serde_json::json!({}))).await;
        assert!(!outcome.success);
        assert!(outcome.message.unwrap().contains("missing required argument 'text'"));
    }

    #[tokio::test]
    async fn tool_error_is_a_failed_outcome() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(BrokenTool));
        let outcome = registry.execute(&ToolCall::new("broken", serde_json::json!({}))).await;
        assert!(!outcome.success);
        assert!(outcome.message.unwrap().contains("backend unreachable"));
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        tokio::time::pause();
        let mut registry = ToolRegistry::new().with_timeout(Duration::from_secs(2));
        registry.register(Box::new(SlowTool));
        let outcome = registry.execute(&ToolCall::new("slow", serde_json::json!({}))).await;
        assert!(!outcome.success);
        assert!(outcome.message.unwrap().contains("timed out"));
    }

    #[test]
    fn tool_call_parses_wire_format() {
        let call: ToolCall =
            serde_json::from_str(r#"{"tool":"navigate_to","args":{"path":"/devices"}}"#).unwrap();
        assert_eq!(call.name, "navigate_to");
        assert_eq!(call.args["path"], "/devices");

        let bare: ToolCall = serde_json::from_str(r#"{"tool":"fleet_statistics"}"#).unwrap();
        assert!(bare.args.as_object().unwrap().is_empty());
    }

    #[test]
    fn outcome_serialization_skips_empty_fields() {
        let json = ToolOutcome::failure("nope").to_json_string();
        assert_eq!(json, r#"{"success":false,"message":"nope"}"#);
    }
}
