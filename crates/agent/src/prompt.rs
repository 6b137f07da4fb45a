//! Prompt construction.
//!
//! Prompts are plain text and fully deterministic: the same transcript,
//! context and catalogue always give byte-identical output. The context is
//! pretty-printed with `serde_json`, whose maps are key-sorted.

use fleetpilot_core::context::AgentContext;
use fleetpilot_core::message::{Role, Transcript};
use fleetpilot_core::tool::ToolOutcome;

/// Default copilot persona.
pub const DEFAULT_PERSONA: &str = "You are FleetPilot, the copilot built into an IoT fleet management console. \
You help operators inspect devices, firmware, OTA campaigns, scenes, automations and alerts, \
and you can act on the console through the tools listed below. \
Be concise and never invent device data you have not been given.";

/// The reply protocol the model must follow.
pub const TOOL_PROTOCOL: &str = "Respond in exactly one of two ways:\n\
1. To use a tool, reply with a single line of JSON and nothing else:\n\
{\"tool\": \"<tool name>\", \"args\": {<arguments>}}\n\
2. Otherwise, reply with your final answer to the operator in natural language.\n\
Only call tools listed above, and only one tool per reply.";

/// What closes the prompt.
#[derive(Debug, Clone, Copy)]
pub enum PromptTail<'a> {
    /// The most recent user message in the transcript
    LatestUserMessage,
    /// A note describing the tool that just ran
    ToolResult {
        tool: &'a str,
        outcome: &'a ToolOutcome,
    },
}

/// Builds the text prompts sent to the provider.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
        }
    }

    /// Replace the persona preamble.
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    /// Full prompt: persona, context, tool catalogue, protocol, then `tail`.
    pub fn build(
        &self,
        transcript: &Transcript,
        context: &AgentContext,
        catalogue: &str,
        tail: PromptTail<'_>,
    ) -> String {
        let tools = if catalogue.trim().is_empty() {
            "No tools are available."
        } else {
            catalogue
        };

        let closing = match tail {
            PromptTail::LatestUserMessage => {
                let request = transcript
                    .last_by_role(Role::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                format!("## Operator Request\n{request}")
            }
            PromptTail::ToolResult { tool, outcome } => format!(
                "## Tool Result\n[system] Tool `{tool}` was executed. Result: {}\n\
                 Use this result to continue helping the operator.",
                outcome.to_json_string()
            ),
        };

        format!(
            "{persona}\n\n\
             ## Current Context\n```json\n{context}\n```\n\n\
             ## Available Tools\n{tools}\n\n\
             ## Response Protocol\n{protocol}\n\n\
             {closing}",
            persona = self.persona,
            context = context.to_pretty_json(),
            protocol = TOOL_PROTOCOL,
        )
    }

    /// Compact follow-up sent after a tool ran inside the same turn.
    pub fn follow_up(&self, request: &str, tool: &str, outcome: &ToolOutcome) -> String {
        format!(
            "Tool `{tool}` executed, result = {}\n\
             Operator request: {request}\n\
             If more work is needed reply with one single-line tool call, \
             otherwise give the final answer.",
            outcome.to_json_string()
        )
    }
}
