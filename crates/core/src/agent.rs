//! Agent phase and status types.

use serde::{Deserialize, Serialize};

/// Where a turn currently is in the plan → act → observe cycle.
///
/// `Idle → Thinking → Replying → Executing → (Replying | Idle | Error)`;
/// every turn ends back in `Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    /// No turn in flight
    #[default]
    Idle,
    /// Gathering context and building the prompt
    Thinking,
    /// Streaming the model's reply
    Replying,
    /// Running a tool the model asked for
    Executing,
    /// The turn failed; the apology message has been appended
    Error,
}

impl std::fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Thinking => "thinking",
            Self::Replying => "replying",
            Self::Executing => "executing",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Observable runtime status of an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    /// Current phase
    pub phase: AgentPhase,

    /// Tool being executed, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_tool: Option<String>,
}

impl AgentStatus {
    pub fn is_busy(&self) -> bool {
        self.phase != AgentPhase::Idle
    }
}
