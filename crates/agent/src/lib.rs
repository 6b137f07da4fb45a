//! The copilot agent — the heart of FleetPilot.
//!
//! The agent follows a **Plan → Act → Observe** cycle:
//!
//! 1. **Receive** an operator message from the console chat panel
//! 2. **Build context** (identity, environment, current page snapshot)
//! 3. **Stream** a reply from the configured provider
//! 4. **If the reply is a tool call**: execute it, record the result, re-prompt
//! 5. **Otherwise**: the streamed text is the answer
//!
//! The loop ends on a plain answer or after `max_loops` tool executions.
//! [`AgentLoop`] runs it iteratively; [`Assistant`] runs the same cycle by
//! recursion. [`ConsoleSession`] owns a transcript and refuses overlapping
//! turns.

pub mod assistant;
pub mod loop_runner;
pub mod parser;
pub mod prompt;
pub mod session;
pub mod turn;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use assistant::Assistant;
pub use loop_runner::AgentLoop;
pub use parser::extract_tool_call;
pub use prompt::{PromptBuilder, PromptTail};
pub use session::{ConsoleSession, TurnDriver};
pub use turn::{CeilingPolicy, TurnError, TurnOutcome, TurnReport};
