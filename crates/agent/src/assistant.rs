//! Recursive `ask` variant.
//!
//! Same plan → act → observe cycle as [`AgentLoop`], expressed as recursion:
//! after a tool runs, `ask` calls itself with the tool's outcome instead of
//! a new user message. Each level gathers fresh context (with the outcome
//! in `toolExecutionResult`), builds a full prompt, and streams into its own
//! assistant message. Recursion is capped at `max_depth` tool executions.

use futures::FutureExt;
use futures::future::BoxFuture;
use fleetpilot_config::AppConfig;
use fleetpilot_core::message::{Message, Transcript};
use fleetpilot_core::tool::ToolOutcome;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use crate::loop_runner::{AgentLoop, TurnState, folded_result};
use crate::parser::extract_tool_call;
use crate::prompt::PromptTail;
use crate::turn::{TurnError, TurnOutcome, TurnReport};

/// Default recursion cap.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Clears the streaming flag when the turn ends, even if the future is dropped.
struct StreamingFlag<'a>(&'a AtomicBool);

impl<'a> StreamingFlag<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for StreamingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Assistant {
    agent: AgentLoop,
    max_depth: usize,
    streaming: AtomicBool,
}

impl Assistant {
    pub fn new(agent: AgentLoop) -> Self {
        Self {
            agent,
            max_depth: DEFAULT_MAX_DEPTH,
            streaming: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &AppConfig, agent: AgentLoop) -> Self {
        Self::new(agent).with_max_depth(config.agent.max_ask_depth)
    }

    /// Cap the number of tool executions (recursion levels) per turn.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Whether a turn is currently streaming.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Run one user turn. Fails only with [`TurnError::Busy`] when another
    /// `ask` is still in flight on this assistant.
    pub async fn ask(
        &self,
        transcript: &mut Transcript,
        input: &str,
    ) -> Result<TurnReport, TurnError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(TurnReport::ignored());
        }
        let Some(_flag) = StreamingFlag::acquire(&self.streaming) else {
            return Err(TurnError::Busy);
        };

        self.agent.begin_turn(transcript, input);

        let mut state = TurnState::default();
        let report = match self.ask_level(transcript, None, 0, &mut state).await {
            Ok(outcome) => TurnReport {
                outcome,
                iterations: state.iterations,
                reply_id: state.reply_id,
                error: None,
            },
            Err(e) => {
                self.agent.fail_turn(transcript, &mut state, &e);
                TurnReport {
                    outcome: TurnOutcome::Failed,
                    iterations: state.iterations,
                    reply_id: state.reply_id,
                    error: Some(e.to_string()),
                }
            }
        };

        self.agent.finish_turn(&report);
        Ok(report)
    }

    fn ask_level<'a>(
        &'a self,
        transcript: &'a mut Transcript,
        carried: Option<(String, ToolOutcome)>,
        depth: usize,
        state: &'a mut TurnState,
    ) -> BoxFuture<'a, Result<TurnOutcome, TurnError>> {
        async move {
            let mut context = self.agent.context_provider().global_context().await;
            let catalogue = self.agent.tools().describe_all();

            let tail = match &carried {
                None => PromptTail::LatestUserMessage,
                Some((tool, outcome)) => {
                    context.tool_execution_result = Some(folded_result(outcome));
                    PromptTail::ToolResult { tool, outcome }
                }
            };
            let prompt = self.agent.prompts().build(transcript, &context, &catalogue, tail);
            debug!(depth, prompt_chars = prompt.len(), "Recursive ask level");

            let reply_id = transcript.push(Message::assistant(""));
            state.reply_id = Some(reply_id);
            let text = self
                .agent
                .stream_reply(transcript, reply_id, prompt, &context)
                .await?;

            let Some(call) = extract_tool_call(&text) else {
                return Ok(TurnOutcome::Answered);
            };
            if !self.agent.tools().contains(&call.name) {
                warn!(tool = %call.name, "Model requested an unregistered tool; treating reply as the answer");
                return Ok(TurnOutcome::Answered);
            }

            let outcome = self.agent.execute_tool(transcript, &call).await;
            state.iterations += 1;

            if depth + 1 >= self.max_depth {
                self.agent.apply_ceiling(transcript, state.iterations);
                return Ok(TurnOutcome::CeilingReached);
            }

            self.ask_level(transcript, Some((call.name, outcome)), depth + 1, state)
                .await
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{EchoTool, Script, ScriptedProvider, test_context};
    use fleetpilot_core::context::ConsoleShell;
    use fleetpilot_core::error::ProviderError;
    use fleetpilot_core::event::EventBus;
    use fleetpilot_core::message::Role;
    use fleetpilot_core::tool::ToolRegistry;
    use std::sync::Arc;

    fn assistant(provider: Arc<ScriptedProvider>) -> Assistant {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let shell = ConsoleShell::default();
        let agent = AgentLoop::new(
            provider,
            "mock-model",
            Arc::new(registry),
            test_context(&shell),
            Arc::new(EventBus::default()),
        );
        Assistant::new(agent)
    }

    #[tokio::test]
    async fn recursion_carries_tool_result_into_context() {
        let provider = Arc::new(ScriptedProvider::replies([
            r#"{"tool":"echo","args":{"x":1}}"#,
            "x was 1",
        ]));
        let assistant = assistant(provider.clone());
        let mut transcript = Transcript::default();

        let report = assistant.ask(&mut transcript, "echo please").await.unwrap();

        assert_eq!(report.outcome, TurnOutcome::Answered);
        assert_eq!(report.iterations, 1);
        assert!(!assistant.is_streaming());

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].context["toolExecutionResult"]["input"]["x"], 1);
        assert!(requests[1].prompt.contains("## Tool Result"));
        assert!(requests[1].prompt.contains("## Current Context"));

        // greeting, user, tool-call reply, system, final reply
        let roles: Vec<Role> = transcript.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::Assistant, Role::User, Role::Assistant, Role::System, Role::Assistant]
        );
        assert_eq!(transcript.count_role(Role::User), 1);
    }

    #[tokio::test]
    async fn recursion_depth_is_capped() {
        let provider = Arc::new(ScriptedProvider::always(r#"{"tool":"echo","args":{}}"#));
        let assistant = assistant(provider.clone()).with_max_depth(3);
        let mut transcript = Transcript::default();

        let report = assistant.ask(&mut transcript, "loop").await.unwrap();

        assert_eq!(report.outcome, TurnOutcome::CeilingReached);
        assert_eq!(report.iterations, 3);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn overlapping_ask_is_rejected() {
        let provider = Arc::new(ScriptedProvider::replies(["hi"]));
        let assistant = assistant(provider);
        let _held = StreamingFlag::acquire(&assistant.streaming).unwrap();

        let mut transcript = Transcript::default();
        let err = assistant.ask(&mut transcript, "hello").await.unwrap_err();

        assert!(matches!(err, TurnError::Busy));
        assert_eq!(transcript.len(), 1);
    }

    #[tokio::test]
    async fn failure_releases_streaming_flag() {
        let provider = Arc::new(ScriptedProvider::new(vec![Script::Fail(
            ProviderError::AuthenticationFailed("bad key".into()),
        )]));
        let assistant = assistant(provider);
        let mut transcript = Transcript::default();

        let report = assistant.ask(&mut transcript, "hello").await.unwrap();

        assert_eq!(report.outcome, TurnOutcome::Failed);
        assert!(!assistant.is_streaming());
        assert_eq!(transcript.count_role(Role::Assistant), 2);
    }
}
