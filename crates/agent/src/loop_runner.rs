//! The iterative agent loop.
//!
//! One turn runs `prompt → stream → parse → execute → re-prompt` until the
//! model answers without a tool call or `max_loops` tools have run:
//!
//! 1. Append the user message and gather context once
//! 2. Stream the reply into a single assistant message
//! 3. If the reply holds a call to a registered tool, run it, record a
//!    `system` message with the raw outcome, fold the outcome into the
//!    context, and loop with a compact follow-up prompt
//! 4. Otherwise the streamed text is the answer
//!
//! Nothing escapes a turn: provider failures and timeouts become the
//! apology message, and the phase always returns to `Idle`.

use chrono::Utc;
use fleetpilot_config::AppConfig;
use fleetpilot_core::agent::{AgentPhase, AgentStatus};
use fleetpilot_core::context::{AgentContext, ContextProvider};
use fleetpilot_core::error::ProviderError;
use fleetpilot_core::event::{DomainEvent, EventBus};
use fleetpilot_core::message::{Message, MessageId, Transcript};
use fleetpilot_core::provider::{Provider, ProviderRequest};
use fleetpilot_core::tool::{ToolCall, ToolOutcome, ToolRegistry};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::parser::extract_tool_call;
use crate::prompt::{PromptBuilder, PromptTail};
use crate::turn::{
    APOLOGY_MESSAGE, CEILING_MESSAGE, CeilingPolicy, TurnError, TurnOutcome, TurnReport,
};

/// Default tool-iteration ceiling per turn.
pub const DEFAULT_MAX_LOOPS: usize = 5;

/// Default deadline for draining one model stream.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(60);

const PREVIEW_CHARS: usize = 80;

/// Mutable bookkeeping for the turn in flight.
#[derive(Debug, Default)]
pub(crate) struct TurnState {
    pub(crate) reply_id: Option<MessageId>,
    pub(crate) iterations: usize,
}

impl TurnState {
    fn report(&self, outcome: TurnOutcome, error: Option<String>) -> TurnReport {
        TurnReport {
            outcome,
            iterations: self.iterations,
            reply_id: self.reply_id,
            error,
        }
    }
}

/// The core agent loop that orchestrates streaming replies and tool execution.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per response
    max_tokens: Option<u32>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Context assembly
    context: Arc<ContextProvider>,

    prompts: PromptBuilder,

    /// Maximum tool executions per turn
    max_loops: usize,

    /// Deadline for one stream, from request to last fragment
    stream_timeout: Duration,

    ceiling: CeilingPolicy,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,

    status: watch::Sender<AgentStatus>,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        context: Arc<ContextProvider>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let (status, _) = watch::channel(AgentStatus::default());
        Self {
            provider,
            model: model.into(),
            temperature: 0.3,
            max_tokens: None,
            tools,
            context,
            prompts: PromptBuilder::new(),
            max_loops: DEFAULT_MAX_LOOPS,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            ceiling: CeilingPolicy::default(),
            event_bus,
            status,
        }
    }

    /// Create an agent loop with model and loop settings taken from `config`.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        context: Arc<ContextProvider>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self::new(provider, &config.default_model, tools, context, event_bus)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_max_loops(config.agent.max_loops)
            .with_stream_timeout(config.agent.stream_timeout())
            .with_ceiling_policy(CeilingPolicy::from_flag(config.agent.announce_loop_ceiling))
    }

    /// Set the maximum number of tool executions per turn (at least one).
    pub fn with_max_loops(mut self, max: usize) -> Self {
        self.max_loops = max.max(1);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    pub fn with_ceiling_policy(mut self, policy: CeilingPolicy) -> Self {
        self.ceiling = policy;
        self
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    /// Watch the phase and current tool.
    pub fn status(&self) -> watch::Receiver<AgentStatus> {
        self.status.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn max_loops(&self) -> usize {
        self.max_loops
    }

    pub(crate) fn context_provider(&self) -> &ContextProvider {
        &self.context
    }

    pub(crate) fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    /// Run one user turn against `transcript`.
    ///
    /// Whitespace-only input is ignored. Every other input appends exactly
    /// one user message and leaves at least one assistant message behind.
    pub async fn run_turn(&self, transcript: &mut Transcript, input: &str) -> TurnReport {
        let input = input.trim();
        if input.is_empty() {
            debug!("Ignoring empty input");
            return TurnReport::ignored();
        }

        self.begin_turn(transcript, input);

        let mut state = TurnState::default();
        let report = match self.drive(transcript, input, &mut state).await {
            Ok(outcome) => state.report(outcome, None),
            Err(e) => {
                self.fail_turn(transcript, &mut state, &e);
                state.report(TurnOutcome::Failed, Some(e.to_string()))
            }
        };

        self.finish_turn(&report);
        report
    }

    async fn drive(
        &self,
        transcript: &mut Transcript,
        input: &str,
        state: &mut TurnState,
    ) -> Result<TurnOutcome, TurnError> {
        let mut context = self.context.global_context().await;
        let catalogue = self.tools.describe_all();
        let mut last_tool: Option<(String, ToolOutcome)> = None;

        while state.iterations < self.max_loops {
            let prompt = match &last_tool {
                None => self.prompts.build(
                    transcript,
                    &context,
                    &catalogue,
                    PromptTail::LatestUserMessage,
                ),
                Some((tool, outcome)) => self.prompts.follow_up(input, tool, outcome),
            };

            debug!(
                iteration = state.iterations,
                prompt_chars = prompt.len(),
                "Agent loop iteration"
            );

            let reply_id = self.prepare_reply(transcript, state);
            let text = self
                .stream_reply(transcript, reply_id, prompt, &context)
                .await?;

            let Some(call) = extract_tool_call(&text) else {
                return Ok(TurnOutcome::Answered);
            };
            if !self.tools.contains(&call.name) {
                warn!(tool = %call.name, "Model requested an unregistered tool; treating reply as the answer");
                return Ok(TurnOutcome::Answered);
            }

            let outcome = self.execute_tool(transcript, &call).await;
            context.tool_result = Some(folded_result(&outcome));
            state.iterations += 1;
            last_tool = Some((call.name, outcome));
        }

        self.apply_ceiling(transcript, state.iterations);
        Ok(TurnOutcome::CeilingReached)
    }

    /// Reuse the turn's reply message, or create it on the first iteration.
    fn prepare_reply(&self, transcript: &mut Transcript, state: &mut TurnState) -> MessageId {
        if let Some(id) = state.reply_id
            && transcript.reset_content(id)
        {
            self.event_bus.publish(DomainEvent::ReplyReset { message_id: id });
            return id;
        }
        let id = transcript.push(Message::assistant(""));
        state.reply_id = Some(id);
        id
    }

    pub(crate) fn begin_turn(&self, transcript: &mut Transcript, input: &str) {
        transcript.push(Message::user(input));
        let preview: String = input.chars().take(PREVIEW_CHARS).collect();
        info!(preview = %preview, model = %self.model, "Turn started");
        self.event_bus.publish(DomainEvent::TurnStarted {
            content_preview: preview,
            timestamp: Utc::now(),
        });
        self.set_phase(AgentPhase::Thinking, None);
    }

    /// Stream one reply into `reply_id`, returning the full text.
    pub(crate) async fn stream_reply(
        &self,
        transcript: &mut Transcript,
        reply_id: MessageId,
        prompt: String,
        context: &AgentContext,
    ) -> Result<String, TurnError> {
        let deadline = tokio::time::Instant::now() + self.stream_timeout;
        let timed_out = || {
            ProviderError::Timeout(format!(
                "no complete reply within {}s",
                self.stream_timeout.as_secs()
            ))
        };

        let mut request = ProviderRequest::new(&self.model, prompt, context.to_value());
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        let mut rx = tokio::time::timeout_at(deadline, self.provider.stream(request))
            .await
            .map_err(|_| timed_out())??;

        self.set_phase(AgentPhase::Replying, None);

        let mut text = String::new();
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Err(_) => return Err(timed_out().into()),
                Ok(None) => break,
                Ok(Some(Err(e))) => return Err(e.into()),
                Ok(Some(Ok(fragment))) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    transcript.append_to(reply_id, &fragment);
                    text.push_str(&fragment);
                    self.event_bus.publish(DomainEvent::FragmentAppended {
                        message_id: reply_id,
                        fragment,
                    });
                }
            }
        }

        debug!(chars = text.len(), provider = %self.provider.name(), "Reply streamed");
        Ok(text)
    }

    /// Run a registered tool and record its raw outcome as a system message.
    pub(crate) async fn execute_tool(
        &self,
        transcript: &mut Transcript,
        call: &ToolCall,
    ) -> ToolOutcome {
        self.set_phase(AgentPhase::Executing, Some(call.name.clone()));

        let start = Instant::now();
        let outcome = self.tools.execute(call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            tool = %call.name,
            success = outcome.success,
            duration_ms,
            "Tool executed"
        );
        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: outcome.success,
            duration_ms,
            timestamp: Utc::now(),
        });

        transcript.push(Message::system(format!(
            "Tool {} result: {}",
            call.name,
            outcome.to_json_string()
        )));
        outcome
    }

    pub(crate) fn apply_ceiling(&self, transcript: &mut Transcript, iterations: usize) {
        warn!(
            iterations,
            max_loops = self.max_loops,
            policy = ?self.ceiling,
            "Tool loop ceiling reached without a final answer"
        );
        if self.ceiling == CeilingPolicy::Announce {
            transcript.push(Message::assistant(CEILING_MESSAGE));
        }
    }

    pub(crate) fn fail_turn(
        &self,
        transcript: &mut Transcript,
        state: &mut TurnState,
        error: &TurnError,
    ) {
        warn!(error = %error, "Turn failed");
        self.event_bus.publish(DomainEvent::ErrorOccurred {
            context: "agent_turn".into(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });

        if let Some(id) = state.reply_id
            && transcript.get(id).is_some_and(|m| m.content.is_empty())
        {
            transcript.remove(id);
            state.reply_id = None;
        }
        transcript.push(Message::assistant(APOLOGY_MESSAGE));
        self.set_phase(AgentPhase::Error, None);
    }

    pub(crate) fn finish_turn(&self, report: &TurnReport) {
        self.set_phase(AgentPhase::Idle, None);
        info!(
            outcome = report.outcome.as_str(),
            iterations = report.iterations,
            "Turn finished"
        );
        self.event_bus.publish(DomainEvent::TurnCompleted {
            iterations: report.iterations,
            outcome: report.outcome.as_str().to_string(),
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn set_phase(&self, phase: AgentPhase, current_tool: Option<String>) {
        self.status.send_replace(AgentStatus {
            phase,
            current_tool: current_tool.clone(),
        });
        self.event_bus.publish(DomainEvent::PhaseChanged {
            phase,
            current_tool,
            timestamp: Utc::now(),
        });
    }
}

/// What a tool contributes to the next prompt's context: its `data`, or the
/// whole outcome when it carried none.
pub(crate) fn folded_result(outcome: &ToolOutcome) -> serde_json::Value {
    match &outcome.data {
        Some(data) => data.clone(),
        None => serde_json::to_value(outcome).unwrap_or(serde_json::Value::Null),
    }
}
