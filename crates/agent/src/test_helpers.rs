//! Shared test helpers: a scripted streaming provider and small fixtures.

use async_trait::async_trait;
use fleetpilot_core::context::{ConsoleShell, ContextProvider, OperatorIdentity};
use fleetpilot_core::error::{ProviderError, ToolError};
use fleetpilot_core::provider::{FragmentReceiver, Provider, ProviderRequest};
use fleetpilot_core::tool::{Tool, ToolOutcome};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Size of the fragments scripted replies are cut into.
const FRAGMENT_CHARS: usize = 7;

/// One scripted provider call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream this text in small fragments, then end
    Reply(String),
    /// `stream()` itself fails
    Fail(ProviderError),
    /// Stream `partial`, then yield `error`
    FailMidStream {
        partial: String,
        error: ProviderError,
    },
    /// Open a stream that never produces anything
    Stall,
}

/// A mock provider that plays back a sequence of scripted calls.
///
/// Every request is recorded so tests can inspect prompts and context.
/// Once the script runs out, `repeat` (if set) is replayed forever;
/// otherwise the call fails with `NotConfigured`.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    repeat: Option<String>,
    requests: Mutex<Vec<ProviderRequest>>,
    stalled: Mutex<Vec<mpsc::Sender<Result<String, ProviderError>>>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
            stalled: Mutex::new(Vec::new()),
        }
    }

    /// Answer successive calls with these replies.
    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| Script::Reply(r.into())).collect())
    }

    /// Answer every call with the same reply.
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            repeat: Some(reply.into()),
            ..Self::new(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.prompt).collect()
    }
}

/// Split `text` into fragments of at most `size` chars.
pub fn fragments(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

fn channel_with(items: Vec<Result<String, ProviderError>>) -> FragmentReceiver {
    let (tx, rx) = mpsc::channel(items.len().max(1));
    for item in items {
        let _ = tx.try_send(item);
    }
    rx
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<FragmentReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);

        let next = self.scripts.lock().unwrap().pop_front();
        let script = match (next, &self.repeat) {
            (Some(script), _) => script,
            (None, Some(reply)) => Script::Reply(reply.clone()),
            (None, None) => {
                return Err(ProviderError::NotConfigured("script exhausted".into()));
            }
        };

        match script {
            Script::Reply(text) => Ok(channel_with(
                fragments(&text, FRAGMENT_CHARS).into_iter().map(Ok).collect(),
            )),
            Script::Fail(error) => Err(error),
            Script::FailMidStream { partial, error } => {
                let mut items: Vec<_> = fragments(&partial, FRAGMENT_CHARS)
                    .into_iter()
                    .map(Ok)
                    .collect();
                items.push(Err(error));
                Ok(channel_with(items))
            }
            Script::Stall => {
                let (tx, rx) = mpsc::channel(1);
                self.stalled.lock().unwrap().push(tx);
                Ok(rx)
            }
        }
    }
}

/// `echo`: returns `{success: true, data: {input: args}}`.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back its arguments"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        Ok(ToolOutcome::ok(serde_json::json!({ "input": args })))
    }
}

/// A context provider over `shell` with a fixed operator and environment.
pub fn test_context(shell: &ConsoleShell) -> Arc<ContextProvider> {
    Arc::new(ContextProvider::new(
        OperatorIdentity::default(),
        "test",
        shell.clone(),
    ))
}
