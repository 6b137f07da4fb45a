//! Provider trait — the abstraction over streaming LLM backends.
//!
//! A Provider takes one fully-built prompt plus the context snapshot it was
//! built from, and returns a finite stream of text fragments. Concatenating
//! the fragments in arrival order yields the model's answer.
//!
//! Implementations: OpenAI-compatible SSE, the console copilot endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;

/// Receiving end of a fragment stream. The sender closing marks the end.
pub type FragmentReceiver = mpsc::Receiver<Result<String, ProviderError>>;

/// A streaming request to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// The complete prompt text
    pub prompt: String,

    /// The context snapshot the prompt was built from
    #[serde(default)]
    pub context: serde_json::Value,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, context: serde_json::Value) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            context,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// The core Provider trait.
///
/// The agent loop calls `stream()` without knowing which backend is behind
/// it. Transport failures surface either as the `Err` of `stream()` or as an
/// `Err` item inside the fragment stream; the provider never retries.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "console").
    fn name(&self) -> &str;

    /// Send a request and get a stream of text fragments.
    async fn stream(&self, request: ProviderRequest) -> Result<FragmentReceiver, ProviderError>;

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}

/// Drain a fragment stream into a single string.
pub async fn collect_fragments(mut rx: FragmentReceiver) -> Result<String, ProviderError> {
    let mut text = String::new();
    while let Some(fragment) = rx.recv().await {
        text.push_str(&fragment?);
    }
    Ok(text)
}
