//! Console copilot endpoint provider.
//!
//! The console backend exposes a single streaming endpoint that accepts
//! `{model, prompt, context}` and answers with a plain chunked text body.
//! Every body chunk is forwarded as one fragment; there is no framing.

use async_trait::async_trait;
use futures::StreamExt;
use fleetpilot_core::error::ProviderError;
use fleetpilot_core::provider::{FragmentReceiver, Provider, ProviderRequest};
use tracing::{debug, warn};

/// Default path of the copilot stream endpoint, relative to the console API.
pub const DEFAULT_STREAM_PATH: &str = "/ai/stream";

/// Provider for the console's own plain-text streaming endpoint.
pub struct ConsoleStreamProvider {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ConsoleStreamProvider {
    /// Create a provider posting to `base_url` + [`DEFAULT_STREAM_PATH`].
    pub fn new(base_url: impl Into<String>) -> Self {
        let base = base_url.into();
        let endpoint = format!("{}{}", base.trim_end_matches('/'), DEFAULT_STREAM_PATH);
        Self::with_endpoint(endpoint)
    }

    /// Create a provider posting to an exact endpoint URL.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoint: endpoint.into(),
            api_key: None,
            client,
        }
    }

    /// Send a bearer token with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        serde_json::json!({
            "model": request.model,
            "prompt": request.prompt,
            "context": request.context,
        })
    }
}

/// Split `pending` into the longest valid UTF-8 prefix (returned) and the
/// trailing bytes of an incomplete code point (kept in `pending`).
fn take_utf8_prefix(pending: &mut Vec<u8>) -> String {
    let checked = std::str::from_utf8(pending).map(str::len);
    let valid = match checked {
        Ok(len) => len,
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        // Invalid sequence: decode lossily and flush.
        Err(_) => {
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            return text;
        }
    };
    let rest = pending.split_off(valid);
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = rest;
    text
}

#[async_trait]
impl Provider for ConsoleStreamProvider {
    fn name(&self) -> &str {
        "console"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<FragmentReceiver, ProviderError> {
        debug!(
            endpoint = %self.endpoint,
            model = %request.model,
            prompt_chars = request.prompt.len(),
            "Posting to console copilot endpoint"
        );

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&Self::request_body(&request));
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Console endpoint rejected credentials".into(),
            ));
        }
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Console endpoint error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut pending: Vec<u8> = Vec::new();

            while let Some(chunk) = byte_stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        pending.extend_from_slice(&bytes);
                        let text = take_utf8_prefix(&mut pending);
                        if !text.is_empty() && tx.send(Ok(text)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                }
            }

            if !pending.is_empty() {
                let tail = String::from_utf8_lossy(&pending).into_owned();
                let _ = tx.send(Ok(tail)).await;
            }
        });

        Ok(rx)
    }
}
