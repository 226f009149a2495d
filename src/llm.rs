//! Gateway to the Ollama-compatible LLM runtime.
//!
//! Speaks the runtime's native chat API:
//!
//! - `GET /api/tags` — model discovery, used by [`OllamaGateway::health`]
//! - `POST /api/chat` — chat completion, whole or streamed
//!
//! Request sampling parameters are fixed policy values ([`ChatOptions::fixed`]);
//! callers cannot override them per call. This is a deliberate configuration
//! point for future extension.

use crate::config::LlmConfig;
use crate::context::ChatMessage;
use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::time::Duration;
use tracing::{info, warn};

/// Fixed sampling temperature.
pub const TEMPERATURE: f64 = 0.7;
/// Fixed nucleus sampling threshold.
pub const TOP_P: f64 = 0.9;
/// Fixed output token cap.
pub const MAX_TOKENS: u32 = 512;
/// Fixed stop sequences.
pub const STOP_SEQUENCES: &[&str] = &["Human:", "User:"];

/// A boxed stream of incremental response text chunks.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Health of the model runtime as seen from this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HealthStatus {
    /// Runtime reachable and the configured model is served.
    Healthy,
    /// Runtime reachable but the configured model is not in its tag list.
    ModelMissing {
        /// The configured model name.
        model: String,
        /// Models the runtime actually serves.
        available: Vec<String>,
    },
    /// Runtime unreachable (connection refused or probe timeout).
    Disconnected,
    /// Runtime responded but the probe failed for another reason.
    Error {
        /// Human-readable failure detail.
        detail: String,
    },
}

impl HealthStatus {
    /// Returns `true` when the runtime serves the configured model.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::ModelMissing { model, available } => {
                write!(f, "model {model} not found. Available: {available:?}")
            }
            Self::Disconnected => write!(f, "disconnected"),
            Self::Error { detail } => write!(f, "error: {detail}"),
        }
    }
}

/// Seam between the orchestrator and the model runtime.
///
/// Implemented by [`OllamaGateway`] in production and by mocks in tests.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Generate one whole response for the given prompt context.
    async fn generate(&self, context: &[ChatMessage]) -> Result<String>;

    /// Probe runtime health.
    async fn health(&self) -> HealthStatus;

    /// List the models the runtime serves.
    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

// ── Wire types ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

/// Fixed request options sent with every chat call.
#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
    stop: &'static [&'static str],
}

impl ChatOptions {
    fn fixed() -> Self {
        Self {
            temperature: TEMPERATURE,
            top_p: TOP_P,
            max_tokens: MAX_TOKENS,
            stop: STOP_SEQUENCES,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<MessageBody>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    content: String,
}

/// One newline-delimited chunk of a streamed chat response.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    message: Option<MessageBody>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

// ── Gateway ────────────────────────────────────────────────────

/// HTTP gateway to an Ollama-compatible runtime.
pub struct OllamaGateway {
    client: reqwest::Client,
    base_url: String,
    model: String,
    request_timeout: Duration,
    probe_timeout: Duration,
}

impl OllamaGateway {
    /// Create a gateway from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AssistantError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
        })
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate one whole response.
    ///
    /// # Errors
    ///
    /// - [`AssistantError::ModelTimeout`] — no response within the deadline
    /// - [`AssistantError::ModelUnreachable`] — runtime not reachable
    /// - [`AssistantError::ModelProtocolError`] — non-success status or
    ///   undecodable body
    pub async fn generate(&self, context: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: context,
            stream: false,
            options: ChatOptions::fixed(),
        };

        info!(model = self.model.as_str(), "sending chat request");
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e, self.request_timeout.as_secs()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::ModelProtocolError(format!(
                "HTTP {status}: {}",
                truncate(&body, 500)
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            AssistantError::ModelProtocolError(format!("undecodable response body: {e}"))
        })?;

        let content = parsed.message.map(|m| m.content).unwrap_or_default();
        Ok(content.trim().to_owned())
    }

    /// Generate a streamed response, yielding incremental text chunks.
    ///
    /// The stream must be fully drained (or dropped) before the next call
    /// on this gateway is issued. Malformed chunks inside the stream are
    /// skipped; decoding continues on the next chunk.
    ///
    /// # Errors
    ///
    /// Fails up front like [`generate`](Self::generate); transport errors
    /// mid-stream surface as stream items.
    pub async fn generate_stream(&self, context: &[ChatMessage]) -> Result<TextStream> {
        let request = ChatRequest {
            model: &self.model,
            messages: context,
            stream: true,
            options: ChatOptions::fixed(),
        };

        info!(model = self.model.as_str(), "sending streamed chat request");
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e, self.request_timeout.as_secs()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::ModelProtocolError(format!(
                "HTTP {status}: {}",
                truncate(&body, 500)
            )));
        }

        let timeout_secs = self.request_timeout.as_secs();
        let mut bytes = response.bytes_stream();

        let stream = async_stream::try_stream! {
            let mut buffer: Vec<u8> = Vec::new();
            let mut done = false;
            'read: while let Some(chunk) = bytes.next().await {
                let chunk = chunk
                    .map_err(|e| classify_reqwest_error(&e, timeout_secs))?;
                buffer.extend_from_slice(&chunk);

                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = &line[..line.len() - 1];
                    let Some(parsed) = decode_stream_line(line) else {
                        continue;
                    };
                    if let Some(message) = parsed.message
                        && !message.content.is_empty()
                    {
                        yield message.content;
                    }
                    if parsed.done {
                        done = true;
                        break 'read;
                    }
                }
            }

            // Trailing line without a newline terminator.
            if !done
                && let Some(parsed) = decode_stream_line(&buffer)
                && let Some(message) = parsed.message
                && !message.content.is_empty()
            {
                yield message.content;
            }
        };

        Ok(Box::pin(stream))
    }

    /// List the models the runtime currently serves.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`generate`](Self::generate), with the shorter
    /// probe deadline.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e, self.probe_timeout.as_secs()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::ModelProtocolError(format!(
                "HTTP {status}: {}",
                truncate(&body, 500)
            )));
        }

        let parsed: TagsResponse = response.json().await.map_err(|e| {
            AssistantError::ModelProtocolError(format!("undecodable tag list: {e}"))
        })?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    /// Probe runtime health: connection failure first, then model
    /// availability, else healthy.
    pub async fn health(&self) -> HealthStatus {
        match self.list_models().await {
            Ok(models) => {
                if models.iter().any(|name| *name == self.model) {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::ModelMissing {
                        model: self.model.clone(),
                        available: models,
                    }
                }
            }
            Err(AssistantError::ModelUnreachable(_)) | Err(AssistantError::ModelTimeout(_)) => {
                HealthStatus::Disconnected
            }
            Err(e) => HealthStatus::Error {
                detail: e.to_string(),
            },
        }
    }
}

#[async_trait]
impl ChatBackend for OllamaGateway {
    async fn generate(&self, context: &[ChatMessage]) -> Result<String> {
        OllamaGateway::generate(self, context).await
    }

    async fn health(&self) -> HealthStatus {
        OllamaGateway::health(self).await
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        OllamaGateway::list_models(self).await
    }
}

// ── Helpers ────────────────────────────────────────────────────

/// Decode one streamed line; `None` means the line is skippable
/// (blank or malformed).
fn decode_stream_line(line: &[u8]) -> Option<StreamChunk> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<StreamChunk>(line) {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            warn!("skipping malformed stream chunk: {e}");
            None
        }
    }
}

/// Map a transport error onto the gateway failure taxonomy.
fn classify_reqwest_error(err: &reqwest::Error, timeout_secs: u64) -> AssistantError {
    if err.is_timeout() {
        AssistantError::ModelTimeout(timeout_secs)
    } else if err.is_connect() {
        AssistantError::ModelUnreachable(err.to_string())
    } else {
        AssistantError::ModelProtocolError(err.to_string())
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
