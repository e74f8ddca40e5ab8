//! Provider-agnostic capability surface over remote LLM services.
//!
//! Every provider (OpenAI, Anthropic, Gemini, or the in-process mock) is
//! reached through the [`LlmProvider`] trait. Implementations translate
//! domain [`Message`]s into the vendor's content-part format, delegate the
//! network call to a vendor client, and normalise results into [`Response`]
//! values or [`ChunkStream`]s. Adapters fail fast: retries, backoff, and
//! fallback belong to [`ResilientProvider`](crate::ResilientProvider).
//!
//! # Basic request/response
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use wayfinder::providers::mock::MockProvider;
//! use wayfinder::{GenerateOptions, LlmProvider, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wayfinder::LlmError> {
//!     let provider = MockProvider::new();
//!     let response = provider
//!         .generate_message(&[Message::user("Who are you?")], &GenerateOptions::new())
//!         .await?;
//!     println!("{}", response.content);
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::pin::Pin;
use std::str::FromStr;

use async_trait::async_trait;
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::wayfinder::error::{LlmError, Result};
use crate::wayfinder::message::Message;

/// How many tokens were spent on prompt vs. completion?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of prompt/input tokens billed by the provider.
    pub input_tokens: usize,
    /// Number of generated/output tokens billed by the provider.
    pub output_tokens: usize,
    /// Convenience total equal to `input_tokens + output_tokens`.
    pub total_tokens: usize,
}

impl TokenUsage {
    pub fn new(input_tokens: usize, output_tokens: usize) -> Self {
        TokenUsage {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// A complete, normalised reply from a provider.
#[derive(Debug, Clone)]
pub struct Response {
    pub content: String,
    /// Model that actually served the request.
    pub model: String,
    pub usage: Option<TokenUsage>,
    /// Vendor-supplied reason generation ended, e.g. `stop` or `length`.
    pub finish_reason: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Response {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Response {
            content: content.into(),
            model: model.into(),
            usage: None,
            finish_reason: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// One element of a streamed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    /// The incremental content delta in this chunk. May be empty for chunks
    /// that only carry a finish reason.
    pub content: String,
    /// Position of the chunk within the stream; strictly increasing.
    pub index: usize,
    /// Present on the terminal chunk of a naturally completed stream.
    pub finish_reason: Option<String>,
}

impl StreamChunk {
    pub fn content(content: impl Into<String>, index: usize) -> Self {
        StreamChunk {
            content: content.into(),
            index,
            finish_reason: None,
        }
    }

    pub fn finish(index: usize, reason: impl Into<String>) -> Self {
        StreamChunk {
            content: String::new(),
            index,
            finish_reason: Some(reason.into()),
        }
    }
}

/// A lazy, finite, non-restartable sequence of stream chunks.
///
/// Errors are delivered in-band as `Err` elements; a well-behaved producer
/// closes the stream after the first error or finish-bearing chunk.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Capability flags a model advertises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub text: bool,
    pub image: bool,
    pub audio: bool,
    pub video: bool,
    pub file: bool,
    pub structured_output: bool,
}

impl ModelCapabilities {
    /// Text-only model.
    pub fn text_only() -> Self {
        ModelCapabilities {
            text: true,
            ..Default::default()
        }
    }
}

/// Static description of a model: identity, limits, and capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub provider: String,
    pub name: String,
    pub display_name: String,
    pub max_output_tokens: u32,
    pub context_window: u32,
    pub capabilities: ModelCapabilities,
}

/// Recognised generation knobs, all optional.
///
/// Providers map each present knob to the vendor-native parameter where one
/// exists; unsupported knobs are silently ignored rather than failing. The
/// `extra` bag carries raw provider-specific parameters verbatim.
///
/// # Example
///
/// ```rust
/// use wayfinder::GenerateOptions;
///
/// let options = GenerateOptions::new()
///     .with_temperature(0.2)
///     .with_max_tokens(512)
///     .with_stop_sequences(vec!["END".to_string()]);
/// assert_eq!(options.temperature, Some(0.2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop_sequences: Option<Vec<String>>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub seed: Option<u64>,
    /// JSON-schema-like response format request.
    pub response_format: Option<serde_json::Value>,
    /// Raw provider-specific parameters passed through unchanged.
    pub extra: serde_json::Map<String, serde_json::Value>,
    /// The caller's cancellation token. Observed by vendor calls, retry
    /// delays, and stream pumps.
    pub cancel: Option<CancellationToken>,
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = Some(stop_sequences);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_presence_penalty(mut self, penalty: f32) -> Self {
        self.presence_penalty = Some(penalty);
        self
    }

    pub fn with_frequency_penalty(mut self, penalty: f32) -> Self {
        self.frequency_penalty = Some(penalty);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_response_format(mut self, format: serde_json::Value) -> Self {
        self.response_format = Some(format);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The caller's token, or a fresh never-cancelled one.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone().unwrap_or_default()
    }
}

/// The remote services a request can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    Mock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Mock => "mock",
        }
    }

    /// The environment variable consulted for this provider's API key.
    /// The mock provider needs no credential.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::Mock => None,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "gemini" => Ok(ProviderKind::Gemini),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(LlmError::invalid(format!("unknown provider '{}'", other))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a canonical `provider/model` identifier.
///
/// A string without a `/` defaults the provider to OpenAI.
///
/// # Example
///
/// ```rust
/// use wayfinder::{parse_model_id, ProviderKind};
///
/// assert_eq!(
///     parse_model_id("anthropic/claude-3-5-sonnet-latest").unwrap(),
///     (ProviderKind::Anthropic, "claude-3-5-sonnet-latest".to_string())
/// );
/// assert_eq!(
///     parse_model_id("gpt-4o").unwrap(),
///     (ProviderKind::OpenAi, "gpt-4o".to_string())
/// );
/// assert!(parse_model_id("acme/gpt-4o").is_err());
/// ```
pub fn parse_model_id(id: &str) -> Result<(ProviderKind, String)> {
    match id.split_once('/') {
        Some((provider, model)) => Ok((provider.parse()?, model.to_string())),
        None => Ok((ProviderKind::OpenAi, id.to_string())),
    }
}

/// Format the canonical `provider/model` identifier.
pub fn format_model_id(kind: ProviderKind, model: &str) -> String {
    format!("{}/{}", kind.as_str(), model)
}

/// Uniform capability set over vendor-specific clients.
///
/// Implementations own no I/O; they delegate to a vendor client and surface
/// vendor errors unchanged. All implementations must be thread-safe
/// (`Send + Sync`) so they can be shared between tasks.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider name, e.g. `"openai"`.
    fn provider_name(&self) -> &str;

    /// Static description of the bound model.
    fn model_info(&self) -> ModelInfo;

    /// Generate a reply to a bare prompt.
    ///
    /// Wraps the prompt as a single user message and delegates to
    /// [`generate_message`](LlmProvider::generate_message).
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        let response = self
            .generate_message(&[Message::user(prompt)], options)
            .await?;
        Ok(response.content)
    }

    /// Generate a reply to a full message history.
    async fn generate_message(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<Response>;

    /// Generate output conforming to a JSON-schema-like description.
    ///
    /// Only models advertising the `structured_output` capability may serve
    /// this; others fail with [`LlmError::InvalidParameters`].
    async fn generate_with_schema(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
        options: &GenerateOptions,
    ) -> Result<serde_json::Value>;

    /// Stream a reply to a bare prompt.
    ///
    /// Delegates to [`stream_message`](LlmProvider::stream_message) with a
    /// single user message.
    async fn stream(&self, prompt: &str, options: &GenerateOptions) -> Result<ChunkStream> {
        self.stream_message(&[Message::user(prompt)], options).await
    }

    /// Stream a reply to a full message history.
    ///
    /// Chunks arrive in strictly increasing index order. Cancellation via
    /// the token in `options` terminates the stream promptly.
    async fn stream_message(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<ChunkStream>;
}
