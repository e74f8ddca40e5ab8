//! In-process mock provider.
//!
//! The mock serves two purposes: it is the fourth routable provider (no
//! credential required, useful for offline runs and demos), and it is the
//! scriptable test double used throughout the crate's test suite. Behaviours
//! are queued with the `push_*` methods and consumed one per call; an empty
//! queue yields a canned reply.
//!
//! # Example
//!
//! ```rust
//! use wayfinder::providers::mock::MockProvider;
//! use wayfinder::{GenerateOptions, LlmProvider};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), wayfinder::LlmError> {
//! let provider = MockProvider::new();
//! provider.push_reply("scripted answer");
//!
//! let text = provider.generate("hello", &GenerateOptions::new()).await?;
//! assert_eq!(text, "scripted answer");
//! assert_eq!(provider.call_count(), 1);
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::wayfinder::catalog;
use crate::wayfinder::error::{LlmError, Result};
use crate::wayfinder::message::Message;
use crate::wayfinder::provider::{
    ChunkStream, GenerateOptions, LlmProvider, ModelCapabilities, ModelInfo, ProviderKind,
    Response, StreamChunk, TokenUsage,
};

const DEFAULT_REPLY: &str = "This is a mock response.";

enum Behavior {
    Reply(Response),
    Fail(LlmError),
    /// Park until the caller's cancellation token fires. Used to exercise
    /// timeout envelopes.
    Hang,
}

type StreamScript = std::result::Result<Vec<Result<StreamChunk>>, LlmError>;

/// Scriptable provider that owns no I/O.
pub struct MockProvider {
    info: ModelInfo,
    script: Mutex<VecDeque<Behavior>>,
    stream_script: Mutex<VecDeque<StreamScript>>,
    calls: AtomicUsize,
    message_counts: Mutex<Vec<usize>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_model(catalog::default_model(ProviderKind::Mock))
    }

    pub fn with_model(model: &str) -> Self {
        MockProvider {
            info: catalog::lookup(ProviderKind::Mock, model),
            script: Mutex::new(VecDeque::new()),
            stream_script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            message_counts: Mutex::new(Vec::new()),
        }
    }

    /// Override the advertised capability flags.
    pub fn with_capabilities(mut self, capabilities: ModelCapabilities) -> Self {
        self.info.capabilities = capabilities;
        self
    }

    /// Queue a successful reply for the next generate call.
    pub fn push_reply(&self, content: impl Into<String>) {
        let content = content.into();
        let usage = TokenUsage::new(8, content.len() / 4);
        let response = Response::new(content, self.info.name.clone())
            .with_finish_reason("stop")
            .with_usage(usage);
        self.push_response(response);
    }

    /// Queue an explicit response value.
    pub fn push_response(&self, response: Response) {
        lock(&self.script).push_back(Behavior::Reply(response));
    }

    /// Queue an error for the next generate call.
    pub fn push_error(&self, error: LlmError) {
        lock(&self.script).push_back(Behavior::Fail(error));
    }

    /// Queue a call that never resolves (until cancelled).
    pub fn push_hang(&self) {
        lock(&self.script).push_back(Behavior::Hang);
    }

    /// Queue a scripted stream for the next stream call.
    pub fn push_stream(&self, chunks: Vec<Result<StreamChunk>>) {
        lock(&self.stream_script).push_back(Ok(chunks));
    }

    /// Queue a stream-open failure.
    pub fn push_stream_error(&self, error: LlmError) {
        lock(&self.stream_script).push_back(Err(error));
    }

    /// Total number of generate / schema / stream-open calls observed.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Message-list lengths seen by successive `generate_message` calls.
    pub fn message_counts(&self) -> Vec<usize> {
        lock(&self.message_counts).clone()
    }

    fn default_response(&self) -> Response {
        Response::new(DEFAULT_REPLY, self.info.name.clone())
            .with_finish_reason("stop")
            .with_usage(TokenUsage::new(8, 6))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn provider_name(&self) -> &str {
        ProviderKind::Mock.as_str()
    }

    fn model_info(&self) -> ModelInfo {
        self.info.clone()
    }

    async fn generate_message(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.message_counts).push(messages.len());

        let cancel = options.cancellation();
        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }

        let behavior = lock(&self.script).pop_front();
        match behavior {
            Some(Behavior::Reply(response)) => Ok(response),
            Some(Behavior::Fail(error)) => Err(error),
            Some(Behavior::Hang) => {
                cancel.cancelled().await;
                Err(LlmError::Cancelled)
            }
            None => Ok(self.default_response()),
        }
    }

    async fn generate_with_schema(
        &self,
        _prompt: &str,
        _schema: &serde_json::Value,
        options: &GenerateOptions,
    ) -> Result<serde_json::Value> {
        if !self.info.capabilities.structured_output {
            return Err(LlmError::invalid(format!(
                "model '{}' does not support structured output",
                self.info.name
            )));
        }

        self.calls.fetch_add(1, Ordering::SeqCst);
        let cancel = options.cancellation();
        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }

        let behavior = lock(&self.script).pop_front();
        match behavior {
            Some(Behavior::Reply(response)) => Ok(serde_json::from_str(&response.content)
                .unwrap_or_else(|_| serde_json::json!({ "content": response.content }))),
            Some(Behavior::Fail(error)) => Err(error),
            Some(Behavior::Hang) => {
                cancel.cancelled().await;
                Err(LlmError::Cancelled)
            }
            None => Ok(serde_json::json!({ "content": DEFAULT_REPLY })),
        }
    }

    async fn stream_message(
        &self,
        _messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<ChunkStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if options.cancellation().is_cancelled() {
            return Err(LlmError::Cancelled);
        }

        let script = lock(&self.stream_script).pop_front();
        match script {
            Some(Ok(chunks)) => Ok(Box::pin(stream::iter(chunks))),
            Some(Err(error)) => Err(error),
            None => {
                // Default: the canned reply split into two chunks plus a
                // terminal stop chunk.
                let chunks = vec![
                    Ok(StreamChunk::content("This is a ", 0)),
                    Ok(StreamChunk::content("mock response.", 1)),
                    Ok(StreamChunk::finish(2, "stop")),
                ];
                Ok(Box::pin(stream::iter(chunks)))
            }
        }
    }
}
