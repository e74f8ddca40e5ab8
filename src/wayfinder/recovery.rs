//! Streaming recovery: splicing broken token streams back together.
//!
//! [`StreamRecovery`] wraps any provider's streaming operation with a
//! supervisor task. Every incoming chunk is forwarded to the caller
//! unchanged *and* appended to a shared [`ResponseBuffer`]. Three events end
//! the wrapped stream:
//!
//! 1. **Natural completion**: a chunk arrives bearing a finish reason; the
//!    supervisor forwards it and closes.
//! 2. **Explicit error**: if the buffer already has content, a continuation
//!    is attempted; otherwise the error is forwarded and the stream closes.
//! 3. **Stall**: no chunk within the inactivity timeout, or the upstream
//!    closes without a finish reason; a continuation is attempted.
//!
//! A continuation asks the *same* provider, over the non-streaming path, to
//! resume the buffered text. Accepted continuations are re-chunked on
//! newlines, continue the original index sequence, and terminate with the
//! synthetic [`FINISH_REASON_RECOVERED`] finish reason. When every attempt
//! is rejected the caller receives a single
//! [`LlmError::RecoveryFailed`] element.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use futures_util::StreamExt;
//! use wayfinder::providers::mock::MockProvider;
//! use wayfinder::{GenerateOptions, StreamRecovery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wayfinder::LlmError> {
//!     let provider = Arc::new(MockProvider::new());
//!     let recovery = StreamRecovery::new(provider);
//!
//!     let mut stream = recovery
//!         .stream("tell me a story", &GenerateOptions::new())
//!         .await?;
//!     while let Some(chunk) = stream.next().await {
//!         print!("{}", chunk?.content);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use log::{info, warn};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::wayfinder::error::{LlmError, Result};
use crate::wayfinder::message::Message;
use crate::wayfinder::provider::{ChunkStream, GenerateOptions, LlmProvider, StreamChunk};

/// Synthetic finish reason marking a supervisor-completed stream.
pub const FINISH_REASON_RECOVERED: &str = "recovered";

/// Opening instruction of the continuation prompt.
const CONTINUATION_INSTRUCTION: &str = "The previous response was interrupted before it \
finished. Resume it without repeating any text that was already produced.";

/// Phrases that mark a continuation as a refusal rather than a resumption.
const FAILURE_PREFIXES: [&str; 4] = [
    "i cannot continue",
    "i don't have enough context",
    "error:",
    "sorry,",
];

/// Accumulated state of a streamed response.
///
/// The buffer is the only shared-mutable state in the crate; every access
/// goes through a mutex.
#[derive(Debug)]
pub struct ResponseBuffer {
    content: String,
    chunk_count: usize,
    last_chunk_at: Instant,
    complete: bool,
    finish_reason: Option<String>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        ResponseBuffer {
            content: String::new(),
            chunk_count: 0,
            last_chunk_at: Instant::now(),
            complete: false,
            finish_reason: None,
        }
    }

    /// Discard all accumulated state. Called when a wrapped stream begins.
    pub fn reset(&mut self) {
        self.content.clear();
        self.chunk_count = 0;
        self.last_chunk_at = Instant::now();
        self.complete = false;
        self.finish_reason = None;
    }

    /// Record an incoming chunk.
    pub fn append(&mut self, chunk: &StreamChunk) {
        self.content.push_str(&chunk.content);
        self.chunk_count += 1;
        self.last_chunk_at = Instant::now();
    }

    /// Mark the response finished.
    pub fn mark_complete(&mut self, finish_reason: Option<String>) {
        self.complete = true;
        self.finish_reason = finish_reason;
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn last_chunk_at(&self) -> Instant {
        self.last_chunk_at
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(buffer: &Mutex<ResponseBuffer>) -> MutexGuard<'_, ResponseBuffer> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Tunables for [`StreamRecovery`].
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// How long the supervisor waits for the next chunk before declaring a
    /// stall.
    pub inactivity_timeout: Duration,
    /// Maximum continuation attempts before surfacing
    /// [`LlmError::RecoveryFailed`].
    pub max_attempts: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        RecoveryConfig {
            inactivity_timeout: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

/// Supervisor that wraps a provider's streams with stall detection and
/// continuation.
pub struct StreamRecovery {
    provider: Arc<dyn LlmProvider>,
    config: RecoveryConfig,
}

impl StreamRecovery {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        StreamRecovery {
            provider,
            config: RecoveryConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RecoveryConfig) -> Self {
        self.config = config;
        self
    }

    /// Open a supervised stream for a bare prompt.
    pub async fn stream(&self, prompt: &str, options: &GenerateOptions) -> Result<ChunkStream> {
        let upstream = self.provider.stream(prompt, options).await?;
        Ok(self.supervise(upstream, options))
    }

    /// Open a supervised stream for a full message history.
    pub async fn stream_message(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<ChunkStream> {
        let upstream = self.provider.stream_message(messages, options).await?;
        Ok(self.supervise(upstream, options))
    }

    /// Wrap an already-open stream with the supervisor.
    ///
    /// The supervisor owns both the upstream and the returned channel and
    /// guarantees the channel closes on every exit path: natural
    /// completion, recovery success or failure, cancellation, or a panic in
    /// the pump task.
    pub fn supervise(&self, upstream: ChunkStream, options: &GenerateOptions) -> ChunkStream {
        let (tx, rx) = mpsc::channel::<Result<StreamChunk>>(32);
        let buffer = Arc::new(Mutex::new(ResponseBuffer::new()));
        let pump_handle = tokio::spawn(pump(
            self.provider.clone(),
            self.config.clone(),
            upstream,
            tx.clone(),
            buffer,
            options.clone(),
        ));
        // Watchdog: convert a panicking pump into a final error element so
        // the caller never observes an abruptly closed channel.
        tokio::spawn(async move {
            if let Err(join_error) = pump_handle.await {
                if join_error.is_panic() {
                    let _ = tx
                        .send(Err(LlmError::StreamIncomplete(
                            "stream supervisor aborted unexpectedly".to_string(),
                        )))
                        .await;
                }
            }
        });
        Box::pin(ReceiverStream::new(rx))
    }
}

async fn pump(
    provider: Arc<dyn LlmProvider>,
    config: RecoveryConfig,
    mut upstream: ChunkStream,
    tx: mpsc::Sender<Result<StreamChunk>>,
    buffer: Arc<Mutex<ResponseBuffer>>,
    options: GenerateOptions,
) {
    lock(&buffer).reset();
    let cancel = options.cancellation();
    let mut next_index = 0usize;

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = tx.send(Err(LlmError::Cancelled)).await;
                return;
            }
            item = tokio::time::timeout(config.inactivity_timeout, upstream.next()) => item,
        };

        match item {
            // Inactivity timeout elapsed with no chunk.
            Err(_) => {
                warn!(
                    "stream stalled after {} chunks; attempting continuation",
                    lock(&buffer).chunk_count()
                );
                recover(&provider, &config, &buffer, &tx, next_index, &options).await;
                return;
            }
            // Upstream closed.
            Ok(None) => {
                if lock(&buffer).is_complete() {
                    return;
                }
                info!("stream closed without a finish reason; attempting continuation");
                recover(&provider, &config, &buffer, &tx, next_index, &options).await;
                return;
            }
            Ok(Some(Ok(chunk))) => {
                {
                    let mut guard = lock(&buffer);
                    guard.append(&chunk);
                    if chunk.finish_reason.is_some() {
                        guard.mark_complete(chunk.finish_reason.clone());
                    }
                }
                next_index = chunk.index + 1;
                let finished = chunk.finish_reason.is_some();
                if tx.send(Ok(chunk)).await.is_err() {
                    // Caller dropped the stream.
                    return;
                }
                if finished {
                    return;
                }
            }
            Ok(Some(Err(error))) => {
                let has_content = !lock(&buffer).content().is_empty();
                if has_content {
                    warn!("stream errored mid-response ({}); attempting continuation", error);
                    recover(&provider, &config, &buffer, &tx, next_index, &options).await;
                } else {
                    let _ = tx.send(Err(error)).await;
                }
                return;
            }
        }
    }
}

async fn recover(
    provider: &Arc<dyn LlmProvider>,
    config: &RecoveryConfig,
    buffer: &Arc<Mutex<ResponseBuffer>>,
    tx: &mpsc::Sender<Result<StreamChunk>>,
    mut next_index: usize,
    options: &GenerateOptions,
) {
    let prefix = lock(buffer).content().to_string();
    let prompt = continuation_prompt(&prefix);
    let cancel = options.cancellation();

    for attempt in 1..=config.max_attempts {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = tx.send(Err(LlmError::Cancelled)).await;
                return;
            }
            result = provider.generate(&prompt, options) => result,
        };

        match result {
            Ok(continuation) if is_valid_continuation(&prefix, &continuation) => {
                for line in continuation.split('\n') {
                    let chunk = StreamChunk::content(format!("{}\n", line), next_index);
                    next_index += 1;
                    lock(buffer).append(&chunk);
                    if tx.send(Ok(chunk)).await.is_err() {
                        return;
                    }
                }
                lock(buffer).mark_complete(Some(FINISH_REASON_RECOVERED.to_string()));
                let _ = tx
                    .send(Ok(StreamChunk::finish(next_index, FINISH_REASON_RECOVERED)))
                    .await;
                info!("stream recovered after {} continuation attempt(s)", attempt);
                return;
            }
            Ok(_) => {
                info!("continuation attempt {} rejected by validity check", attempt);
            }
            Err(error) => {
                warn!("continuation attempt {} failed: {}", attempt, error);
            }
        }
    }

    let _ = tx
        .send(Err(LlmError::RecoveryFailed {
            attempts: config.max_attempts,
            message: "no valid continuation produced".to_string(),
        }))
        .await;
}

/// Build the prompt asking the provider to resume an incomplete response.
pub fn continuation_prompt(prefix: &str) -> String {
    format!(
        "{}\n\n{}\n\nContinue from where you left off.",
        CONTINUATION_INSTRUCTION, prefix
    )
}

/// Decide whether a continuation plausibly resumes the buffered prefix.
///
/// Rejects continuations that re-emit the entire prefix, open with a refusal
/// phrase, or are shorter than 10 characters.
///
/// # Example
///
/// ```rust
/// use wayfinder::recovery::is_valid_continuation;
///
/// assert!(is_valid_continuation("The answer is", " forty-two, of course."));
/// assert!(!is_valid_continuation("The answer is", "The answer is forty-two."));
/// assert!(!is_valid_continuation("The answer is", "Sorry, I lost track."));
/// assert!(!is_valid_continuation("The answer is", "short"));
/// ```
pub fn is_valid_continuation(prefix: &str, continuation: &str) -> bool {
    if !prefix.is_empty() && continuation.contains(prefix) {
        return false;
    }
    let lowered = continuation.trim_start().to_lowercase();
    if FAILURE_PREFIXES
        .iter()
        .any(|phrase| lowered.starts_with(phrase))
    {
        return false;
    }
    continuation.chars().count() >= 10
}

/// Heuristic for whether a non-streamed response looks finished.
///
/// A response is considered complete when, after trimming, it is at least 20
/// characters long and either ends with terminal punctuation or a closing
/// code fence, contains an even non-zero number of code fences, or ends on a
/// bullet / numbered list item.
///
/// # Example
///
/// ```rust
/// use wayfinder::recovery::is_response_complete;
///
/// assert!(is_response_complete("Here is the full explanation you asked for."));
/// assert!(!is_response_complete("short"));
/// assert!(!is_response_complete("This response stops mid-sen"));
/// assert!(is_response_complete("Steps to reproduce:\n1. open the app\n2. click the button"));
/// ```
pub fn is_response_complete(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < 20 {
        return false;
    }

    let fence_count = trimmed.matches("```").count();
    if fence_count > 0 && fence_count % 2 == 0 {
        return true;
    }

    if trimmed.ends_with('.')
        || trimmed.ends_with('!')
        || trimmed.ends_with('?')
        || trimmed.ends_with("```")
    {
        return true;
    }

    ends_with_list_marker(trimmed)
}

fn ends_with_list_marker(text: &str) -> bool {
    let last_line = match text.lines().rev().find(|line| !line.trim().is_empty()) {
        Some(line) => line.trim_start(),
        None => return false,
    };

    if last_line.starts_with("- ") || last_line.starts_with("* ") || last_line.starts_with("• ") {
        return true;
    }

    let digits: String = last_line
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return false;
    }
    let rest = &last_line[digits.len()..];
    rest.starts_with('.') || rest.starts_with(')')
}
