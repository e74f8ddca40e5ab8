//! Resilient wrapper layering retries, backoff, timeouts, and fallback over
//! a primary provider.
//!
//! [`ResilientProvider`] implements [`LlmProvider`] itself, so it can be used
//! anywhere a bare adapter can, including underneath the streaming recovery
//! supervisor. Applied per operation, in order:
//!
//! 1. a per-attempt timeout envelope (default 30 s);
//! 2. exponential-backoff retries for transient errors;
//! 3. a separate rate-limit ladder that never consumes the generic budget;
//! 4. ordered fallback to alternate providers, each granted the full budget.
//!
//! `generate_message` additionally recovers from a context-too-long failure
//! once per call by pruning the history to the most recent exchange and
//! re-running the whole chain. Stream operations retry only the stream-open
//! call: mid-stream failures never trigger fallback, because fallback would
//! lose content already delivered to the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use wayfinder::providers::mock::MockProvider;
//! use wayfinder::{GenerateOptions, LlmProvider, ResilientProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wayfinder::LlmError> {
//!     let primary: Arc<dyn LlmProvider> = Arc::new(MockProvider::new());
//!     let fallback: Arc<dyn LlmProvider> = Arc::new(MockProvider::new());
//!
//!     let provider = ResilientProvider::new(primary).with_fallbacks(vec![fallback]);
//!     let text = provider.generate("hello", &GenerateOptions::new()).await?;
//!     println!("{}", text);
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::wayfinder::error::{LlmError, Result};
use crate::wayfinder::message::Message;
use crate::wayfinder::provider::{
    ChunkStream, GenerateOptions, LlmProvider, ModelInfo, Response, StreamChunk,
};
use crate::wayfinder::retry::{RateLimitConfig, RetryConfig};

/// Tunables for [`ResilientProvider`].
#[derive(Debug, Clone)]
pub struct ResilientConfig {
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
    /// Per-attempt timeout envelope.
    pub timeout: Duration,
    /// Whether to iterate the fallback list after the primary fails.
    pub fallback_enabled: bool,
}

impl Default for ResilientConfig {
    fn default() -> Self {
        ResilientConfig {
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            timeout: Duration::from_secs(30),
            fallback_enabled: true,
        }
    }
}

/// A provider that survives transient faults and falls back to alternates.
pub struct ResilientProvider {
    primary: Arc<dyn LlmProvider>,
    fallbacks: Vec<Arc<dyn LlmProvider>>,
    config: ResilientConfig,
}

impl ResilientProvider {
    pub fn new(primary: Arc<dyn LlmProvider>) -> Self {
        ResilientProvider {
            primary,
            fallbacks: Vec::new(),
            config: ResilientConfig::default(),
        }
    }

    /// Set the ordered fallback list, tried front to back.
    pub fn with_fallbacks(mut self, fallbacks: Vec<Arc<dyn LlmProvider>>) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    pub fn with_config(mut self, config: ResilientConfig) -> Self {
        self.config = config;
        self
    }

    /// Providers in attempt order: the primary, then (when fallback is
    /// enabled) each alternate.
    fn chain(&self) -> impl Iterator<Item = &Arc<dyn LlmProvider>> {
        let fallback_count = if self.config.fallback_enabled {
            self.fallbacks.len()
        } else {
            0
        };
        std::iter::once(&self.primary).chain(self.fallbacks.iter().take(fallback_count))
    }

    /// Run one provider operation through the timeout envelope and both
    /// backoff ladders. Returns the last error once a budget is exhausted or
    /// a non-retryable kind appears.
    async fn attempt_with_retries<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0u32;
        let mut rate_limit_retries = 0u32;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                result = tokio::time::timeout(self.config.timeout, op()) => match result {
                    Ok(inner) => inner,
                    Err(_) => Err(LlmError::Timeout(self.config.timeout)),
                },
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let delay = if error.is_rate_limited() {
                if rate_limit_retries >= self.config.rate_limit.max_retries {
                    return Err(error);
                }
                let delay = self.config.rate_limit.delay_for_attempt(rate_limit_retries);
                rate_limit_retries += 1;
                delay
            } else if error.is_retryable() {
                if retries >= self.config.retry.max_retries {
                    return Err(error);
                }
                let delay = self.config.retry.delay_for_attempt(retries);
                retries += 1;
                delay
            } else {
                return Err(error);
            };

            if log::log_enabled!(log::Level::Warn) {
                warn!("attempt failed ({}); retrying in {:?}", error, delay);
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn generate_message_chain(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let mut last_error: Option<LlmError> = None;
        for (position, provider) in self.chain().enumerate() {
            let attempt = self
                .attempt_with_retries(cancel, || provider.generate_message(messages, options))
                .await;
            match attempt {
                Ok(response) => {
                    if position > 0 {
                        info!(
                            "fallback provider '{}' served the request",
                            provider.provider_name()
                        );
                    }
                    return Ok(response);
                }
                Err(LlmError::Cancelled) => return Err(LlmError::Cancelled),
                Err(error) => {
                    warn!(
                        "provider '{}' exhausted its budget: {}",
                        provider.provider_name(),
                        error
                    );
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| LlmError::other("no providers configured")))
    }
}

/// Forward a live stream while watching the caller's cancellation token.
/// Cancellation surfaces as a final error element before the channel closes.
fn wrap_stream(upstream: ChunkStream, cancel: CancellationToken) -> ChunkStream {
    let (tx, rx) = mpsc::channel::<Result<StreamChunk>>(32);
    tokio::spawn(async move {
        let mut upstream = upstream;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = tx.send(Err(LlmError::Cancelled)).await;
                    break;
                }
                item = upstream.next() => match item {
                    Some(item) => {
                        if tx.send(item).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    });
    Box::pin(ReceiverStream::new(rx))
}

#[async_trait]
impl LlmProvider for ResilientProvider {
    fn provider_name(&self) -> &str {
        self.primary.provider_name()
    }

    fn model_info(&self) -> ModelInfo {
        self.primary.model_info()
    }

    async fn generate_message(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<Response> {
        let cancel = options.cancellation();
        match self.generate_message_chain(messages, options, &cancel).await {
            Err(LlmError::ContextTooLong(_)) if messages.len() > 2 => {
                warn!("context too long; retrying with the most recent exchange only");
                let tail = &messages[messages.len() - 2..];
                self.generate_message_chain(tail, options, &cancel).await
            }
            result => result,
        }
    }

    async fn generate_with_schema(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
        options: &GenerateOptions,
    ) -> Result<serde_json::Value> {
        let cancel = options.cancellation();
        let mut last_error: Option<LlmError> = None;
        for (position, provider) in self.chain().enumerate() {
            // Fallbacks that cannot honour the schema are skipped rather
            // than burned through.
            if position > 0 && !provider.model_info().capabilities.structured_output {
                debug!(
                    "skipping fallback '{}': no structured-output capability",
                    provider.provider_name()
                );
                continue;
            }
            let attempt = self
                .attempt_with_retries(&cancel, || {
                    provider.generate_with_schema(prompt, schema, options)
                })
                .await;
            match attempt {
                Ok(value) => return Ok(value),
                Err(LlmError::Cancelled) => return Err(LlmError::Cancelled),
                Err(error) => {
                    warn!(
                        "provider '{}' exhausted its budget: {}",
                        provider.provider_name(),
                        error
                    );
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| LlmError::other("no providers configured")))
    }

    async fn stream_message(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<ChunkStream> {
        let cancel = options.cancellation();
        let mut last_error: Option<LlmError> = None;
        // Only the stream-open call is retried; once chunks flow, failures
        // surface in-band and never trigger fallback.
        for provider in self.chain() {
            let attempt = self
                .attempt_with_retries(&cancel, || provider.stream_message(messages, options))
                .await;
            match attempt {
                Ok(stream) => return Ok(wrap_stream(stream, cancel.clone())),
                Err(LlmError::Cancelled) => return Err(LlmError::Cancelled),
                Err(error) => {
                    warn!(
                        "provider '{}' failed to open a stream: {}",
                        provider.provider_name(),
                        error
                    );
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| LlmError::other("no providers configured")))
    }
}
