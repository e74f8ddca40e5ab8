//! Error taxonomy shared by every layer of the crate.
//!
//! Each failure a provider, stream, or context operation can produce maps to
//! one [`LlmError`] variant, so that the resilient wrapper can decide between
//! the generic retry ladder ([`LlmError::is_retryable`]), the dedicated
//! rate-limit ladder ([`LlmError::is_rate_limited`]), and failing fast.
//! Vendor clients that speak HTTP can classify raw status codes with
//! [`LlmError::from_status`].

use std::time::Duration;
use thiserror::Error;

/// Result type alias used across all public APIs.
pub type Result<T> = std::result::Result<T, LlmError>;

/// All error kinds surfaced by providers, the resilient wrapper, the stream
/// supervisor, and the context manager.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Missing or rejected credentials. Fatal; never retried.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The request itself is malformed (bad option values, empty prompt,
    /// out-of-range branch index, ...). Fatal; the caller must fix it.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The provider refused to answer on content-policy grounds. Surfaced
    /// as-is to the caller.
    #[error("content filtered by provider: {0}")]
    ContentFiltered(String),

    /// The provider reported rate-limit exhaustion. Handled by the dedicated
    /// rate-limit backoff ladder, never by the generic retry budget.
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// Connectivity-level failure (DNS, TCP, TLS, connection reset).
    #[error("network error: {0}")]
    Network(String),

    /// The provider is reachable but refusing service.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The per-operation timeout envelope elapsed.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The request exceeds the model's context window. Recovered once by
    /// pruning the message history to the most recent exchange.
    #[error("context too long: {0}")]
    ContextTooLong(String),

    /// HTTP 5xx-style server fault.
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// HTTP 4xx-style client fault. Only status 408 is transient.
    #[error("client error (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    /// A token stream ended before delivering a finish reason. The stream
    /// supervisor converts this into a continuation attempt rather than
    /// surfacing it.
    #[error("stream ended before completion: {0}")]
    StreamIncomplete(String),

    /// Every continuation attempt was rejected; terminal.
    #[error("stream recovery failed after {attempts} attempts: {message}")]
    RecoveryFailed { attempts: u32, message: String },

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The requested session does not exist in the storage backend.
    #[error("session not found: {0}")]
    NotFound(String),

    /// The context optimizer could not reduce the history below the budget.
    #[error("messages cannot fit the context budget ({tokens} tokens > {max_context})")]
    CannotFit { tokens: usize, max_context: usize },

    /// Anything that does not fit the categories above.
    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Classify an HTTP-like status code into an error kind.
    ///
    /// # Example
    ///
    /// ```rust
    /// use wayfinder::LlmError;
    ///
    /// assert!(matches!(LlmError::from_status(503, "down"), LlmError::Server { status: 503, .. }));
    /// assert!(matches!(LlmError::from_status(429, "slow down"), LlmError::RateLimited(_)));
    /// assert!(matches!(LlmError::from_status(401, "bad key"), LlmError::Authentication(_)));
    /// assert!(LlmError::from_status(408, "timeout").is_retryable());
    /// assert!(!LlmError::from_status(404, "nope").is_retryable());
    /// ```
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => LlmError::Authentication(message),
            429 => LlmError::RateLimited(message),
            413 => LlmError::ContextTooLong(message),
            400..=499 => LlmError::Client { status, message },
            500..=599 => LlmError::Server { status, message },
            _ => LlmError::Other(format!("HTTP {}: {}", status, message)),
        }
    }

    /// Whether the generic retry ladder may re-attempt after this error.
    ///
    /// Transient kinds are network connectivity, provider-unavailable,
    /// timeout, server 5xx, and HTTP 408. Rate limiting is deliberately
    /// excluded: it has its own ladder (see [`LlmError::is_rate_limited`]).
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Network(_)
            | LlmError::ProviderUnavailable(_)
            | LlmError::Timeout(_)
            | LlmError::Server { .. } => true,
            LlmError::Client { status, .. } => *status == 408,
            _ => false,
        }
    }

    /// Whether this error should go through the dedicated rate-limit backoff.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LlmError::RateLimited(_))
    }

    /// Create a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        LlmError::Network(msg.into())
    }

    /// Create a provider-unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        LlmError::ProviderUnavailable(msg.into())
    }

    /// Create an invalid-parameters error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        LlmError::InvalidParameters(msg.into())
    }

    /// Create a catch-all error.
    pub fn other(msg: impl Into<String>) -> Self {
        LlmError::Other(msg.into())
    }
}
