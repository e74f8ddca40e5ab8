// src/lib.rs

//! Client-side orchestration layer between an interactive CLI/REPL and
//! remote LLM services.
//!
//! The crate routes chat-style requests (role-tagged messages with optional
//! multimodal attachments) to a provider (OpenAI, Anthropic, Gemini, or a
//! mock), obtains a complete textual reply in one response or as a live
//! token stream, and returns it with usage metadata. Around that core it
//! keeps requests within the model's context window
//! ([`ContextManager`]), survives transient faults and falls back to
//! alternate providers ([`ResilientProvider`]), and splices broken token
//! streams back together ([`StreamRecovery`]). Conversations live in
//! branchable [`Session`]s.
//!
//! Network transports and durable storage are collaborators, consumed
//! behind the [`vendor::VendorClient`](crate::vendor::VendorClient) and
//! [`storage::SessionStore`](crate::storage::SessionStore) traits.

// Import the top-level `wayfinder` module.
pub mod wayfinder;

// Re-exporting key items for easier external access.
pub use crate::wayfinder::ask::{AskOptions, AskResult, Wayfinder, DEFAULT_MODEL_ID};
pub use crate::wayfinder::context::{ContextConfig, ContextManager, ContextOverflow};
pub use crate::wayfinder::error::{LlmError, Result};
pub use crate::wayfinder::message::{Attachment, AttachmentKind, Message, Role};
pub use crate::wayfinder::provider::{
    format_model_id, parse_model_id, ChunkStream, GenerateOptions, LlmProvider,
    ModelCapabilities, ModelInfo, ProviderKind, Response, StreamChunk, TokenUsage,
};
pub use crate::wayfinder::recovery::{RecoveryConfig, StreamRecovery, FINISH_REASON_RECOVERED};
pub use crate::wayfinder::resilient::{ResilientConfig, ResilientProvider};
pub use crate::wayfinder::retry::{RateLimitConfig, RetryConfig};
pub use crate::wayfinder::session::{
    BranchTree, Conversation, MergeOptions, MergeResult, MergeType, Session, SessionInfo,
};

// Convenience paths for the collaborator contracts and provider modules.
pub use crate::wayfinder::providers;
pub use crate::wayfinder::storage;
pub use crate::wayfinder::vendor;

// Submodules commonly reached by their own name.
pub use crate::wayfinder::catalog;
pub use crate::wayfinder::context;
pub use crate::wayfinder::recovery;

/// Initialise the `env_logger` backend for the `log` facade.
///
/// Safe to call more than once; only the first call installs the logger.
/// Tests and examples call this so `RUST_LOG=debug` output works out of the
/// box.
pub fn init_logger() {
    let _ = env_logger::Builder::from_default_env().try_init();
}
