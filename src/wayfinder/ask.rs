//! One-shot entry point for CLI/REPL callers.
//!
//! [`Wayfinder`] is the crate facade: given a vendor-client factory it turns
//! a single prompt into a routed, retried, recovery-supervised request and
//! hands back the reply with usage metadata. Conversational state stays with
//! the caller's [`Session`](crate::Session); `ask` is deliberately
//! stateless.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use wayfinder::providers::VendorClientFactory;
//! use wayfinder::{AskOptions, Wayfinder};
//!
//! async fn run(vendors: Arc<dyn VendorClientFactory>) -> Result<(), wayfinder::LlmError> {
//!     let wayfinder = Wayfinder::new(vendors);
//!     let options = AskOptions::new().with_model("anthropic/claude-3-5-sonnet-latest");
//!     let result = wayfinder.ask("Why is the sky blue?", &options).await?;
//!     println!("[{}] {}", result.model, result.content);
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::wayfinder::error::{LlmError, Result};
use crate::wayfinder::message::{Attachment, Message, Role};
use crate::wayfinder::provider::{parse_model_id, GenerateOptions, LlmProvider, TokenUsage};
use crate::wayfinder::providers::factory::{create_provider, VendorClientFactory};
use crate::wayfinder::recovery::{RecoveryConfig, StreamRecovery};
use crate::wayfinder::resilient::{ResilientConfig, ResilientProvider};

/// Model used when the caller names none.
pub const DEFAULT_MODEL_ID: &str = "openai/gpt-3.5-turbo";

/// Options accepted by [`Wayfinder::ask`].
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    /// Target model as `provider/model`; a bare model name defaults the
    /// provider to OpenAI, and no model at all means
    /// [`DEFAULT_MODEL_ID`].
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Route the request through the streaming path (with recovery) instead
    /// of a single completion call.
    pub stream: bool,
    pub system_prompt: Option<String>,
    pub response_format: Option<serde_json::Value>,
    /// Raw provider-specific parameters passed through unchanged.
    pub provider_options: HashMap<String, serde_json::Value>,
    /// Explicit API key; overrides the provider's environment variable.
    pub api_key: Option<String>,
    pub cancel: Option<CancellationToken>,
}

impl AskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_response_format(mut self, format: serde_json::Value) -> Self {
        self.response_format = Some(format);
        self
    }

    pub fn with_provider_option(
        mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.provider_options.insert(key.into(), value);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Outcome of a one-shot request.
#[derive(Debug, Clone)]
pub struct AskResult {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
}

/// Facade assembling the provider chain for one-shot requests.
pub struct Wayfinder {
    vendors: Arc<dyn VendorClientFactory>,
    resilient: ResilientConfig,
    recovery: RecoveryConfig,
}

impl Wayfinder {
    pub fn new(vendors: Arc<dyn VendorClientFactory>) -> Self {
        Wayfinder {
            vendors,
            resilient: ResilientConfig::default(),
            recovery: RecoveryConfig::default(),
        }
    }

    pub fn with_resilient_config(mut self, config: ResilientConfig) -> Self {
        self.resilient = config;
        self
    }

    pub fn with_recovery_config(mut self, config: RecoveryConfig) -> Self {
        self.recovery = config;
        self
    }

    /// Route a prompt to a provider and return the complete reply.
    ///
    /// An empty prompt is an error; use
    /// [`ask_with_attachments`](Wayfinder::ask_with_attachments) when
    /// attachments carry the payload.
    pub async fn ask(&self, prompt: &str, options: &AskOptions) -> Result<AskResult> {
        if prompt.trim().is_empty() {
            return Err(LlmError::invalid("prompt must not be empty"));
        }
        self.ask_with_attachments(prompt, Vec::new(), options).await
    }

    /// Like [`ask`](Wayfinder::ask), but the prompt may be empty when at
    /// least one attachment is present.
    pub async fn ask_with_attachments(
        &self,
        prompt: &str,
        attachments: Vec<Attachment>,
        options: &AskOptions,
    ) -> Result<AskResult> {
        if prompt.trim().is_empty() && attachments.is_empty() {
            return Err(LlmError::invalid(
                "prompt must not be empty without attachments",
            ));
        }

        let model_id = options.model.as_deref().unwrap_or(DEFAULT_MODEL_ID);
        let (kind, model) = parse_model_id(model_id)?;
        debug!("ask: routing to {}/{}", kind.as_str(), model);

        let provider = create_provider(
            self.vendors.as_ref(),
            kind,
            Some(&model),
            options.api_key.as_deref(),
        )?;
        let resilient: Arc<dyn LlmProvider> = Arc::new(
            ResilientProvider::new(provider).with_config(self.resilient.clone()),
        );

        let mut messages = Vec::new();
        if let Some(system_prompt) = &options.system_prompt {
            messages.push(Message::system(system_prompt.clone()));
        }
        messages.push(Message::with_attachments(
            Role::User,
            prompt,
            attachments,
        ));

        let mut generate_options = GenerateOptions::new();
        generate_options.temperature = options.temperature;
        generate_options.max_tokens = options.max_tokens;
        generate_options.response_format = options.response_format.clone();
        generate_options.cancel = options.cancel.clone();
        for (key, value) in &options.provider_options {
            generate_options.extra.insert(key.clone(), value.clone());
        }

        if options.stream {
            let recovery =
                StreamRecovery::new(resilient.clone()).with_config(self.recovery.clone());
            let mut stream = recovery.stream_message(&messages, &generate_options).await?;

            let mut content = String::new();
            let mut finish_reason = None;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                content.push_str(&chunk.content);
                if chunk.finish_reason.is_some() {
                    finish_reason = chunk.finish_reason;
                }
            }

            Ok(AskResult {
                content,
                provider: kind.as_str().to_string(),
                model,
                usage: None,
                finish_reason,
            })
        } else {
            let response = resilient
                .generate_message(&messages, &generate_options)
                .await?;
            Ok(AskResult {
                content: response.content,
                provider: kind.as_str().to_string(),
                model: response.model,
                usage: response.usage,
                finish_reason: response.finish_reason,
            })
        }
    }
}
