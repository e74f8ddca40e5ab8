//! OpenAI provider built on the shared vendor adapter.
//!
//! Credential resolution consults an explicit key first, then the
//! `OPENAI_API_KEY` environment variable. The heavy lifting lives in
//! [`VendorAdapter`]; this module only binds the provider identity and
//! catalogue defaults.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use wayfinder::providers::openai::OpenAiProvider;
//! use wayfinder::vendor::VendorClient;
//!
//! fn build(client: Arc<dyn VendorClient>) -> Result<OpenAiProvider, wayfinder::LlmError> {
//!     // Reads OPENAI_API_KEY when no explicit key is given.
//!     OpenAiProvider::new_with_model(client, None, "gpt-4o")
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::wayfinder::catalog;
use crate::wayfinder::error::Result;
use crate::wayfinder::message::Message;
use crate::wayfinder::provider::{
    ChunkStream, GenerateOptions, LlmProvider, ModelInfo, ProviderKind, Response,
};
use crate::wayfinder::providers::adapter::VendorAdapter;
use crate::wayfinder::providers::factory::{resolve_api_key, sanitize_key};
use crate::wayfinder::vendor::VendorClient;

/// Provider adapter for OpenAI chat models.
pub struct OpenAiProvider {
    inner: VendorAdapter,
}

impl OpenAiProvider {
    /// Create a provider bound to the default OpenAI model.
    pub fn new(client: Arc<dyn VendorClient>, api_key: Option<&str>) -> Result<Self> {
        Self::new_with_model(client, api_key, catalog::default_model(ProviderKind::OpenAi))
    }

    /// Create a provider bound to an explicit model name.
    pub fn new_with_model(
        client: Arc<dyn VendorClient>,
        api_key: Option<&str>,
        model: &str,
    ) -> Result<Self> {
        let key = resolve_api_key(ProviderKind::OpenAi, api_key)?;
        debug!(
            "openai provider ready: model={} key={}",
            model,
            sanitize_key(&key)
        );
        Ok(OpenAiProvider {
            inner: VendorAdapter::new(ProviderKind::OpenAi, model, client),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_info(&self) -> ModelInfo {
        self.inner.model_info()
    }

    async fn generate_message(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<Response> {
        self.inner.generate_message(messages, options).await
    }

    async fn generate_with_schema(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
        options: &GenerateOptions,
    ) -> Result<serde_json::Value> {
        self.inner.generate_with_schema(prompt, schema, options).await
    }

    async fn stream_message(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<ChunkStream> {
        self.inner.stream_message(messages, options).await
    }
}
