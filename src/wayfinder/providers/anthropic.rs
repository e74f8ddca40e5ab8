//! Anthropic provider built on the shared vendor adapter.
//!
//! Swapping from OpenAI to Anthropic only requires a different constructor;
//! the `ANTHROPIC_API_KEY` environment variable supplies the credential when
//! none is given explicitly.

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

/// Provider adapter for Anthropic Claude models.
#[derive(Debug)]
pub struct AnthropicProvider {
    inner: VendorAdapter,
}

impl AnthropicProvider {
    /// Create a provider bound to the default Claude model.
    pub fn new(client: Arc<dyn VendorClient>, api_key: Option<&str>) -> Result<Self> {
        Self::new_with_model(
            client,
            api_key,
            catalog::default_model(ProviderKind::Anthropic),
        )
    }

    /// Create a provider bound to an explicit model name.
    pub fn new_with_model(
        client: Arc<dyn VendorClient>,
        api_key: Option<&str>,
        model: &str,
    ) -> Result<Self> {
        let key = resolve_api_key(ProviderKind::Anthropic, api_key)?;
        debug!(
            "anthropic provider ready: model={} key={}",
            model,
            sanitize_key(&key)
        );
        Ok(AnthropicProvider {
            inner: VendorAdapter::new(ProviderKind::Anthropic, model, client),
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
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
