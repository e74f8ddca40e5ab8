//! Shared vendor-delegating provider implementation.
//!
//! [`VendorAdapter`] carries everything the per-vendor modules have in
//! common: domain ↔ vendor message translation, option mapping, response
//! normalisation, and the structured-output capability gate. The per-vendor
//! modules only differ in their constructors.

use std::sync::Arc;

use async_trait::async_trait;

use crate::wayfinder::catalog;
use crate::wayfinder::error::{LlmError, Result};
use crate::wayfinder::message::Message;
use crate::wayfinder::provider::{
    ChunkStream, GenerateOptions, LlmProvider, ModelInfo, ProviderKind, Response,
};
use crate::wayfinder::vendor::{to_vendor_messages, VendorClient, VendorOptions};

/// A provider adapter delegating all I/O to a [`VendorClient`].
///
/// Immutable after construction; adapter methods fail fast and surface
/// vendor errors unchanged.
pub struct VendorAdapter {
    kind: ProviderKind,
    info: ModelInfo,
    client: Arc<dyn VendorClient>,
}

impl std::fmt::Debug for VendorAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorAdapter")
            .field("kind", &self.kind)
            .field("info", &self.info)
            .finish()
    }
}

impl VendorAdapter {
    /// Bind a vendor client to a provider kind and model.
    pub fn new(kind: ProviderKind, model: &str, client: Arc<dyn VendorClient>) -> Self {
        VendorAdapter {
            kind,
            info: catalog::lookup(kind, model),
            client,
        }
    }

    /// Build the vendor-native parameter bag from the recognised options.
    ///
    /// Only knobs the caller actually set are inserted; vendor clients
    /// silently ignore keys their API has no equivalent for. Raw entries
    /// from `options.extra` are merged last and win on key collision.
    fn vendor_options(&self, options: &GenerateOptions) -> VendorOptions {
        let mut bag = VendorOptions::new();
        bag.insert("model".into(), self.info.name.clone().into());
        if let Some(v) = options.temperature {
            bag.insert("temperature".into(), v.into());
        }
        if let Some(v) = options.max_tokens {
            bag.insert("max_tokens".into(), v.into());
        }
        if let Some(v) = &options.stop_sequences {
            bag.insert("stop_sequences".into(), v.clone().into());
        }
        if let Some(v) = options.top_p {
            bag.insert("top_p".into(), v.into());
        }
        if let Some(v) = options.top_k {
            bag.insert("top_k".into(), v.into());
        }
        if let Some(v) = options.presence_penalty {
            bag.insert("presence_penalty".into(), v.into());
        }
        if let Some(v) = options.frequency_penalty {
            bag.insert("frequency_penalty".into(), v.into());
        }
        if let Some(v) = options.seed {
            bag.insert("seed".into(), v.into());
        }
        if let Some(v) = &options.response_format {
            bag.insert("response_format".into(), v.clone());
        }
        for (key, value) in &options.extra {
            bag.insert(key.clone(), value.clone());
        }
        bag
    }
}

#[async_trait]
impl LlmProvider for VendorAdapter {
    fn provider_name(&self) -> &str {
        self.kind.as_str()
    }

    fn model_info(&self) -> ModelInfo {
        self.info.clone()
    }

    async fn generate_message(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<Response> {
        for message in messages {
            message.validate()?;
        }

        let vendor_messages = to_vendor_messages(messages);
        let bag = self.vendor_options(options);
        let response = self
            .client
            .generate_message(options.cancellation(), &vendor_messages, &bag)
            .await?;

        let model = if response.model.is_empty() {
            self.info.name.clone()
        } else {
            response.model
        };
        Ok(Response {
            content: response.content,
            model,
            usage: response.usage,
            finish_reason: response.finish_reason,
            metadata: response.metadata,
        })
    }

    async fn generate_with_schema(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
        options: &GenerateOptions,
    ) -> Result<serde_json::Value> {
        if !self.info.capabilities.structured_output {
            return Err(LlmError::invalid(format!(
                "model '{}' does not support structured output",
                self.info.name
            )));
        }

        let bag = self.vendor_options(options);
        self.client
            .generate_with_schema(options.cancellation(), prompt, schema, &bag)
            .await
    }

    async fn stream_message(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<ChunkStream> {
        for message in messages {
            message.validate()?;
        }

        let vendor_messages = to_vendor_messages(messages);
        let bag = self.vendor_options(options);
        self.client
            .stream_message(options.cancellation(), &vendor_messages, &bag)
            .await
    }
}
