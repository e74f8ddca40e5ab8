use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use wayfinder::providers::VendorClientFactory;
use wayfinder::vendor::{VendorClient, VendorMessage, VendorOptions, VendorResponse};
use wayfinder::{
    AskOptions, Attachment, AttachmentKind, ChunkStream, LlmError, ProviderKind, Result,
    StreamChunk, TokenUsage, Wayfinder,
};

struct StubVendor {
    model: String,
}

#[async_trait]
impl VendorClient for StubVendor {
    async fn generate_message(
        &self,
        _cancel: CancellationToken,
        _messages: &[VendorMessage],
        _options: &VendorOptions,
    ) -> Result<VendorResponse> {
        Ok(VendorResponse {
            content: "stub reply".to_string(),
            model: self.model.clone(),
            usage: Some(TokenUsage::new(20, 4)),
            finish_reason: Some("stop".to_string()),
            metadata: HashMap::new(),
        })
    }

    async fn generate_with_schema(
        &self,
        _cancel: CancellationToken,
        _prompt: &str,
        _schema: &serde_json::Value,
        _options: &VendorOptions,
    ) -> Result<serde_json::Value> {
        Ok(serde_json::json!({"stub": true}))
    }

    async fn stream_message(
        &self,
        _cancel: CancellationToken,
        _messages: &[VendorMessage],
        _options: &VendorOptions,
    ) -> Result<ChunkStream> {
        let chunks = vec![
            Ok(StreamChunk::content("stub ", 0)),
            Ok(StreamChunk::content("stream", 1)),
            Ok(StreamChunk::finish(2, "stop")),
        ];
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }
}

struct StubFactory;

impl VendorClientFactory for StubFactory {
    fn create(
        &self,
        _kind: ProviderKind,
        _api_key: &str,
        model: &str,
    ) -> Result<Arc<dyn VendorClient>> {
        Ok(Arc::new(StubVendor {
            model: model.to_string(),
        }))
    }
}

fn wayfinder() -> Wayfinder {
    Wayfinder::new(Arc::new(StubFactory))
}

#[tokio::test]
async fn test_empty_prompt_is_rejected() {
    let result = wayfinder().ask("", &AskOptions::new()).await;
    assert!(matches!(result, Err(LlmError::InvalidParameters(_))));

    let result = wayfinder().ask("   ", &AskOptions::new()).await;
    assert!(matches!(result, Err(LlmError::InvalidParameters(_))));
}

#[tokio::test]
async fn test_empty_prompt_with_attachments_is_accepted() {
    let options = AskOptions::new().with_model("mock/mock-model");
    let attachments = vec![Attachment::from_url(
        AttachmentKind::Image,
        "https://example.com/chart.png",
    )];

    let result = wayfinder()
        .ask_with_attachments("", attachments, &options)
        .await
        .unwrap();
    assert!(!result.content.is_empty());
    assert_eq!(result.provider, "mock");
}

#[tokio::test]
async fn test_no_attachments_and_no_prompt_is_rejected() {
    let options = AskOptions::new().with_model("mock/mock-model");
    let result = wayfinder()
        .ask_with_attachments("", Vec::new(), &options)
        .await;
    assert!(matches!(result, Err(LlmError::InvalidParameters(_))));
}

#[tokio::test]
async fn test_default_model_is_openai_gpt_35_turbo() {
    let options = AskOptions::new().with_api_key("sk-unit-test-key-123");
    let result = wayfinder().ask("hello", &options).await.unwrap();

    assert_eq!(result.provider, "openai");
    assert_eq!(result.model, "gpt-3.5-turbo");
    assert_eq!(result.content, "stub reply");
    assert_eq!(result.finish_reason.as_deref(), Some("stop"));
    assert_eq!(result.usage.as_ref().map(|u| u.total_tokens), Some(24));
}

#[tokio::test]
async fn test_bare_model_name_defaults_to_openai() {
    let options = AskOptions::new()
        .with_model("gpt-4o")
        .with_api_key("sk-unit-test-key-123");
    let result = wayfinder().ask("hello", &options).await.unwrap();

    assert_eq!(result.provider, "openai");
    assert_eq!(result.model, "gpt-4o");
}

#[tokio::test]
async fn test_unknown_provider_is_rejected() {
    let options = AskOptions::new().with_model("acme/frontier-9000");
    let result = wayfinder().ask("hello", &options).await;
    assert!(matches!(result, Err(LlmError::InvalidParameters(_))));
}

#[tokio::test]
async fn test_mock_provider_needs_no_credentials() {
    let options = AskOptions::new().with_model("mock/mock-model");
    let result = wayfinder().ask("hello", &options).await.unwrap();

    assert_eq!(result.provider, "mock");
    assert_eq!(result.content, "This is a mock response.");
}

#[tokio::test]
async fn test_streaming_ask_concatenates_chunks() {
    let options = AskOptions::new()
        .with_model("gpt-4o")
        .with_api_key("sk-unit-test-key-123")
        .with_stream(true);
    let result = wayfinder().ask("hello", &options).await.unwrap();

    assert_eq!(result.content, "stub stream");
    assert_eq!(result.finish_reason.as_deref(), Some("stop"));
    // Streaming responses carry no usage accounting.
    assert!(result.usage.is_none());
}

#[tokio::test]
async fn test_system_prompt_and_options_are_forwarded() {
    let options = AskOptions::new()
        .with_model("mock/mock-model")
        .with_system_prompt("You are a pirate.")
        .with_temperature(0.1)
        .with_max_tokens(64);
    let result = wayfinder().ask("ahoy", &options).await.unwrap();
    assert_eq!(result.provider, "mock");
}
