use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use wayfinder::providers::mock::MockProvider;
use wayfinder::{
    GenerateOptions, LlmError, LlmProvider, Message, ModelCapabilities, ResilientConfig,
    ResilientProvider, StreamChunk,
};

fn unavailable() -> LlmError {
    LlmError::unavailable("upstream 503")
}

fn messages(count: usize) -> Vec<Message> {
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                Message::user(format!("question {}", i))
            } else {
                Message::assistant(format!("answer {}", i))
            }
        })
        .collect()
}

#[tokio::test]
async fn test_non_retryable_error_makes_exactly_one_attempt() {
    let primary = Arc::new(MockProvider::new());
    primary.push_error(LlmError::Authentication("bad key".to_string()));

    let provider = ResilientProvider::new(primary.clone());
    let result = provider
        .generate_message(&messages(1), &GenerateOptions::new())
        .await;

    assert!(matches!(result, Err(LlmError::Authentication(_))));
    assert_eq!(primary.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retryable_error_respects_the_budget() {
    let primary = Arc::new(MockProvider::new());
    for _ in 0..4 {
        primary.push_error(unavailable());
    }

    let provider = ResilientProvider::new(primary.clone());
    let result = provider
        .generate_message(&messages(1), &GenerateOptions::new())
        .await;

    // max_retries = 3 means at most 4 attempts.
    assert!(matches!(result, Err(LlmError::ProviderUnavailable(_))));
    assert_eq!(primary.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_retry_succeeds_after_transient_failures() {
    let primary = Arc::new(MockProvider::new());
    primary.push_error(unavailable());
    primary.push_error(LlmError::network("connection reset"));
    primary.push_reply("third time lucky");

    let provider = ResilientProvider::new(primary.clone());
    let response = provider
        .generate_message(&messages(1), &GenerateOptions::new())
        .await
        .unwrap();

    assert_eq!(response.content, "third time lucky");
    assert_eq!(primary.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_uses_the_dedicated_ladder() {
    let primary = Arc::new(MockProvider::new());
    for _ in 0..3 {
        primary.push_error(LlmError::RateLimited("429".to_string()));
    }
    primary.push_reply("served at last");

    let provider = ResilientProvider::new(primary.clone());
    let start = tokio::time::Instant::now();
    let response = provider
        .generate_message(&messages(1), &GenerateOptions::new())
        .await
        .unwrap();

    // Exactly 1 + 3 attempts, with 10 + 20 + 40 seconds of backoff.
    assert_eq!(response.content, "served at last");
    assert_eq!(primary.call_count(), 4);
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert!(start.elapsed() >= Duration::from_secs(70));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_budget_exhaustion_surfaces_the_error() {
    let primary = Arc::new(MockProvider::new());
    for _ in 0..4 {
        primary.push_error(LlmError::RateLimited("429".to_string()));
    }

    let provider = ResilientProvider::new(primary.clone());
    let result = provider
        .generate_message(&messages(1), &GenerateOptions::new())
        .await;

    assert!(matches!(result, Err(LlmError::RateLimited(_))));
    assert_eq!(primary.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_fallback_is_tried_in_order_with_a_full_budget() {
    let primary = Arc::new(MockProvider::new());
    for _ in 0..4 {
        primary.push_error(unavailable());
    }
    let fallback = Arc::new(MockProvider::new());
    fallback.push_reply("fallback wins");

    let fallbacks: Vec<Arc<dyn LlmProvider>> = vec![fallback.clone()];
    let provider = ResilientProvider::new(primary.clone()).with_fallbacks(fallbacks);
    let response = provider
        .generate_message(&messages(1), &GenerateOptions::new())
        .await
        .unwrap();

    assert_eq!(response.content, "fallback wins");
    assert_eq!(primary.call_count(), 4);
    assert_eq!(fallback.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fallback_can_be_disabled() {
    let primary = Arc::new(MockProvider::new());
    for _ in 0..4 {
        primary.push_error(unavailable());
    }
    let fallback = Arc::new(MockProvider::new());

    let config = ResilientConfig {
        fallback_enabled: false,
        ..Default::default()
    };
    let fallbacks: Vec<Arc<dyn LlmProvider>> = vec![fallback.clone()];
    let provider = ResilientProvider::new(primary.clone())
        .with_fallbacks(fallbacks)
        .with_config(config);

    let result = provider
        .generate_message(&messages(1), &GenerateOptions::new())
        .await;
    assert!(result.is_err());
    assert_eq!(fallback.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_schema_calls_skip_incapable_fallbacks() {
    let primary = Arc::new(MockProvider::new());
    for _ in 0..4 {
        primary.push_error(unavailable());
    }
    let incapable = Arc::new(MockProvider::new().with_capabilities(ModelCapabilities::text_only()));
    let capable = Arc::new(MockProvider::new());
    capable.push_reply("{\"answer\": 42}");

    let fallbacks: Vec<Arc<dyn LlmProvider>> = vec![incapable.clone(), capable.clone()];
    let provider = ResilientProvider::new(primary.clone()).with_fallbacks(fallbacks);

    let schema = serde_json::json!({"type": "object"});
    let value = provider
        .generate_with_schema("give me json", &schema, &GenerateOptions::new())
        .await
        .unwrap();

    assert_eq!(value, serde_json::json!({"answer": 42}));
    assert_eq!(incapable.call_count(), 0);
    assert_eq!(capable.call_count(), 1);
}

#[tokio::test]
async fn test_context_too_long_prunes_to_the_last_exchange() {
    let primary = Arc::new(MockProvider::new());
    primary.push_error(LlmError::ContextTooLong("too many tokens".to_string()));
    primary.push_reply("fits now");

    let provider = ResilientProvider::new(primary.clone());
    let response = provider
        .generate_message(&messages(6), &GenerateOptions::new())
        .await
        .unwrap();

    assert_eq!(response.content, "fits now");
    // First attempt saw all six messages, the pruned retry only the final two.
    assert_eq!(primary.message_counts(), vec![6, 2]);
}

#[tokio::test]
async fn test_context_too_long_with_two_messages_is_terminal() {
    let primary = Arc::new(MockProvider::new());
    primary.push_error(LlmError::ContextTooLong("too many tokens".to_string()));

    let provider = ResilientProvider::new(primary.clone());
    let result = provider
        .generate_message(&messages(2), &GenerateOptions::new())
        .await;

    assert!(matches!(result, Err(LlmError::ContextTooLong(_))));
    assert_eq!(primary.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_calls_hit_the_timeout_envelope() {
    let primary = Arc::new(MockProvider::new());
    for _ in 0..4 {
        primary.push_hang();
    }

    let config = ResilientConfig {
        timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let provider = ResilientProvider::new(primary.clone()).with_config(config);
    let result = provider
        .generate_message(&messages(1), &GenerateOptions::new())
        .await;

    assert!(matches!(result, Err(LlmError::Timeout(_))));
    assert_eq!(primary.call_count(), 4);
}

#[tokio::test]
async fn test_cancellation_aborts_before_any_attempt() {
    let primary = Arc::new(MockProvider::new());
    let token = CancellationToken::new();
    token.cancel();

    let provider = ResilientProvider::new(primary.clone());
    let options = GenerateOptions::new().with_cancellation(token);
    let result = provider.generate_message(&messages(1), &options).await;

    assert!(matches!(result, Err(LlmError::Cancelled)));
    assert_eq!(primary.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stream_open_is_retried() {
    let primary = Arc::new(MockProvider::new());
    primary.push_stream_error(unavailable());
    primary.push_stream(vec![
        Ok(StreamChunk::content("partial ", 0)),
        Ok(StreamChunk::content("stream", 1)),
        Ok(StreamChunk::finish(2, "stop")),
    ]);

    let provider = ResilientProvider::new(primary.clone());
    let mut stream = provider
        .stream_message(&messages(1), &GenerateOptions::new())
        .await
        .unwrap();

    let mut content = String::new();
    while let Some(chunk) = stream.next().await {
        content.push_str(&chunk.unwrap().content);
    }
    assert_eq!(content, "partial stream");
    assert_eq!(primary.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stream_open_exhaustion_surfaces_last_cause() {
    let primary = Arc::new(MockProvider::new());
    for _ in 0..4 {
        primary.push_stream_error(unavailable());
    }

    let config = ResilientConfig {
        fallback_enabled: false,
        ..Default::default()
    };
    let provider = ResilientProvider::new(primary.clone()).with_config(config);
    let result = provider
        .stream_message(&messages(1), &GenerateOptions::new())
        .await;

    assert!(matches!(result, Err(LlmError::ProviderUnavailable(_))));
    assert_eq!(primary.call_count(), 4);
}

#[tokio::test]
async fn test_wrapped_stream_surfaces_cancellation() {
    let primary = Arc::new(MockProvider::new());
    primary.push_stream(vec![
        Ok(StreamChunk::content("never ", 0)),
        Ok(StreamChunk::content("seen", 1)),
    ]);

    let token = CancellationToken::new();
    let provider = ResilientProvider::new(primary);
    let options = GenerateOptions::new().with_cancellation(token.clone());
    let mut stream = provider
        .stream_message(&messages(1), &options)
        .await
        .unwrap();

    token.cancel();
    // The final element delivered before close carries the cancellation.
    let mut last = None;
    while let Some(item) = stream.next().await {
        last = Some(item);
    }
    assert!(matches!(last, Some(Err(LlmError::Cancelled))));
}
