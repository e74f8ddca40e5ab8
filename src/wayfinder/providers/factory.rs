//! Provider construction: credential resolution and assembly.
//!
//! The factory resolves credentials in a fixed order (an explicit argument,
//! then the provider's environment variable) and wires a vendor client from
//! the injected [`VendorClientFactory`] into the right adapter. The mock
//! provider requires no credential and no vendor client.

use std::sync::Arc;

use crate::wayfinder::catalog;
use crate::wayfinder::error::{LlmError, Result};
use crate::wayfinder::provider::{LlmProvider, ProviderKind};
use crate::wayfinder::providers::anthropic::AnthropicProvider;
use crate::wayfinder::providers::gemini::GeminiProvider;
use crate::wayfinder::providers::mock::MockProvider;
use crate::wayfinder::providers::openai::OpenAiProvider;
use crate::wayfinder::vendor::VendorClient;

/// Collaborator that constructs vendor SDK clients.
///
/// The crate owns no HTTP; callers supply a factory producing transport
/// clients for each provider they intend to route to.
pub trait VendorClientFactory: Send + Sync {
    fn create(
        &self,
        kind: ProviderKind,
        api_key: &str,
        model: &str,
    ) -> Result<Arc<dyn VendorClient>>;
}

/// Resolve the API key for a provider.
///
/// Consults, in order: the explicit argument, then the provider's
/// environment variable. The mock provider resolves to an empty key. A
/// missing credential for any other provider fails with an error naming the
/// expected environment variable.
pub fn resolve_api_key(kind: ProviderKind, explicit: Option<&str>) -> Result<String> {
    let env_var = match kind.api_key_env() {
        Some(var) => var,
        None => return Ok(String::new()),
    };

    if let Some(key) = explicit {
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }

    match std::env::var(env_var) {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(LlmError::Authentication(format!(
            "no API key for provider '{}'; set the {} environment variable",
            kind.as_str(),
            env_var
        ))),
    }
}

/// Redact an API key for log output.
///
/// # Example
///
/// ```rust
/// use wayfinder::providers::sanitize_key;
///
/// assert_eq!(sanitize_key("abc"), "***");
/// assert_eq!(sanitize_key("shortkey"), "***");
/// assert_eq!(sanitize_key("sk-1234567890abcdef"), "sk-1...cdef");
/// ```
pub fn sanitize_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    // Below 12 chars the head and tail slices would leak most of the key.
    if chars.len() < 12 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Assemble a provider behind the [`LlmProvider`] interface.
///
/// `model` defaults to the provider's catalogue default when absent;
/// `api_key` follows the resolution order of [`resolve_api_key`].
pub fn create_provider(
    factory: &dyn VendorClientFactory,
    kind: ProviderKind,
    model: Option<&str>,
    api_key: Option<&str>,
) -> Result<Arc<dyn LlmProvider>> {
    let model = model.unwrap_or_else(|| catalog::default_model(kind));

    if kind == ProviderKind::Mock {
        return Ok(Arc::new(MockProvider::with_model(model)));
    }

    let key = resolve_api_key(kind, api_key)?;
    let client = factory.create(kind, &key, model)?;
    match kind {
        ProviderKind::OpenAi => Ok(Arc::new(OpenAiProvider::new_with_model(
            client,
            Some(&key),
            model,
        )?)),
        ProviderKind::Anthropic => Ok(Arc::new(AnthropicProvider::new_with_model(
            client,
            Some(&key),
            model,
        )?)),
        ProviderKind::Gemini => Ok(Arc::new(GeminiProvider::new_with_model(
            client,
            Some(&key),
            model,
        )?)),
        ProviderKind::Mock => Ok(Arc::new(MockProvider::with_model(model))),
    }
}
