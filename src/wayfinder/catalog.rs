//! Static model catalogue.
//!
//! A lookup table from canonical `provider/model` identifiers to
//! [`ModelInfo`]. Unknown models fall back to a conservative text-only entry
//! with the default 4096-token context window, so lookups never fail.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::wayfinder::provider::{ModelCapabilities, ModelInfo, ProviderKind};

/// Context window assumed for models missing from the catalogue.
pub const DEFAULT_CONTEXT_WINDOW: u32 = 4096;

fn entry(
    kind: ProviderKind,
    name: &str,
    display_name: &str,
    max_output_tokens: u32,
    context_window: u32,
    capabilities: ModelCapabilities,
) -> (String, ModelInfo) {
    (
        format!("{}/{}", kind.as_str(), name),
        ModelInfo {
            provider: kind.as_str().to_string(),
            name: name.to_string(),
            display_name: display_name.to_string(),
            max_output_tokens,
            context_window,
            capabilities,
        },
    )
}

fn text_structured() -> ModelCapabilities {
    ModelCapabilities {
        text: true,
        structured_output: true,
        ..Default::default()
    }
}

fn multimodal_structured() -> ModelCapabilities {
    ModelCapabilities {
        text: true,
        image: true,
        structured_output: true,
        ..Default::default()
    }
}

lazy_static! {
    static ref CATALOG: HashMap<String, ModelInfo> = {
        use ProviderKind::*;

        let mut caps_gemini = multimodal_structured();
        caps_gemini.audio = true;
        caps_gemini.video = true;
        caps_gemini.file = true;

        let caps_claude = ModelCapabilities {
            text: true,
            image: true,
            ..Default::default()
        };

        let caps_mock = ModelCapabilities {
            text: true,
            image: true,
            audio: true,
            video: true,
            file: true,
            structured_output: true,
        };

        vec![
            entry(OpenAi, "gpt-3.5-turbo", "GPT-3.5 Turbo", 4096, 16385, text_structured()),
            entry(OpenAi, "gpt-4", "GPT-4", 8192, 8192, text_structured()),
            entry(OpenAi, "gpt-4-turbo", "GPT-4 Turbo", 4096, 128_000, multimodal_structured()),
            entry(OpenAi, "gpt-4o", "GPT-4o", 16384, 128_000, multimodal_structured()),
            entry(OpenAi, "gpt-4o-mini", "GPT-4o mini", 16384, 128_000, multimodal_structured()),
            entry(OpenAi, "gpt-4.1", "GPT-4.1", 32768, 1_047_576, multimodal_structured()),
            entry(Anthropic, "claude-3-opus-20240229", "Claude 3 Opus", 4096, 200_000, caps_claude),
            entry(Anthropic, "claude-3-haiku-20240307", "Claude 3 Haiku", 4096, 200_000, caps_claude),
            entry(Anthropic, "claude-3-5-sonnet-latest", "Claude 3.5 Sonnet", 8192, 200_000, caps_claude),
            entry(Anthropic, "claude-3-5-haiku-latest", "Claude 3.5 Haiku", 8192, 200_000, caps_claude),
            entry(Gemini, "gemini-1.5-pro", "Gemini 1.5 Pro", 8192, 2_097_152, caps_gemini),
            entry(Gemini, "gemini-1.5-flash", "Gemini 1.5 Flash", 8192, 1_048_576, caps_gemini),
            entry(Gemini, "gemini-2.0-flash", "Gemini 2.0 Flash", 8192, 1_048_576, caps_gemini),
            entry(Mock, "mock-model", "Mock Model", 4096, 8192, caps_mock),
        ]
        .into_iter()
        .collect()
    };
}

/// Look up a model, falling back to a text-only entry with the default
/// context window when the model is not in the table.
pub fn lookup(kind: ProviderKind, model: &str) -> ModelInfo {
    let key = format!("{}/{}", kind.as_str(), model);
    CATALOG.get(&key).cloned().unwrap_or_else(|| ModelInfo {
        provider: kind.as_str().to_string(),
        name: model.to_string(),
        display_name: model.to_string(),
        max_output_tokens: 2048,
        context_window: DEFAULT_CONTEXT_WINDOW,
        capabilities: ModelCapabilities::text_only(),
    })
}

/// The model used when the caller names only a provider.
pub fn default_model(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi => "gpt-3.5-turbo",
        ProviderKind::Anthropic => "claude-3-5-sonnet-latest",
        ProviderKind::Gemini => "gemini-1.5-flash",
        ProviderKind::Mock => "mock-model",
    }
}
