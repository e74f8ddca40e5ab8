//! Provider implementations and construction helpers.
//!
//! Each remote vendor gets a thin module that binds a provider name, a
//! credential environment variable, and catalogue defaults around the shared
//! [`VendorAdapter`](adapter::VendorAdapter). The [`mock`] module hosts the
//! in-process provider used for tests and offline runs; [`factory`] resolves
//! credentials and assembles providers behind the
//! [`LlmProvider`](crate::LlmProvider) interface.

pub mod adapter;
pub mod anthropic;
pub mod factory;
pub mod gemini;
pub mod mock;
pub mod openai;

pub use adapter::VendorAdapter;
pub use factory::{create_provider, resolve_api_key, sanitize_key, VendorClientFactory};
pub use mock::MockProvider;
