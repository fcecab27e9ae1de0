//! LLM provider implementations for repolens.
//!
//! All providers implement the `repolens_core::Provider` trait. The agent
//! only relies on the function-calling protocol, so one OpenAI-compatible
//! provider covers OpenAI, Azure-style proxies, OpenRouter, vLLM and Ollama.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use repolens_config::LlmConfig;
use repolens_core::ProviderError;
use std::sync::Arc;

/// Build the configured provider.
pub fn build_from_config(
    config: &LlmConfig,
) -> Result<Arc<dyn repolens_core::Provider>, ProviderError> {
    Ok(Arc::new(OpenAiCompatProvider::from_config(config)?))
}
