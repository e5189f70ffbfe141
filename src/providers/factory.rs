// Provider factory
//
// Creates LLM providers by name or from a configured provider entry

use anyhow::{Context, Result};
use std::sync::Arc;

use super::ollama::OllamaProvider;
use super::openai::OpenAIProvider;
use super::LlmProvider;
use crate::config::{HttpConfig, ProviderEntry};

/// Names accepted by [`create_provider`], in display order.
pub const PROVIDER_NAMES: &[&str] = &["ollama", "openai"];

/// Names of every backend the factory can build
pub fn available_providers() -> &'static [&'static str] {
    PROVIDER_NAMES
}

/// Create a provider by name, resolving its settings from the environment.
///
/// Names are matched case-insensitively.
pub fn create_provider(name: &str, http: &HttpConfig) -> Result<Arc<dyn LlmProvider>> {
    let entry = ProviderEntry::from_name(name)?;
    create_provider_from_entry(&entry, http)
}

/// Create a provider from a configured entry.
///
/// Fields the entry leaves out are resolved from the environment by the
/// provider constructor.
pub fn create_provider_from_entry(
    entry: &ProviderEntry,
    http: &HttpConfig,
) -> Result<Arc<dyn LlmProvider>> {
    match entry {
        ProviderEntry::Ollama { base_url } => {
            let provider = OllamaProvider::new(base_url.clone(), http)
                .context("Failed to create Ollama provider")?;
            Ok(Arc::new(provider))
        }

        ProviderEntry::Openai { api_key, base_url } => {
            let provider = OpenAIProvider::new(api_key.clone(), base_url.clone(), http)
                .context("Failed to create OpenAI provider")?;
            Ok(Arc::new(provider))
        }
    }
}
