// LLM provider abstraction
//
// The reflection agent only ever talks to a backend through `LlmProvider`.
// Concrete backends (a local Ollama daemon, a hosted OpenAI-compatible API)
// live in their own modules and are picked by name through the factory.

use async_trait::async_trait;

pub mod error;
pub mod factory;
pub mod ollama;
pub mod openai;
pub mod retry;

pub use error::ProviderError;
pub use factory::{available_providers, create_provider, create_provider_from_entry};
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;

/// Trait for LLM providers
///
/// Implementations must be safe for concurrent use: independent agents may
/// share one provider and call it from different tasks at the same time.
/// Each call is a single stateless request/response exchange; if the
/// transport streams internally, callers still only see the assembled text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a single user prompt to `model` and return the full completion text
    ///
    /// Fails when the backend is unreachable, answers with an error, or
    /// returns a malformed or empty body.
    async fn chat(&self, model: &str, prompt: &str) -> Result<String, ProviderError>;

    /// Confirm that `model` can serve requests on this backend
    async fn validate_model(&self, model: &str) -> Result<(), ProviderError>;

    /// Get the provider name (e.g., "ollama", "openai")
    fn name(&self) -> &str;
}
