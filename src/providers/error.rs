// Provider error taxonomy
//
// Every backend maps its failures onto this enum so the agent can attribute
// them to a stage without knowing which backend produced them.

use thiserror::Error;

/// Failure of a single provider operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request never completed (connection refused, DNS, timeout, ...)
    #[error("request to {provider} failed: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status
    #[error("{provider} API returned {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    /// The body could not be decoded into the expected shape
    #[error("malformed response from {provider}: {reason}")]
    MalformedResponse { provider: String, reason: String },

    /// The backend answered successfully but with no text
    #[error("no response content received from {provider}")]
    EmptyResponse { provider: String },

    /// The requested model cannot serve requests on this backend
    #[error("model {model:?} is not available - {hint}")]
    ModelUnavailable { model: String, hint: String },

    /// Credentials required by a hosted backend are missing
    #[error("missing credentials for {provider}: set {env_var} or add an api_key to the config")]
    MissingCredentials { provider: String, env_var: String },
}

impl ProviderError {
    pub(crate) fn transport(provider: &str, source: reqwest::Error) -> Self {
        Self::Transport {
            provider: provider.to_string(),
            source,
        }
    }

    pub(crate) fn malformed(provider: &str, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn empty(provider: &str) -> Self {
        Self::EmptyResponse {
            provider: provider.to_string(),
        }
    }

    /// Whether retrying the same request might succeed.
    ///
    /// Connection failures, timeouts, rate limits (429) and server errors
    /// (5xx) are transient. Everything else is a property of the request
    /// or the model and will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { source, .. } => source.is_connect() || source.is_timeout(),
            Self::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}
