// Provider entry — which backend to talk to and how to reach it

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::providers::factory::PROVIDER_NAMES;

/// A single provider entry.
///
/// Serializes with a `type` tag, e.g.:
/// ```toml
/// [provider]
/// type = "ollama"
/// base_url = "http://127.0.0.1:11434"
///
/// [provider]
/// type = "openai"
/// api_key = "sk-..."
/// ```
///
/// Fields left out are resolved from the environment by the provider itself
/// (`OLLAMA_HOST`, `OPENAI_API_KEY`, `OPENAI_BASE_URL`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderEntry {
    Ollama {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    Openai {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
}

impl Default for ProviderEntry {
    fn default() -> Self {
        Self::Ollama { base_url: None }
    }
}

impl ProviderEntry {
    /// Entry with every field left to environment resolution, by provider name.
    ///
    /// Names are matched case-insensitively.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama { base_url: None }),
            "openai" => Ok(Self::Openai {
                api_key: None,
                base_url: None,
            }),
            _ => bail!(
                "Unknown provider: '{}'. Expected one of: {}",
                name,
                PROVIDER_NAMES.join(", ")
            ),
        }
    }

    /// Short provider-type tag (e.g. "ollama", "openai").
    pub fn provider_type(&self) -> &'static str {
        match self {
            Self::Ollama { .. } => "ollama",
            Self::Openai { .. } => "openai",
        }
    }
}
