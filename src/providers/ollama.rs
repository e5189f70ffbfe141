// Ollama provider implementation
//
// Talks to a local (or LAN) Ollama daemon over its native REST API:
// `POST /api/chat` for completions and `GET /api/tags` for installed models.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::retry::with_retry;
use super::{LlmProvider, ProviderError};
use crate::config::constants::{DEFAULT_OLLAMA_HOST, DEFAULT_OLLAMA_PORT};
use crate::config::HttpConfig;

const PROVIDER_NAME: &str = "ollama";

/// Ollama daemon provider
#[derive(Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    max_attempts: u32,
}

impl OllamaProvider {
    /// Create a provider for `base_url`, falling back to `OLLAMA_HOST` and then
    /// `http://127.0.0.1:11434`.
    pub fn new(base_url: Option<String>, http: &HttpConfig) -> Result<Self, ProviderError> {
        let raw = base_url.or_else(|| std::env::var("OLLAMA_HOST").ok());
        let base_url = resolve_host(raw.as_deref());

        let client = Client::builder()
            .timeout(http.timeout())
            .build()
            .map_err(|e| ProviderError::transport(PROVIDER_NAME, e))?;

        tracing::debug!("Ollama provider using {}", base_url);

        Ok(Self {
            client,
            base_url,
            max_attempts: http.max_attempts,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn chat_once(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };
        let url = format!("{}/api/chat", self.base_url);

        tracing::debug!("Sending chat request to Ollama ({} prompt bytes)", prompt.len());

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER_NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(PROVIDER_NAME, e.to_string()))?;

        if let Some(error) = body.error {
            return Err(ProviderError::Api {
                provider: PROVIDER_NAME.to_string(),
                status: status.as_u16(),
                body: error,
            });
        }

        let content = body.message.map(|m| m.content).unwrap_or_default();
        if content.is_empty() {
            return Err(ProviderError::empty(PROVIDER_NAME));
        }

        tracing::debug!("Received {} bytes from Ollama", content.len());
        Ok(content)
    }

    async fn list_models(&self) -> Result<Vec<ModelEntry>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER_NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), body));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(PROVIDER_NAME, e.to_string()))?;

        Ok(tags.models)
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        with_retry(self.max_attempts, || self.chat_once(model, prompt)).await
    }

    async fn validate_model(&self, model: &str) -> Result<(), ProviderError> {
        let models = with_retry(self.max_attempts, || self.list_models()).await?;

        if models.iter().any(|m| model_matches(m, model)) {
            return Ok(());
        }

        Err(ProviderError::ModelUnavailable {
            model: model.to_string(),
            hint: format!("run 'ollama pull {}' to download it", model),
        })
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

/// Normalise an `OLLAMA_HOST`-style value into a base URL.
///
/// Accepts `host`, `host:port`, `scheme://host` and `scheme://host:port`,
/// following the Ollama CLI: without a scheme the port defaults to `11434`,
/// while an explicit `http://` or `https://` defaults to `80` or `443`. A
/// missing host is `127.0.0.1`.
pub fn resolve_host(raw: Option<&str>) -> String {
    let raw = raw.map(str::trim).unwrap_or("").trim_end_matches('/');

    let (scheme, rest, default_port) = match raw.split_once("://") {
        Some(("http", rest)) => ("http", rest, 80),
        Some(("https", rest)) => ("https", rest, 443),
        Some((scheme, rest)) => (scheme, rest, DEFAULT_OLLAMA_PORT),
        None => ("http", raw, DEFAULT_OLLAMA_PORT),
    };

    // Anything after the authority (a path prefix behind a reverse proxy) is kept
    let (authority, path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };

    let authority = if authority.is_empty() {
        format!("{}:{}", DEFAULT_OLLAMA_HOST, default_port)
    } else if has_port(authority) {
        authority.to_string()
    } else {
        format!("{}:{}", authority, default_port)
    };

    format!("{}://{}{}", scheme, authority, path)
}

fn has_port(authority: &str) -> bool {
    // Bracketed IPv6 literals carry colons of their own
    let host_end = authority.rfind(']').unwrap_or(0);
    authority[host_end..]
        .rsplit_once(':')
        .map(|(_, port)| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

/// A model id without a tag refers to its `:latest` tag, as in the Ollama CLI.
fn model_matches(entry: &ModelEntry, requested: &str) -> bool {
    let candidates = [entry.model.as_deref(), entry.name.as_deref()];
    candidates.iter().flatten().any(|installed| {
        *installed == requested
            || (!requested.contains(':') && *installed == format!("{}:latest", requested))
    })
}

fn api_error(status: u16, body: String) -> ProviderError {
    // Ollama reports failures as {"error": "..."}
    let body = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    ProviderError::Api {
        provider: PROVIDER_NAME.to_string(),
        status,
        body,
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}
