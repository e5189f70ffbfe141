// OpenAI API provider implementation
//
// Works for OpenAI and any server exposing the same `/v1/chat/completions`
// endpoint (vLLM, LM Studio, Groq, ...). Models are checked against the
// `/v1/models` listing, or with a short chat request where there is none.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::retry::with_retry;
use super::{LlmProvider, ProviderError};
use crate::config::constants::DEFAULT_OPENAI_BASE_URL;
use crate::config::HttpConfig;

const PROVIDER_NAME: &str = "openai";
const API_KEY_ENV: &str = "OPENAI_API_KEY";
const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// OpenAI-compatible API provider
#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    max_attempts: u32,
}

impl OpenAIProvider {
    /// Create a provider, resolving missing settings from `OPENAI_API_KEY`
    /// and `OPENAI_BASE_URL`.
    pub fn new(
        api_key: Option<String>,
        base_url: Option<String>,
        http: &HttpConfig,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::MissingCredentials {
                provider: PROVIDER_NAME.to_string(),
                env_var: API_KEY_ENV.to_string(),
            })?;

        let base_url = base_url
            .or_else(|| std::env::var(BASE_URL_ENV).ok())
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

        Self::with_settings(api_key, base_url, http)
    }

    /// Create a provider with explicit settings, ignoring the environment
    pub fn with_settings(
        api_key: String,
        base_url: String,
        http: &HttpConfig,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(http.timeout())
            .build()
            .map_err(|e| ProviderError::transport(PROVIDER_NAME, e))?;

        Ok(Self {
            client,
            api_key,
            base_url: normalise_base_url(&base_url),
            max_attempts: http.max_attempts,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a single chat completion request (no retry)
    async fn chat_once(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let request = OpenAIRequest {
            model,
            messages: vec![OpenAIMessage {
                role: "user",
                content: prompt,
            }],
        };
        let url = format!("{}/v1/chat/completions", self.base_url);

        tracing::debug!("Sending request to OpenAI API ({} prompt bytes)", prompt.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER_NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, body));
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(PROVIDER_NAME, e.to_string()))?;

        tracing::debug!("Received response {}", openai_response.id);

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::malformed(PROVIDER_NAME, "no choices in response"))?;

        match choice.message.content {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(ProviderError::empty(PROVIDER_NAME)),
        }
    }

    /// Ids listed by `GET /v1/models`, or `None` when the server has no
    /// listing endpoint (no retry)
    async fn list_models_once(&self) -> Result<Option<Vec<String>>, ProviderError> {
        let url = format!("{}/v1/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER_NAME, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::METHOD_NOT_ALLOWED {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, body));
        }

        let listing: ModelList = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(PROVIDER_NAME, e.to_string()))?;

        Ok(Some(listing.data.into_iter().map(|m| m.id).collect()))
    }

    /// Check the model against the listing, or with a one-word chat request
    /// when the server does not list models (no retry)
    async fn validate_model_once(&self, model: &str) -> Result<(), ProviderError> {
        match self.list_models_once().await? {
            Some(ids) if ids.iter().any(|id| id == model) => Ok(()),
            Some(_) => Err(ProviderError::ModelUnavailable {
                model: model.to_string(),
                hint: format!("{} does not list it; check the model id", self.base_url),
            }),
            None => {
                tracing::debug!(
                    "{} has no model listing, checking {} with a chat request",
                    self.base_url,
                    model
                );
                match self.chat_once(model, "Hello").await {
                    Ok(_) | Err(ProviderError::EmptyResponse { .. }) => Ok(()),
                    Err(ProviderError::Api { status: 404, body, .. }) => {
                        Err(ProviderError::ModelUnavailable {
                            model: model.to_string(),
                            hint: body,
                        })
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    async fn chat(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        with_retry(self.max_attempts, || self.chat_once(model, prompt)).await
    }

    async fn validate_model(&self, model: &str) -> Result<(), ProviderError> {
        with_retry(self.max_attempts, || self.validate_model_once(model)).await
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

/// Strip a trailing slash and a trailing `/v1`, since request paths add it back
fn normalise_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    trimmed.strip_suffix("/v1").unwrap_or(trimmed).to_string()
}

fn api_error(status: StatusCode, body: String) -> ProviderError {
    // OpenAI reports failures as {"error": {"message": "..."}}
    let body = serde_json::from_str::<OpenAIErrorBody>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    ProviderError::Api {
        provider: PROVIDER_NAME.to_string(),
        status: status.as_u16(),
        body,
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelObject>,
}

#[derive(Debug, Deserialize)]
struct ModelObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}
