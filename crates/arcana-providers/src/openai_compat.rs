//! Adapter for backends that speak the OpenAI chat-completions protocol.
//!
//! OpenAI, Groq and `OpenRouter` all accept the same request shape; they
//! differ only in base URL, credentials and default model.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arcana_core::{
    Error, FinishReason, ModelCatalog, ModelConfig, ProviderAdapter, ProviderResponse,
    ProviderResult, ProviderSettings, Result, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::http::{build_client, classify_status, classify_transport, malformed_body, timed_out};

/// Known OpenAI-compatible endpoints: (name, base URL, default model).
const KNOWN_ENDPOINTS: [(&str, &str, &str); 3] = [
    ("openai", "https://api.openai.com/v1", "gpt-4o-mini"),
    (
        "groq",
        "https://api.groq.com/openai/v1",
        "llama-3.3-70b-versatile",
    ),
    (
        "openrouter",
        "https://openrouter.ai/api/v1",
        "deepseek/deepseek-chat",
    ),
];

/// Chat-completions provider.
pub struct OpenAiCompatProvider {
    /// Registry name
    name: String,
    /// HTTP client for API requests
    client: Client,
    /// Bearer token
    api_key: String,
    /// Base URL without the `/chat/completions` suffix
    base_url: String,
    /// Model used when the requested one belongs elsewhere
    default_model: String,
    /// Pricing source
    catalog: Arc<ModelCatalog>,
}

impl OpenAiCompatProvider {
    /// Creates a provider for an explicit endpoint.
    ///
    /// # Errors
    /// Returns an error if the API key is empty or the HTTP client cannot be built.
    pub fn new(
        name: impl Into<String>,
        api_key: String,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        catalog: Arc<ModelCatalog>,
    ) -> Result<Self> {
        let name = name.into();
        if api_key.is_empty() {
            return Err(Error::MissingApiKey(format!(
                "{}_API_KEY",
                name.to_ascii_uppercase()
            )));
        }

        Ok(Self {
            name,
            client: build_client(Duration::from_secs(120))?,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            default_model: default_model.into(),
            catalog,
        })
    }

    /// Creates a provider from configuration, filling endpoint defaults for
    /// known backend names.
    ///
    /// # Errors
    /// Returns an error if no API key is configured, or if the name is not a
    /// known backend and no `base_url` is given.
    pub fn from_settings(settings: &ProviderSettings, catalog: &Arc<ModelCatalog>) -> Result<Self> {
        let known = KNOWN_ENDPOINTS
            .iter()
            .find(|(name, _, _)| *name == settings.name);

        let base_url = settings
            .base_url
            .clone()
            .or_else(|| known.map(|(_, url, _)| (*url).to_owned()))
            .ok_or_else(|| {
                Error::Config(format!("provider '{}' needs a base_url", settings.name))
            })?;
        let default_model = settings
            .default_model
            .clone()
            .or_else(|| known.map(|(_, _, model)| (*model).to_owned()))
            .ok_or_else(|| {
                Error::Config(format!("provider '{}' needs a default_model", settings.name))
            })?;
        let api_key = settings
            .resolve_api_key()
            .ok_or_else(|| Error::MissingApiKey(settings.api_key_env()))?;

        let mut provider = Self::new(
            settings.name.clone(),
            api_key,
            base_url,
            default_model,
            Arc::clone(catalog),
        )?;
        provider.client = build_client(Duration::from_secs(settings.timeout_seconds))?;
        Ok(provider)
    }

    /// Full chat-completions URL.
    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Request payload for the chat-completions API.
#[derive(Debug, Serialize)]
struct ChatRequest<'req> {
    /// Model identifier
    model: &'req str,
    /// Conversation messages
    messages: Vec<ChatMessage<'req>>,
    /// Sampling temperature
    temperature: f32,
    /// Completion token limit
    max_tokens: u32,
}

/// Message delivered to the API.
#[derive(Debug, Serialize)]
struct ChatMessage<'req> {
    /// `system` or `user`
    role: &'static str,
    /// Message text
    content: &'req str,
}

/// Response payload.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    /// Candidate completions
    choices: Vec<ChatChoice>,
    /// Token accounting, absent on some gateways
    #[serde(default)]
    usage: Option<ChatUsage>,
    /// Model that actually served the request
    #[serde(default)]
    model: Option<String>,
}

/// One completion choice.
#[derive(Debug, Deserialize)]
struct ChatChoice {
    /// Generated message
    message: ChatResponseMessage,
    /// Raw stop reason
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Generated message body.
#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    /// Generated text; null when the backend refused
    #[serde(default)]
    content: Option<String>,
}

/// Token usage block.
#[derive(Debug, Deserialize)]
struct ChatUsage {
    /// Prompt tokens
    prompt_tokens: u64,
    /// Completion tokens
    completion_tokens: u64,
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        config: &ModelConfig,
    ) -> ProviderResult<ProviderResponse> {
        let start = Instant::now();

        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system_prompt,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = ChatRequest {
            model: &config.model,
            messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        let call = async {
            let response = self
                .client
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|error| classify_transport(&self.name, &error, start.elapsed()))?;

            let status = response.status();
            if !status.is_success() {
                let headers = response.headers().clone();
                let body = response.text().await.unwrap_or_default();
                return Err(classify_status(&self.name, status, &headers, &body));
            }

            response
                .json::<ChatResponse>()
                .await
                .map_err(|error| malformed_body(&self.name, &error.to_string()))
        };

        let parsed = timeout(config.timeout, call)
            .await
            .map_err(|_elapsed| timed_out(&self.name, start.elapsed()))??;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| malformed_body(&self.name, "no choices returned"))?;
        let text = choice.message.content.unwrap_or_default();

        let usage = parsed.usage.map_or_else(
            || {
                TokenUsage::new(
                    self.count_tokens(system_prompt) + self.count_tokens(prompt),
                    self.count_tokens(&text),
                )
            },
            |usage| TokenUsage::new(usage.prompt_tokens, usage.completion_tokens),
        );

        Ok(ProviderResponse {
            text,
            model: parsed.model.unwrap_or_else(|| config.model.clone()),
            usage,
            finish_reason: choice
                .finish_reason
                .as_deref()
                .map_or(FinishReason::Other, FinishReason::from_provider),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn estimate_cost(&self, prompt_tokens: u64, completion_tokens: u64, model: &str) -> f64 {
        self.catalog
            .estimate_cost(model, prompt_tokens, completion_tokens)
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Arc<ModelCatalog> {
        Arc::new(ModelCatalog::with_defaults())
    }

    #[test]
    fn test_known_endpoint_defaults() {
        let mut settings = ProviderSettings::new("groq");
        settings.api_key = Some("test_key".to_owned());

        let provider = OpenAiCompatProvider::from_settings(&settings, &catalog()).unwrap();
        assert_eq!(provider.name(), "groq");
        assert_eq!(provider.default_model(), "llama-3.3-70b-versatile");
        assert_eq!(
            provider.endpoint(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_unknown_backend_needs_base_url() {
        let mut settings = ProviderSettings::new("homelab");
        settings.api_key = Some("test_key".to_owned());
        settings.default_model = Some("qwen".to_owned());

        let error = OpenAiCompatProvider::from_settings(&settings, &catalog())
            .err()
            .unwrap();
        assert!(matches!(error, Error::Config(_)));

        settings.base_url = Some("http://localhost:8080/v1/".to_owned());
        let provider = OpenAiCompatProvider::from_settings(&settings, &catalog()).unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_empty_key_rejected() {
        let error =
            OpenAiCompatProvider::new("openai", String::new(), "http://x", "m", catalog())
                .err()
                .unwrap();
        assert!(matches!(error, Error::MissingApiKey(_)));
    }

    #[test]
    fn test_cost_uses_catalog() {
        let provider =
            OpenAiCompatProvider::new("openai", "k".to_owned(), "http://x", "gpt-4o", catalog())
                .unwrap();
        let cost = provider.estimate_cost(1_000_000, 1_000_000, "gpt-4o");
        assert!((cost - 12.5).abs() < 1e-9);
        assert!(provider.estimate_cost(10, 10, "unknown").abs() < f64::EPSILON);
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "model": "gpt-4o-mini-2024",
            "choices": [{"message": {"content": "{\"a\":1}"}, "finish_reason": "length"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 34}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("length"));
        assert_eq!(parsed.usage.unwrap().completion_tokens, 34);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let provider = OpenAiCompatProvider::new(
            "openai",
            "k".to_owned(),
            "http://127.0.0.1:9",
            "gpt-4o-mini",
            catalog(),
        )
        .unwrap();
        let config = ModelConfig::new("gpt-4o-mini", 16, 0.0, Duration::from_secs(5));

        let error = provider.generate("hi", "", &config).await.unwrap_err();
        assert!(error.is_transient());
        assert_eq!(error.provider(), "openai");
    }
}
