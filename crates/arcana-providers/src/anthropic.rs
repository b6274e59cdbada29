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

/// Anthropic API base URL.
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
/// Protocol version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Default model for Anthropic.
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
/// Env var key for the Anthropic API key.
const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

/// Anthropic messages API provider.
pub struct AnthropicProvider {
    /// Registry name
    name: String,
    /// HTTP client for API requests
    client: Client,
    /// Anthropic API key
    api_key: String,
    /// Base URL
    base_url: String,
    /// Model used when the requested one belongs elsewhere
    default_model: String,
    /// Pricing source
    catalog: Arc<ModelCatalog>,
}

impl AnthropicProvider {
    /// Creates a new `AnthropicProvider` with the given API key.
    ///
    /// # Errors
    /// Returns an error if the API key is empty or the HTTP client cannot be built.
    pub fn new(api_key: String, catalog: Arc<ModelCatalog>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::MissingApiKey(ENV_ANTHROPIC_API_KEY.to_owned()));
        }

        Ok(Self {
            name: "anthropic".to_owned(),
            client: build_client(Duration::from_secs(120))?,
            api_key,
            base_url: ANTHROPIC_API_URL.to_owned(),
            default_model: DEFAULT_MODEL.to_owned(),
            catalog,
        })
    }

    /// Creates a provider from configuration.
    ///
    /// # Errors
    /// Returns an error if no API key is configured or found in the environment.
    pub fn from_settings(settings: &ProviderSettings, catalog: &Arc<ModelCatalog>) -> Result<Self> {
        let api_key = settings
            .resolve_api_key()
            .ok_or_else(|| Error::MissingApiKey(settings.api_key_env()))?;

        let mut provider = Self::new(api_key, Arc::clone(catalog))?;
        provider.name.clone_from(&settings.name);
        provider.client = build_client(Duration::from_secs(settings.timeout_seconds))?;
        if let Some(base_url) = &settings.base_url {
            provider.base_url = base_url.trim_end_matches('/').to_owned();
        }
        if let Some(model) = &settings.default_model {
            provider.default_model.clone_from(model);
        }
        Ok(provider)
    }
}

/// Request payload for the messages API.
#[derive(Debug, Serialize)]
struct MessagesRequest<'req> {
    /// Model identifier
    model: &'req str,
    /// System prompt, sent outside the message list
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'req str,
    /// Conversation messages
    messages: [UserMessage<'req>; 1],
    /// Completion token limit
    max_tokens: u32,
    /// Sampling temperature
    temperature: f32,
}

/// User turn.
#[derive(Debug, Serialize)]
struct UserMessage<'req> {
    /// Always `user`
    role: &'static str,
    /// Message text
    content: &'req str,
}

/// Response payload.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    /// Content blocks
    content: Vec<ContentBlock>,
    /// Raw stop reason
    #[serde(default)]
    stop_reason: Option<String>,
    /// Token accounting
    usage: MessagesUsage,
    /// Model that served the request
    model: String,
}

/// One content block; only `text` blocks carry output.
#[derive(Debug, Deserialize)]
struct ContentBlock {
    /// Block type
    #[serde(rename = "type")]
    kind: String,
    /// Text for `text` blocks
    #[serde(default)]
    text: Option<String>,
}

/// Token usage block.
#[derive(Debug, Deserialize)]
struct MessagesUsage {
    /// Prompt tokens
    input_tokens: u64,
    /// Completion tokens
    output_tokens: u64,
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
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

        let request = MessagesRequest {
            model: &config.model,
            system: system_prompt,
            messages: [UserMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        let call = async {
            let response = self
                .client
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
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
                .json::<MessagesResponse>()
                .await
                .map_err(|error| malformed_body(&self.name, &error.to_string()))
        };

        let parsed = timeout(config.timeout, call)
            .await
            .map_err(|_elapsed| timed_out(&self.name, start.elapsed()))??;

        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<String>();

        Ok(ProviderResponse {
            text,
            model: parsed.model,
            usage: TokenUsage::new(parsed.usage.input_tokens, parsed.usage.output_tokens),
            finish_reason: parsed
                .stop_reason
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

    #[test]
    fn test_settings_override_defaults() {
        let mut settings = ProviderSettings::new("anthropic");
        settings.api_key = Some("test_key".to_owned());
        settings.default_model = Some("claude-sonnet-4-20250514".to_owned());
        settings.base_url = Some("http://proxy.local/".to_owned());

        let provider =
            AnthropicProvider::from_settings(&settings, &Arc::new(ModelCatalog::with_defaults()))
                .unwrap();
        assert_eq!(provider.default_model(), "claude-sonnet-4-20250514");
        assert_eq!(provider.base_url, "http://proxy.local");
    }

    #[test]
    fn test_response_joins_text_blocks() {
        let body = r#"{
            "model": "claude-3-5-haiku-latest",
            "content": [
                {"type": "text", "text": "{\"a\":"},
                {"type": "tool_use"},
                {"type": "text", "text": "1}"}
            ],
            "stop_reason": "max_tokens",
            "usage": {"input_tokens": 5, "output_tokens": 7}
        }"#;
        let parsed: MessagesResponse = serde_json::from_str(body).unwrap();
        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        assert_eq!(text, "{\"a\":1}");
        assert_eq!(
            FinishReason::from_provider(parsed.stop_reason.as_deref().unwrap()),
            FinishReason::Length
        );
    }

    #[test]
    fn test_system_prompt_omitted_when_empty() {
        let request = MessagesRequest {
            model: "m",
            system: "",
            messages: [UserMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: 10,
            temperature: 0.5,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
