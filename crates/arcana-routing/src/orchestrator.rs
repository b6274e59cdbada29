//! Sequential provider fallback with a full attempt ledger.

use std::sync::Arc;
use std::time::{Instant, SystemTime};

use arcana_core::{
    FinishReason, ModelCatalog, ModelConfig, ProviderAdapter, ProviderError, ProviderResponse,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::{ReadingError, Result};

/// One provider call and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationAttempt {
    /// Provider that handled the call
    pub provider: String,
    /// Model the call was sent to
    pub model: String,
    /// Prompt tokens reported by the provider
    pub prompt_tokens: u64,
    /// Completion tokens reported by the provider
    pub completion_tokens: u64,
    /// Prompt plus completion tokens
    pub total_tokens: u64,
    /// Estimated USD
    pub cost: f64,
    /// Wall time of the call
    pub latency_ms: u64,
    /// `None` for failed calls
    pub finish_reason: Option<FinishReason>,
    /// Purpose tag, e.g. `card_interpretation` or `advice:parse_retry`
    pub purpose: String,
    /// Output token limit the call was issued with
    pub max_tokens: u32,
    /// Whether the provider returned a response
    pub success: bool,
    /// Provider error for failed calls
    pub error: Option<String>,
    /// When the attempt finished
    pub timestamp: SystemTime,
}

impl GenerationAttempt {
    /// Attempt record for a successful call.
    #[must_use]
    pub fn succeeded(
        provider: &str,
        config: &ModelConfig,
        purpose: &str,
        response: &ProviderResponse,
        cost: f64,
    ) -> Self {
        Self {
            provider: provider.to_owned(),
            model: response.model.clone(),
            prompt_tokens: response.usage.prompt,
            completion_tokens: response.usage.completion,
            total_tokens: response.usage.total(),
            cost: cost.max(0.0),
            latency_ms: response.latency_ms,
            finish_reason: Some(response.finish_reason),
            purpose: purpose.to_owned(),
            max_tokens: config.max_tokens,
            success: true,
            error: None,
            timestamp: SystemTime::now(),
        }
    }

    /// Attempt record for a failed call.
    #[must_use]
    pub fn failed(
        provider: &str,
        config: &ModelConfig,
        purpose: &str,
        error: &ProviderError,
        latency_ms: u64,
    ) -> Self {
        Self {
            provider: provider.to_owned(),
            model: config.model.clone(),
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            cost: 0.0,
            latency_ms,
            finish_reason: None,
            purpose: purpose.to_owned(),
            max_tokens: config.max_tokens,
            success: false,
            error: Some(error.to_string()),
            timestamp: SystemTime::now(),
        }
    }
}

/// One logical generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// User prompt
    pub prompt: String,
    /// System prompt
    pub system_prompt: String,
    /// Model and limits to use
    pub config: ModelConfig,
    /// Purpose tag recorded in the ledger
    pub purpose: String,
}

/// Winning response plus every attempt that led to it.
#[derive(Debug, Clone)]
pub struct OrchestratorResult {
    /// Response of the winning provider
    pub response: ProviderResponse,
    /// Provider that produced `response`
    pub provider: String,
    /// Non-empty; the last entry is the winning attempt
    pub attempts: Vec<GenerationAttempt>,
    /// Cost of all attempts in USD
    pub total_cost: f64,
}

/// Anything that turns a request into an orchestrated result.
///
/// Implemented by [`Orchestrator`] and by the caching decorator.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Runs one generation call.
    ///
    /// # Errors
    /// Returns [`ReadingError::AllProvidersFailed`] when no provider succeeded.
    async fn generate(&self, request: &GenerationRequest) -> Result<OrchestratorResult>;
}

/// Tries providers strictly in priority order, never concurrently.
pub struct Orchestrator {
    providers: Vec<Arc<dyn ProviderAdapter>>,
    catalog: Arc<ModelCatalog>,
}

impl Orchestrator {
    /// Creates an orchestrator over providers already in priority order.
    ///
    /// # Errors
    /// Returns a configuration error when `providers` is empty.
    pub fn new(providers: Vec<Arc<dyn ProviderAdapter>>, catalog: Arc<ModelCatalog>) -> Result<Self> {
        if providers.is_empty() {
            return Err(ReadingError::Config("orchestrator needs at least one provider".to_owned()));
        }
        Ok(Self { providers, catalog })
    }

    /// Orders providers as primary, listed fallbacks, then the rest by name.
    ///
    /// # Errors
    /// Returns a configuration error when `providers` is empty.
    pub fn with_priority(
        providers: Vec<Arc<dyn ProviderAdapter>>,
        primary: Option<&str>,
        fallbacks: &[String],
        catalog: Arc<ModelCatalog>,
    ) -> Result<Self> {
        let mut remaining = providers;
        let mut ordered = Vec::with_capacity(remaining.len());

        for name in primary.into_iter().chain(fallbacks.iter().map(String::as_str)) {
            if let Some(position) = remaining.iter().position(|provider| provider.name() == name) {
                ordered.push(remaining.remove(position));
            }
        }
        remaining.sort_by(|left, right| left.name().cmp(right.name()));
        ordered.extend(remaining);

        Self::new(ordered, catalog)
    }

    /// Provider names in the order they are tried.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    /// Substitutes the adapter's default model when the configured model
    /// belongs to a different backend.
    fn config_for(&self, provider: &dyn ProviderAdapter, config: &ModelConfig) -> ModelConfig {
        match self.catalog.get(&config.model) {
            Some(metadata) if metadata.provider != provider.name() => {
                config.clone().with_model(provider.default_model())
            }
            _ => config.clone(),
        }
    }
}

#[async_trait]
impl Generator for Orchestrator {
    async fn generate(&self, request: &GenerationRequest) -> Result<OrchestratorResult> {
        let mut attempts = Vec::new();

        for provider in &self.providers {
            let name = provider.name();
            let config = self.config_for(provider.as_ref(), &request.config);
            let start = Instant::now();

            let outcome = timeout(
                config.timeout,
                provider.generate(&request.prompt, &request.system_prompt, &config),
            )
            .await
            .unwrap_or_else(|_elapsed| {
                Err(ProviderError::TimedOut {
                    provider: name.to_owned(),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                })
            });

            match outcome {
                Ok(response) => {
                    let cost = provider.estimate_cost(
                        response.usage.prompt,
                        response.usage.completion,
                        &response.model,
                    );
                    attempts.push(GenerationAttempt::succeeded(
                        name,
                        &config,
                        &request.purpose,
                        &response,
                        cost,
                    ));
                    if attempts.len() > 1 {
                        info!(
                            "{} served by fallback provider {name} after {} failed attempt(s)",
                            request.purpose,
                            attempts.len() - 1
                        );
                    }
                    let total_cost = attempts.iter().map(|attempt| attempt.cost).sum();
                    return Ok(OrchestratorResult {
                        response,
                        provider: name.to_owned(),
                        attempts,
                        total_cost,
                    });
                }
                Err(error) => {
                    warn!(
                        "Provider {name} failed for {} ({}): {error}",
                        request.purpose,
                        if error.is_transient() { "transient" } else { "configuration" }
                    );
                    attempts.push(GenerationAttempt::failed(
                        name,
                        &config,
                        &request.purpose,
                        &error,
                        start.elapsed().as_millis() as u64,
                    ));
                }
            }
        }

        Err(ReadingError::AllProvidersFailed { attempts })
    }
}
