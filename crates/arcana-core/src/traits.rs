use async_trait::async_trait;

use crate::tokens::estimate_tokens;
use crate::{ModelConfig, ProviderResponse, ProviderResult};

/// Uniform interface over one concrete LLM backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Returns the unique identifier for this provider.
    fn name(&self) -> &str;

    /// Model used when the requested model belongs to another provider.
    fn default_model(&self) -> &str;

    /// Checks whether this provider is configured and ready to take requests.
    async fn is_available(&self) -> bool;

    /// Generates a completion for `prompt` under `system_prompt`.
    ///
    /// # Errors
    ///
    /// Returns a normalized [`ProviderError`](crate::ProviderError) when the
    /// backend rejects the call, throttles it, or cannot be reached.
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        config: &ModelConfig,
    ) -> ProviderResult<ProviderResponse>;

    /// Counts tokens in `text` the way this backend would bill them.
    fn count_tokens(&self, text: &str) -> u64 {
        estimate_tokens(text)
    }

    /// Estimates the cost in USD of a call with the given token counts.
    fn estimate_cost(&self, prompt_tokens: u64, completion_tokens: u64, model: &str) -> f64;
}
