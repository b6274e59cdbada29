use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash as _, Hasher as _};
use std::sync::Mutex;

use arcana_core::{CacheConfig, IgnoreLock as _, ModelConfig};
use async_trait::async_trait;
use tracing::debug;

use super::storage::{CacheStats, CachedGeneration, ResponseCache};
use crate::error::Result;
use crate::orchestrator::{GenerationAttempt, GenerationRequest, Generator, OrchestratorResult};

/// Provider name recorded for cache hits.
pub const CACHE_PROVIDER: &str = "cache";

/// Serves repeated requests from memory and delegates the rest.
pub struct CachingGenerator<G> {
    inner: G,
    cache: Mutex<ResponseCache>,
}

impl<G: Generator> CachingGenerator<G> {
    /// Wraps `inner` with a cache built from `config`.
    pub fn new(inner: G, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: Mutex::new(ResponseCache::new(config)),
        }
    }

    /// Current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.cache.lock_ignore_poison().stats()
    }

    /// Fingerprint of prompt, system prompt and effective configuration.
    fn fingerprint(request: &GenerationRequest) -> String {
        let ModelConfig {
            model,
            max_tokens,
            temperature,
            timeout,
        } = &request.config;

        let mut hasher = DefaultHasher::new();
        request.prompt.hash(&mut hasher);
        request.system_prompt.hash(&mut hasher);
        model.hash(&mut hasher);
        max_tokens.hash(&mut hasher);
        temperature.to_bits().hash(&mut hasher);
        timeout.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

#[async_trait]
impl<G: Generator> Generator for CachingGenerator<G> {
    async fn generate(&self, request: &GenerationRequest) -> Result<OrchestratorResult> {
        let key = Self::fingerprint(request);

        let cached = self.cache.lock_ignore_poison().get(&key);
        if let Some(hit) = cached {
            debug!("Cache hit for {} (originally from {})", request.purpose, hit.provider);
            let mut attempt = GenerationAttempt::succeeded(
                CACHE_PROVIDER,
                &request.config,
                &request.purpose,
                &hit.response,
                0.0,
            );
            attempt.prompt_tokens = 0;
            attempt.completion_tokens = 0;
            attempt.total_tokens = 0;
            attempt.latency_ms = 0;

            let mut response = hit.response;
            response.latency_ms = 0;
            return Ok(OrchestratorResult {
                response,
                provider: CACHE_PROVIDER.to_owned(),
                attempts: vec![attempt],
                total_cost: 0.0,
            });
        }

        let result = self.inner.generate(request).await?;
        if result.response.finish_reason.is_truncated() {
            debug!("Not caching truncated reply for {}", request.purpose);
            return Ok(result);
        }
        self.cache.lock_ignore_poison().put(
            key,
            CachedGeneration {
                provider: result.provider.clone(),
                response: result.response.clone(),
            },
        );
        Ok(result)
    }
}
