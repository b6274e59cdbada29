//! Parse-repair retry loop around a generator.
//!
//! A failed extraction, parse, validation or truncated completion is retried
//! on the same route with a larger output budget. Every call lands in the
//! usage ledger whether it succeeded or not.

use std::sync::Arc;

use arcana_core::RetryConfig;
use tracing::{info, warn};

use crate::error::{ReadingError, Result};
use crate::ledger::{PARSE_RETRY_SUFFIX, UsageLedger};
use crate::orchestrator::{GenerationRequest, Generator};

/// Progress of one retried call.
#[derive(Debug)]
pub enum RetryState<T> {
    /// Attempt `n` (0-based) is about to run
    Attempting(u8),
    /// Output parsed and validated
    Succeeded(T),
    /// No more attempts will be made
    Exhausted(ReadingError),
}

/// Which scheduling path issued the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    /// Whole reading in one call
    Single,
    /// One section of a parallel spread
    Parallel,
}

/// Retry limits and budget growth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u8,
    /// Multiplier applied to max output tokens on each retry
    pub growth_factor: f64,
    /// Ceiling for any grown budget
    pub hard_max_tokens: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default(), 16_000)
    }
}

impl RetryPolicy {
    /// Policy from configuration with the allocator's token ceiling.
    #[must_use]
    pub fn from_config(config: &RetryConfig, hard_max_tokens: u32) -> Self {
        Self {
            max_retries: config.max_retries,
            growth_factor: config.growth_factor,
            hard_max_tokens,
        }
    }

    /// `round(previous × growth)`, clamped to the hard ceiling.
    #[must_use]
    pub fn next_max_tokens(&self, previous: u32) -> u32 {
        let grown = (f64::from(previous) * self.growth_factor).round();
        (grown as u32).min(self.hard_max_tokens)
    }

    /// Whether `error` should consume a retry on `path`.
    #[must_use]
    pub fn should_retry(error: &ReadingError, path: ExecutionPath) -> bool {
        error.is_repairable()
            || (path == ExecutionPath::Parallel && matches!(error, ReadingError::AllProvidersFailed { .. }))
    }
}

/// Runs generation calls through the retry state machine.
#[derive(Clone)]
pub struct RetryController {
    generator: Arc<dyn Generator>,
    policy: RetryPolicy,
}

impl RetryController {
    /// Creates a controller over `generator`.
    pub fn new(generator: Arc<dyn Generator>, policy: RetryPolicy) -> Self {
        Self { generator, policy }
    }

    /// Active retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Generates and parses until `parse` accepts the output or the budget runs
    /// out.
    ///
    /// # Errors
    /// Returns [`ReadingError::BudgetExhausted`] when every allowed attempt
    /// failed with a retryable error, or the raw error when it is not
    /// retryable on `path`.
    pub async fn run<T, F>(
        &self,
        request: GenerationRequest,
        path: ExecutionPath,
        ledger: &UsageLedger,
        parse: F,
    ) -> Result<T>
    where
        F: Fn(&str) -> Result<T> + Send + Sync,
        T: Send,
    {
        let base_purpose = request.purpose.clone();
        let mut current = request;
        let mut state = RetryState::Attempting(0);

        loop {
            state = match state {
                RetryState::Attempting(attempt) => {
                    match self.attempt_once(&current, ledger, &parse).await {
                        Ok(value) => {
                            if attempt > 0 {
                                info!("{base_purpose} repaired on attempt {}", attempt + 1);
                            }
                            RetryState::Succeeded(value)
                        }
                        Err(error) if !RetryPolicy::should_retry(&error, path) => RetryState::Exhausted(error),
                        Err(error) if attempt >= self.policy.max_retries => {
                            warn!(
                                "{base_purpose} exhausted {} attempt(s): {error}",
                                usize::from(attempt) + 1
                            );
                            RetryState::Exhausted(ReadingError::BudgetExhausted {
                                purpose: base_purpose.clone(),
                                attempts: usize::from(attempt) + 1,
                                last_error: Box::new(error),
                            })
                        }
                        Err(error) => {
                            let next = self.policy.next_max_tokens(current.config.max_tokens);
                            warn!(
                                "{base_purpose} attempt {}/{} failed: {error}. Retrying with max_tokens {} -> {next}",
                                attempt + 1,
                                usize::from(self.policy.max_retries) + 1,
                                current.config.max_tokens
                            );
                            current.config.max_tokens = next;
                            current.purpose = format!("{base_purpose}{PARSE_RETRY_SUFFIX}");
                            RetryState::Attempting(attempt + 1)
                        }
                    }
                }
                RetryState::Succeeded(value) => return Ok(value),
                RetryState::Exhausted(error) => return Err(error),
            };
        }
    }

    /// One generation call: record, check truncation, parse.
    async fn attempt_once<T, F>(&self, request: &GenerationRequest, ledger: &UsageLedger, parse: &F) -> Result<T>
    where
        F: Fn(&str) -> Result<T> + Send + Sync,
    {
        let result = match self.generator.generate(request).await {
            Ok(result) => result,
            Err(ReadingError::AllProvidersFailed { attempts }) => {
                ledger.record_all(attempts.iter().cloned());
                return Err(ReadingError::AllProvidersFailed { attempts });
            }
            Err(other) => return Err(other),
        };
        ledger.record_all(result.attempts);

        if result.response.finish_reason.is_truncated() {
            return Err(ReadingError::Truncated {
                purpose: request.purpose.clone(),
                max_tokens: request.config.max_tokens,
            });
        }
        parse(&result.response.text)
    }
}
