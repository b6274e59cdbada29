//! Mock provider for testing the reading pipeline.
//!
//! Replies are chosen from a consumable script first, then from rules keyed by
//! prompt substring, then from the default reply. The provider also counts how
//! many calls are in flight at once so tests can check concurrency limits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arcana_core::{
    FinishReason, IgnoreLock as _, ModelConfig, ProviderAdapter, ProviderError, ProviderResponse,
    ProviderResult, TokenUsage, estimate_tokens,
};
use async_trait::async_trait;
use tokio::time::{sleep, timeout};

/// Canned failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// HTTP 429 equivalent
    RateLimited,
    /// Bad credentials
    Unauthenticated,
    /// Rejected payload
    InvalidRequest,
    /// Call timed out
    TimedOut,
    /// Server error or unreachable
    Unavailable,
}

/// One canned outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Successful completion
    Text {
        /// Generated text
        text: String,
        /// Reported finish reason
        finish_reason: FinishReason,
    },
    /// Failed call
    Failure(MockFailure),
}

impl MockReply {
    /// Completion that stopped naturally.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            finish_reason: FinishReason::Stop,
        }
    }

    /// Completion cut off by the token limit.
    pub fn truncated(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            finish_reason: FinishReason::Length,
        }
    }

    /// Failed call of the given kind.
    pub const fn failure(kind: MockFailure) -> Self {
        Self::Failure(kind)
    }
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// User prompt
    pub prompt: String,
    /// System prompt
    pub system_prompt: String,
    /// Requested model
    pub model: String,
    /// Requested completion limit
    pub max_tokens: u32,
}

/// Substring rule with a reply sequence; the last reply repeats.
#[derive(Debug)]
struct MockRule {
    /// Substring the prompt must contain
    pattern: String,
    /// Remaining replies
    replies: VecDeque<MockReply>,
}

impl MockRule {
    /// Next reply, keeping the final one sticky.
    fn next_reply(&mut self) -> Option<MockReply> {
        if self.replies.len() > 1 {
            self.replies.pop_front()
        } else {
            self.replies.front().cloned()
        }
    }
}

/// Decrements the in-flight counter when a call ends or is cancelled.
struct InFlightGuard<'counter>(&'counter AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Provider that returns pre-defined replies.
#[derive(Clone)]
pub struct MockProvider {
    /// Registry name
    name: String,
    /// Model reported as default
    default_model: String,
    /// Replies consumed in order before rules apply
    script: Arc<Mutex<VecDeque<MockReply>>>,
    /// Substring rules in insertion order
    rules: Arc<Mutex<Vec<MockRule>>>,
    /// Reply when nothing else matches
    default_reply: Option<MockReply>,
    /// Simulated latency per call
    delay: Duration,
    /// USD per million prompt tokens
    input_cost_per_million: f64,
    /// USD per million completion tokens
    output_cost_per_million: f64,
    /// Calls currently executing
    in_flight: Arc<AtomicUsize>,
    /// Highest value `in_flight` reached
    peak_in_flight: Arc<AtomicUsize>,
    /// Call history for verification
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockProvider {
    /// Create a new mock provider with a given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_model: "mock-model".to_owned(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            rules: Arc::new(Mutex::new(Vec::new())),
            default_reply: None,
            delay: Duration::ZERO,
            input_cost_per_million: 1.0,
            output_cost_per_million: 2.0,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sets the model reported as default.
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Appends a reply to the consumable script.
    #[must_use]
    pub fn with_scripted(self, reply: MockReply) -> Self {
        self.script.lock_ignore_poison().push_back(reply);
        self
    }

    /// Adds a rule that answers prompts containing `pattern`.
    #[must_use]
    pub fn with_rule(self, pattern: impl Into<String>, reply: MockReply) -> Self {
        self.with_rule_sequence(pattern, vec![reply])
    }

    /// Adds a rule answering with `replies` in order, repeating the last one.
    #[must_use]
    pub fn with_rule_sequence(self, pattern: impl Into<String>, replies: Vec<MockReply>) -> Self {
        self.rules.lock_ignore_poison().push(MockRule {
            pattern: pattern.into(),
            replies: replies.into(),
        });
        self
    }

    /// Sets the reply used when no script entry or rule applies.
    #[must_use]
    pub fn with_default_reply(mut self, reply: MockReply) -> Self {
        self.default_reply = Some(reply);
        self
    }

    /// Sets simulated latency.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets per-million token pricing.
    #[must_use]
    pub fn with_pricing(mut self, input_cost_per_million: f64, output_cost_per_million: f64) -> Self {
        self.input_cost_per_million = input_cost_per_million;
        self.output_cost_per_million = output_cost_per_million;
        self
    }

    /// Recorded calls in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock_ignore_poison().clone()
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock_ignore_poison().len()
    }

    /// Highest number of simultaneous calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Picks the reply for a prompt.
    fn select_reply(&self, prompt: &str) -> Option<MockReply> {
        if let Some(reply) = self.script.lock_ignore_poison().pop_front() {
            return Some(reply);
        }

        let mut rules = self.rules.lock_ignore_poison();
        let matched = rules
            .iter_mut()
            .find(|rule| prompt.contains(&rule.pattern))
            .and_then(MockRule::next_reply);
        drop(rules);

        matched.or_else(|| self.default_reply.clone())
    }

    /// Converts a canned failure into a provider error.
    fn failure_error(&self, kind: MockFailure, config: &ModelConfig) -> ProviderError {
        let provider = self.name.clone();
        match kind {
            MockFailure::RateLimited => ProviderError::RateLimited {
                provider,
                message: "mock rate limit".to_owned(),
                retry_after: Some(Duration::from_secs(1)),
            },
            MockFailure::Unauthenticated => ProviderError::Unauthenticated {
                provider,
                message: "mock credentials rejected".to_owned(),
            },
            MockFailure::InvalidRequest => ProviderError::InvalidRequest {
                provider,
                message: "mock request rejected".to_owned(),
            },
            MockFailure::TimedOut => ProviderError::TimedOut {
                provider,
                elapsed_ms: config.timeout.as_millis() as u64,
            },
            MockFailure::Unavailable => ProviderError::Unavailable {
                provider,
                message: "mock backend down".to_owned(),
            },
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        config: &ModelConfig,
    ) -> ProviderResult<ProviderResponse> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.in_flight);
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        self.calls.lock_ignore_poison().push(MockCall {
            prompt: prompt.to_owned(),
            system_prompt: system_prompt.to_owned(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        });

        if !self.delay.is_zero() && timeout(config.timeout, sleep(self.delay)).await.is_err() {
            return Err(self.failure_error(MockFailure::TimedOut, config));
        }

        match self.select_reply(prompt) {
            Some(MockReply::Text {
                text,
                finish_reason,
            }) => Ok(ProviderResponse {
                usage: TokenUsage::new(
                    estimate_tokens(system_prompt) + estimate_tokens(prompt),
                    estimate_tokens(&text),
                ),
                text,
                model: config.model.clone(),
                finish_reason,
                latency_ms: self.delay.as_millis() as u64,
            }),
            Some(MockReply::Failure(kind)) => Err(self.failure_error(kind, config)),
            None => Err(ProviderError::Unavailable {
                provider: self.name.clone(),
                message: "no mock reply configured".to_owned(),
            }),
        }
    }

    fn estimate_cost(&self, prompt_tokens: u64, completion_tokens: u64, _model: &str) -> f64 {
        (prompt_tokens as f64 / 1_000_000.0).mul_add(
            self.input_cost_per_million,
            completion_tokens as f64 / 1_000_000.0 * self.output_cost_per_million,
        )
    }
}
