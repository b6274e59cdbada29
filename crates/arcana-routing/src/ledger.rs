//! Append-only record of every generation attempt made for one reading.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use arcana_core::IgnoreLock as _;
use serde::{Deserialize, Serialize};

use crate::orchestrator::GenerationAttempt;

/// Purpose suffix carried by retried calls.
pub const PARSE_RETRY_SUFFIX: &str = ":parse_retry";

/// Shared, lock-protected attempt ledger.
///
/// Clones share the same entries, so sub-tasks of a parallel spread can all
/// append to one ledger.
#[derive(Debug, Clone, Default)]
pub struct UsageLedger {
    entries: Arc<Mutex<Vec<GenerationAttempt>>>,
}

/// Totals for one purpose tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurposeSummary {
    /// Calls made under this purpose
    pub attempts: usize,
    /// Their cost in USD
    pub cost: f64,
    /// Their total tokens
    pub tokens: u64,
}

/// Aggregated view of a ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerReport {
    /// Every recorded call
    pub attempts: usize,
    /// Calls that returned a response
    pub successful: usize,
    /// Calls that returned an error
    pub failed: usize,
    /// Sum of costs in USD
    pub total_cost: f64,
    /// Cost of calls that were not retries
    pub first_pass_cost: f64,
    /// Cost of `:parse_retry` calls
    pub repair_cost: f64,
    /// Prompt tokens across all calls
    pub prompt_tokens: u64,
    /// Completion tokens across all calls
    pub completion_tokens: u64,
    /// Summed latency; parallel calls overlap
    pub total_latency_ms: u64,
    /// Totals keyed by purpose tag
    pub by_purpose: BTreeMap<String, PurposeSummary>,
}

impl UsageLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one attempt.
    pub fn record(&self, attempt: GenerationAttempt) {
        self.entries.lock_ignore_poison().push(attempt);
    }

    /// Appends attempts in order.
    pub fn record_all(&self, attempts: impl IntoIterator<Item = GenerationAttempt>) {
        self.entries.lock_ignore_poison().extend(attempts);
    }

    /// Copy of all entries in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<GenerationAttempt> {
        self.entries.lock_ignore_poison().clone()
    }

    /// Number of recorded attempts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock_ignore_poison().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock_ignore_poison().is_empty()
    }

    /// Sum of attempt costs in USD.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.entries.lock_ignore_poison().iter().map(|attempt| attempt.cost).sum()
    }

    /// Sum of attempt tokens.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.entries
            .lock_ignore_poison()
            .iter()
            .map(|attempt| attempt.total_tokens)
            .sum()
    }

    /// Sum of attempt latencies.
    #[must_use]
    pub fn total_latency_ms(&self) -> u64 {
        self.entries
            .lock_ignore_poison()
            .iter()
            .map(|attempt| attempt.latency_ms)
            .sum()
    }

    /// Cost of calls made before any repair retry.
    #[must_use]
    pub fn first_pass_cost(&self) -> f64 {
        self.total_cost() - self.repair_cost()
    }

    /// Cost of repair retries.
    #[must_use]
    pub fn repair_cost(&self) -> f64 {
        self.entries
            .lock_ignore_poison()
            .iter()
            .filter(|attempt| attempt.purpose.ends_with(PARSE_RETRY_SUFFIX))
            .map(|attempt| attempt.cost)
            .sum()
    }

    /// Aggregates the ledger into a report.
    #[must_use]
    pub fn report(&self) -> LedgerReport {
        let entries = self.snapshot();
        let mut report = LedgerReport {
            attempts: entries.len(),
            ..LedgerReport::default()
        };

        for attempt in &entries {
            if attempt.success {
                report.successful += 1;
            } else {
                report.failed += 1;
            }
            report.total_cost += attempt.cost;
            if attempt.purpose.ends_with(PARSE_RETRY_SUFFIX) {
                report.repair_cost += attempt.cost;
            } else {
                report.first_pass_cost += attempt.cost;
            }
            report.prompt_tokens += attempt.prompt_tokens;
            report.completion_tokens += attempt.completion_tokens;
            report.total_latency_ms += attempt.latency_ms;

            let summary = report.by_purpose.entry(attempt.purpose.clone()).or_default();
            summary.attempts += 1;
            summary.cost += attempt.cost;
            summary.tokens += attempt.total_tokens;
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcana_core::{FinishReason, ModelConfig, ProviderError, ProviderResponse, TokenUsage};
    use std::time::Duration;

    fn config() -> ModelConfig {
        ModelConfig::new("mock-model", 1000, 0.7, Duration::from_secs(5))
    }

    fn success(purpose: &str, cost: f64) -> GenerationAttempt {
        let response = ProviderResponse {
            text: "{}".to_owned(),
            model: "mock-model".to_owned(),
            usage: TokenUsage::new(100, 50),
            finish_reason: FinishReason::Stop,
            latency_ms: 20,
        };
        GenerationAttempt::succeeded("mock", &config(), purpose, &response, cost)
    }

    #[test]
    fn test_totals_and_split() {
        let ledger = UsageLedger::new();
        ledger.record(success("advice", 0.01));
        ledger.record(success("advice:parse_retry", 0.02));
        ledger.record(GenerationAttempt::failed(
            "other",
            &config(),
            "advice",
            &ProviderError::Unavailable {
                provider: "other".to_owned(),
                message: "down".to_owned(),
            },
            7,
        ));

        assert_eq!(ledger.len(), 3);
        assert!((ledger.total_cost() - 0.03).abs() < 1e-12);
        assert!((ledger.repair_cost() - 0.02).abs() < 1e-12);
        assert!((ledger.first_pass_cost() - 0.01).abs() < 1e-12);
        assert_eq!(ledger.total_tokens(), 300);
        assert_eq!(ledger.total_latency_ms(), 47);

        let report = ledger.report();
        assert_eq!(report.successful, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.by_purpose["advice"].attempts, 2);
        assert_eq!(report.by_purpose["advice:parse_retry"].tokens, 150);
    }

    #[test]
    fn test_clones_share_entries() {
        let ledger = UsageLedger::new();
        let shared = ledger.clone();
        shared.record_all([success("a", 0.0), success("b", 0.0)]);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.snapshot()[1].purpose, "b");
    }

    #[test]
    fn test_report_serializes() {
        let ledger = UsageLedger::new();
        ledger.record(success("overall_reading", 0.5));
        let json = serde_json::to_value(ledger.report()).unwrap();
        assert_eq!(json["attempts"], 1);
        assert_eq!(json["by_purpose"]["overall_reading"]["attempts"], 1);
    }
}
