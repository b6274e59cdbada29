//! Provider fallback, concurrency and allocation behavior seen through the pipeline.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

mod common;

use std::time::Duration;

use arcana_core::{ArcanaConfig, Enrichment, SpreadType};
use arcana_providers::{MockFailure, MockReply};
use arcana_routing::{AnalysisHints, ReadingRequest};
use common::{draw, init_tracing, pipeline, pipeline_with, reading_provider};

fn one_card_request(hints: AnalysisHints) -> ReadingRequest {
    ReadingRequest {
        spread: SpreadType::OneCard,
        cards: draw(SpreadType::OneCard),
        enrichment: Enrichment::default(),
        question: "Is this the right time?".to_owned(),
        category: None,
        hints,
    }
}

#[tokio::test]
async fn test_rate_limited_primary_falls_back_to_secondary() {
    init_tracing();
    let primary = reading_provider("openai", SpreadType::ThreeCard)
        .with_scripted(MockReply::failure(MockFailure::RateLimited));
    let secondary = reading_provider("anthropic", SpreadType::ThreeCard);

    let (reading, ledger) = pipeline(&[primary.clone(), secondary.clone()])
        .generate_reading(
            SpreadType::ThreeCard,
            draw(SpreadType::ThreeCard),
            Enrichment::default(),
            "What is blocking me?",
            None,
        )
        .await
        .unwrap();

    assert_eq!(reading.cards.len(), 3);
    let attempts = ledger.snapshot();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].provider, "openai");
    assert!(!attempts[0].success);
    assert!(attempts[0].error.is_some());
    assert_eq!(attempts[1].provider, "anthropic");
    assert!(attempts[1].success);
    // a provider failure is not a parse failure
    assert!(attempts.iter().all(|attempt| attempt.purpose == "reading_generation"));
    assert_eq!(primary.call_count(), 1);
    assert_eq!(secondary.call_count(), 1);
}

#[tokio::test]
async fn test_parallel_spread_respects_concurrency_cap() {
    init_tracing();
    let provider = reading_provider("openai", SpreadType::CelticCross).with_delay(Duration::from_millis(50));

    let (reading, ledger) = pipeline(&[provider.clone()])
        .generate_reading(
            SpreadType::CelticCross,
            draw(SpreadType::CelticCross),
            Enrichment::default(),
            "Where am I headed?",
            None,
        )
        .await
        .unwrap();

    assert_eq!(reading.cards.len(), 10);
    assert_eq!(ledger.len(), 13);
    assert_eq!(provider.call_count(), 13);
    let peak = provider.peak_in_flight();
    assert!(peak <= 5, "peak in flight was {peak}");
    assert!(peak >= 2, "sections never overlapped");
}

#[tokio::test]
async fn test_configured_concurrency_of_one_serializes_sections() {
    let mut config = ArcanaConfig::default();
    config.execution.max_concurrent_calls = 1;
    let provider = reading_provider("openai", SpreadType::CelticCross).with_delay(Duration::from_millis(5));

    pipeline_with(&config, &[provider.clone()])
        .generate_reading(
            SpreadType::CelticCross,
            draw(SpreadType::CelticCross),
            Enrichment::default(),
            "q?",
            None,
        )
        .await
        .unwrap();

    assert_eq!(provider.peak_in_flight(), 1);
}

#[tokio::test]
async fn test_budget_ceiling_below_every_model_uses_base_config() {
    init_tracing();
    let mut config = ArcanaConfig::default();
    config.allocation.dynamic_enabled = true;
    let provider = reading_provider("openai", SpreadType::OneCard);

    let hints = AnalysisHints {
        prefer_fast: true,
        budget_ceiling: Some(0.000_000_1),
        require_high_quality: false,
    };
    let (_reading, ledger) = pipeline_with(&config, &[provider.clone()])
        .generate(one_card_request(hints))
        .await
        .unwrap();

    let call = &provider.calls()[0];
    assert_eq!(call.model, "gpt-4o-mini");
    assert_eq!(call.max_tokens, 4000);
    assert_eq!(ledger.snapshot()[0].model, "gpt-4o-mini");
}

#[tokio::test]
async fn test_dynamic_allocation_routes_fast_requests_to_served_fast_model() {
    let mut config = ArcanaConfig::default();
    config.allocation.dynamic_enabled = true;
    let provider = reading_provider("openai", SpreadType::OneCard);

    let hints = AnalysisHints {
        prefer_fast: true,
        ..AnalysisHints::default()
    };
    pipeline_with(&config, &[provider.clone()])
        .generate(one_card_request(hints))
        .await
        .unwrap();

    // the cheaper groq model is not a candidate without a groq provider
    assert_eq!(provider.calls()[0].model, "gpt-4o-mini");
}

#[tokio::test]
async fn test_high_quality_on_groq_only_takes_best_balanced_model() {
    let mut config = ArcanaConfig::default();
    config.allocation.dynamic_enabled = true;
    let provider = reading_provider("groq", SpreadType::OneCard);

    let quality = AnalysisHints {
        require_high_quality: true,
        ..AnalysisHints::default()
    };
    let (_reading, ledger) = pipeline_with(&config, &[provider.clone()])
        .generate(one_card_request(quality))
        .await
        .unwrap();
    assert_eq!(provider.calls()[0].model, "llama-3.3-70b-versatile");
    assert_eq!(ledger.snapshot()[0].model, "llama-3.3-70b-versatile");

    let fast = AnalysisHints {
        prefer_fast: true,
        ..AnalysisHints::default()
    };
    pipeline_with(&config, &[provider.clone()])
        .generate(one_card_request(fast))
        .await
        .unwrap();
    assert_eq!(provider.calls()[1].model, "llama-3.1-8b-instant");
}
