//! Shared fixtures for arcana-routing integration tests.
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

use std::env;
use std::sync::{Arc, Once};

use arcana_core::{ArcanaConfig, DrawnCard, ProviderAdapter, SpreadType};
use arcana_providers::{MockProvider, MockReply};
use arcana_routing::ReadingPipeline;
use serde_json::{Value, json};
use tracing_subscriber::{EnvFilter, fmt};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests (idempotent).
/// Honors `RUST_LOG` if set, otherwise defaults to "debug".
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_owned());
        if fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_test_writer()
            .try_init()
            .is_err()
        {
            // already initialized in this process
        }
    });
}

const CARD_NAMES: [&str; 10] = [
    "The Fool",
    "The Magician",
    "The High Priestess",
    "The Empress",
    "The Emperor",
    "The Hierophant",
    "The Lovers",
    "The Chariot",
    "Strength",
    "The Hermit",
];

/// One drawn card per position of `spread`; every other card reversed.
pub fn draw(spread: SpreadType) -> Vec<DrawnCard> {
    spread
        .positions()
        .iter()
        .zip(CARD_NAMES)
        .enumerate()
        .map(|(index, (position, name))| {
            let card = DrawnCard::new(*position, name);
            if index % 2 == 1 { card.reversed() } else { card }
        })
        .collect()
}

pub fn card_json(position: &str, card_name: &str) -> Value {
    json!({
        "position": position,
        "card_name": card_name,
        "orientation": "upright",
        "key_message": format!("{card_name} speaks to {position}"),
        "interpretation": format!(
            "In the {position} position, {card_name} points to a steady shift in how you meet change and choose your next step."
        ),
    })
}

pub fn relationships_json() -> Value {
    json!({
        "card_relationships": "The challenge and the outcome mirror each other, while the foundation quietly supports the crown."
    })
}

pub fn overall_json() -> Value {
    json!({
        "overall_reading": "Across the spread a single thread appears: a season of uncertainty giving way to deliberate, grounded movement toward what matters most.",
        "summary": "Uncertainty turns into grounded movement",
    })
}

pub fn advice_json() -> Value {
    json!({
        "advice": {
            "immediate_action": "Write down the one decision you keep postponing",
            "short_term": "Share your plan with a trusted friend this week",
            "long_term": "Build a routine that protects your energy",
            "mindset": "Patience is a form of strength",
            "cautions": "Avoid committing before you have the facts",
        }
    })
}

/// Complete reading document for `cards`.
pub fn reading_json(spread: SpreadType, cards: &[DrawnCard]) -> Value {
    let mut reading = json!({
        "cards": cards
            .iter()
            .map(|card| card_json(&card.position, &card.card_name))
            .collect::<Vec<_>>(),
        "overall_reading": overall_json()["overall_reading"],
        "advice": advice_json()["advice"],
        "summary": overall_json()["summary"],
    });
    if spread.requires_relationships() {
        reading["card_relationships"] = relationships_json()["card_relationships"].clone();
    }
    reading
}

/// Wraps a document in a fenced block the way chat models usually answer.
pub fn fenced(value: &Value) -> String {
    format!("Here is your reading:\n```json\n{value:#}\n```")
}

/// Tag line prefix of a card call for `position`.
pub fn card_tag(position: &str) -> String {
    format!("position: {position}]")
}

/// Mock that answers every task of `spread` with valid output.
pub fn reading_provider(name: &str, spread: SpreadType) -> MockProvider {
    with_valid_rules(MockProvider::new(name), spread)
}

/// Appends rules answering every task of `spread` with valid output.
///
/// Rules match first-come, so rules already on `provider` take precedence.
pub fn with_valid_rules(provider: MockProvider, spread: SpreadType) -> MockProvider {
    let cards = draw(spread);
    let mut provider = provider;
    for card in &cards {
        provider = provider.with_rule(
            card_tag(&card.position),
            MockReply::text(fenced(&card_json(&card.position, &card.card_name))),
        );
    }
    provider
        .with_rule("[task: relationship_analysis", MockReply::text(fenced(&relationships_json())))
        .with_rule("[task: overall_reading", MockReply::text(fenced(&overall_json())))
        .with_rule("[task: advice", MockReply::text(fenced(&advice_json())))
        .with_rule(
            "[task: reading_generation",
            MockReply::text(fenced(&reading_json(spread, &cards))),
        )
}

/// Pipeline over mock providers with the default configuration.
pub fn pipeline(providers: &[MockProvider]) -> ReadingPipeline {
    pipeline_with(&ArcanaConfig::default(), providers)
}

pub fn pipeline_with(config: &ArcanaConfig, providers: &[MockProvider]) -> ReadingPipeline {
    let adapters = providers
        .iter()
        .map(|provider| Arc::new(provider.clone()) as Arc<dyn ProviderAdapter>)
        .collect();
    ReadingPipeline::with_providers(config, adapters).unwrap()
}
