//! Canned replies for `--mock` readings.
//!
//! The offline provider answers every task of a spread with valid JSON built
//! from the drawn cards, so the full pipeline runs without network access.

use arcana_core::{DrawnCard, SpreadType, TaskType};
use arcana_providers::{MockProvider, MockReply};
use serde_json::{Value, json};

/// Provider name used when the configuration names no primary.
const FALLBACK_NAME: &str = "offline";

/// Builds the offline provider for `cards`, registered under `name`.
pub fn offline_provider(name: Option<&str>, spread: SpreadType, cards: &[DrawnCard]) -> MockProvider {
    let mut provider = MockProvider::new(name.unwrap_or(FALLBACK_NAME)).with_default_model("offline-tarot");

    for card in cards {
        provider = provider.with_rule(
            format!("position: {}]", card.position),
            reply(&card_section(card)),
        );
    }

    provider
        .with_rule(task_pattern(TaskType::RelationshipAnalysis), reply(&relationships_section(cards)))
        .with_rule(task_pattern(TaskType::OverallReading), reply(&overall_section(cards)))
        .with_rule(task_pattern(TaskType::Advice), reply(&json!({ "advice": advice() })))
        .with_rule(
            task_pattern(TaskType::ReadingGeneration),
            reply(&full_reading(spread, cards)),
        )
}

fn task_pattern(task: TaskType) -> String {
    format!("[task: {task}")
}

fn reply(value: &Value) -> MockReply {
    MockReply::text(format!("```json\n{value:#}\n```"))
}

fn card_section(card: &DrawnCard) -> Value {
    json!({
        "position": card.position,
        "card_name": card.card_name,
        "orientation": card.orientation,
        "key_message": format!("{} ({}) colors the {}", card.card_name, card.orientation, card.position),
        "interpretation": format!(
            "Drawn {} in the {} position, {} asks you to notice where this energy already moves in your life and to meet it deliberately.",
            card.orientation, card.position, card.card_name
        ),
    })
}

fn card_list(cards: &[DrawnCard]) -> String {
    cards
        .iter()
        .map(|card| card.card_name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn relationships_section(cards: &[DrawnCard]) -> Value {
    json!({
        "card_relationships": format!(
            "Read together, {} form one movement: each card answers the tension left open by the one before it.",
            card_list(cards)
        )
    })
}

fn overall_section(cards: &[DrawnCard]) -> Value {
    json!({
        "overall_reading": format!(
            "This offline reading draws on {}. Taken as a whole the spread describes a period of quiet reorientation, where small honest choices matter more than dramatic gestures.",
            card_list(cards)
        ),
        "summary": "Small honest choices lead the way",
    })
}

fn advice() -> Value {
    json!({
        "immediate_action": "Name the one decision you have been postponing",
        "short_term": "Take a single concrete step on it this week",
        "long_term": "Keep a steady routine that protects your focus",
        "mindset": "Curiosity serves you better than fear",
        "cautions": "Avoid promising more than you can keep",
    })
}

fn full_reading(spread: SpreadType, cards: &[DrawnCard]) -> Value {
    let overall = overall_section(cards);
    let mut reading = json!({
        "cards": cards.iter().map(card_section).collect::<Vec<_>>(),
        "overall_reading": overall["overall_reading"],
        "advice": advice(),
        "summary": overall["summary"],
    });
    if spread.requires_relationships() {
        reading["card_relationships"] = relationships_section(cards)["card_relationships"].clone();
    }
    reading
}
