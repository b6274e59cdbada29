//! Validators for the independently generated sections of a parallel spread.

use arcana_core::{Advice, CardInterpretation, DrawnCard};
use serde_json::Value;

use super::schema::{validate_advice, validate_card};
use super::{
    CARD_RELATIONSHIPS, OVERALL_READING, SUMMARY, ValidationReport, as_object, check_drawn_name, required_text,
};

/// Overall narrative and summary line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverallSection {
    /// Narrative across the whole spread
    pub overall_reading: String,
    /// One-line summary
    pub summary: String,
}

/// Parses one card section and pins it to the drawn card.
///
/// The position and card name must match the draw; orientation always comes
/// from the draw.
///
/// # Errors
/// Returns every violation found.
pub fn parse_card_section(value: &Value, drawn: &DrawnCard) -> Result<CardInterpretation, ValidationReport> {
    let mut report = ValidationReport::default();
    let card = validate_card(value, "card", &mut report);
    match card {
        Some(mut card) if report.is_empty() => {
            if card.position != drawn.position {
                report.push(
                    "card.position",
                    format!("expected '{}', got '{}'", drawn.position, card.position),
                );
            }
            check_drawn_name(&card, drawn, "card", &mut report);
            card.orientation = drawn.orientation;
            report.into_result(card)
        }
        _ => Err(report),
    }
}

/// Parses the relationships narrative.
///
/// # Errors
/// Returns every violation found.
pub fn parse_relationships_section(value: &Value) -> Result<String, ValidationReport> {
    let mut report = ValidationReport::default();
    let text = as_object(value, "$", &mut report).and_then(|object| {
        required_text(object, "card_relationships", "card_relationships", CARD_RELATIONSHIPS, &mut report)
    });
    match text {
        Some(text) => report.into_result(text),
        None => Err(report),
    }
}

/// Parses the overall narrative plus summary.
///
/// # Errors
/// Returns every violation found.
pub fn parse_overall_section(value: &Value) -> Result<OverallSection, ValidationReport> {
    let mut report = ValidationReport::default();
    let Some(object) = as_object(value, "$", &mut report) else {
        return Err(report);
    };
    let overall_reading = required_text(object, "overall_reading", "overall_reading", OVERALL_READING, &mut report);
    let summary = required_text(object, "summary", "summary", SUMMARY, &mut report);
    match (overall_reading, summary) {
        (Some(overall_reading), Some(summary)) => report.into_result(OverallSection {
            overall_reading,
            summary,
        }),
        _ => Err(report),
    }
}

/// Parses the advice section, accepting `{"advice": {...}}` or the bare object.
///
/// # Errors
/// Returns every violation found.
pub fn parse_advice_section(value: &Value) -> Result<Advice, ValidationReport> {
    let mut report = ValidationReport::default();
    let (inner, path) = match value.get("advice") {
        Some(inner) => (inner, "advice"),
        None => (value, "$"),
    };
    match validate_advice(inner, path, &mut report) {
        Some(advice) => report.into_result(advice),
        None => Err(report),
    }
}
