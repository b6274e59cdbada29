use std::collections::HashSet;

use arcana_core::{Advice, CardInterpretation, DrawnCard, Orientation, SpreadType, StructuredReading};
use serde_json::{Map, Value};

use super::{
    ADVICE_FIELD, ADVICE_FIELDS, CARD_NAME, CARD_RELATIONSHIPS, INTERPRETATION, KEY_MESSAGE,
    OVERALL_READING, POSITION, SUMMARY, ValidationReport, as_object, check_drawn_name, check_length,
    required_text,
};

/// Shape a complete reading must have for one spread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingSchema {
    /// Allowed position labels in layout order
    pub positions: Vec<String>,
    /// Whether `card_relationships` is mandatory
    pub requires_relationships: bool,
}

impl ReadingSchema {
    /// Schema for `spread`.
    #[must_use]
    pub fn for_spread(spread: SpreadType) -> Self {
        Self {
            positions: spread.positions().iter().map(|label| (*label).to_owned()).collect(),
            requires_relationships: spread.requires_relationships(),
        }
    }

    /// Validates a parsed document and converts it.
    ///
    /// # Errors
    /// Returns every violation found when the document does not conform.
    pub fn validate(&self, value: &Value) -> Result<StructuredReading, ValidationReport> {
        let mut report = ValidationReport::default();
        let Some(root) = as_object(value, "$", &mut report) else {
            return Err(report);
        };

        let cards = self.validate_cards(root, &mut report);
        let overall_reading = required_text(root, "overall_reading", "overall_reading", OVERALL_READING, &mut report);
        let summary = required_text(root, "summary", "summary", SUMMARY, &mut report);
        let card_relationships = self.validate_relationships(root, &mut report);
        let advice = match root.get("advice") {
            None | Some(Value::Null) => {
                report.push("advice", "is required");
                None
            }
            Some(advice) => validate_advice(advice, "advice", &mut report),
        };

        match (cards, overall_reading, summary, advice) {
            (Some(cards), Some(overall_reading), Some(summary), Some(advice)) if report.is_empty() => {
                Ok(StructuredReading {
                    cards,
                    overall_reading,
                    card_relationships,
                    advice,
                    summary,
                })
            }
            _ => Err(report),
        }
    }

    /// Validates a document and checks every card against the draw.
    ///
    /// # Errors
    /// Returns every violation found, including cards whose name differs from
    /// the card drawn at that position.
    pub fn validate_drawn(&self, value: &Value, drawn: &[DrawnCard]) -> Result<StructuredReading, ValidationReport> {
        let reading = self.validate(value)?;
        let mut report = ValidationReport::default();
        for (index, card) in reading.cards.iter().enumerate() {
            if let Some(source) = drawn.iter().find(|source| source.position == card.position) {
                check_drawn_name(card, source, &format!("cards[{index}]"), &mut report);
            }
        }
        report.into_result(reading)
    }

    /// Re-validates an already typed reading, e.g. one merged from sections.
    ///
    /// # Errors
    /// Returns every violation found.
    pub fn validate_structured(&self, reading: &StructuredReading) -> Result<StructuredReading, ValidationReport> {
        match serde_json::to_value(reading) {
            Ok(value) => self.validate(&value),
            Err(error) => {
                let mut report = ValidationReport::default();
                report.push("$", format!("not serializable: {error}"));
                Err(report)
            }
        }
    }

    fn validate_cards(
        &self,
        root: &Map<String, Value>,
        report: &mut ValidationReport,
    ) -> Option<Vec<CardInterpretation>> {
        let Some(items) = root.get("cards").and_then(Value::as_array) else {
            report.push("cards", "must be an array");
            return None;
        };
        if items.len() != self.positions.len() {
            report.push(
                "cards",
                format!("expected {} cards, got {}", self.positions.len(), items.len()),
            );
        }

        let mut seen = HashSet::new();
        let mut cards = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let path = format!("cards[{index}]");
            if let Some(card) = validate_card(item, &path, report) {
                if !self.positions.contains(&card.position) {
                    report.push(format!("{path}.position"), format!("'{}' is not in this spread", card.position));
                } else if !seen.insert(card.position.clone()) {
                    report.push(format!("{path}.position"), format!("'{}' appears twice", card.position));
                }
                cards.push(card);
            }
        }

        (cards.len() == items.len()).then_some(cards)
    }

    fn validate_relationships(&self, root: &Map<String, Value>, report: &mut ValidationReport) -> Option<String> {
        match root.get("card_relationships") {
            None | Some(Value::Null) => {
                if self.requires_relationships {
                    report.push("card_relationships", "is required for this spread");
                }
                None
            }
            Some(Value::String(text)) => {
                check_length(text, "card_relationships", CARD_RELATIONSHIPS, report);
                Some(text.clone())
            }
            Some(_) => {
                report.push("card_relationships", "must be a string");
                None
            }
        }
    }
}

/// Validates one card object; orientation defaults to upright when absent.
pub(crate) fn validate_card(value: &Value, path: &str, report: &mut ValidationReport) -> Option<CardInterpretation> {
    let object = as_object(value, path, report)?;
    let position = required_text(object, "position", &format!("{path}.position"), POSITION, report);
    let card_name = required_text(object, "card_name", &format!("{path}.card_name"), CARD_NAME, report);
    let key_message = required_text(object, "key_message", &format!("{path}.key_message"), KEY_MESSAGE, report);
    let interpretation = required_text(
        object,
        "interpretation",
        &format!("{path}.interpretation"),
        INTERPRETATION,
        report,
    );
    let orientation = match object.get("orientation").and_then(Value::as_str) {
        Some(text) if text.eq_ignore_ascii_case("reversed") => Orientation::Reversed,
        _ => Orientation::Upright,
    };

    Some(CardInterpretation {
        position: position?,
        card_name: card_name?,
        orientation,
        key_message: key_message?,
        interpretation: interpretation?,
    })
}

/// Validates the five-field advice object at `path`.
pub(crate) fn validate_advice(value: &Value, path: &str, report: &mut ValidationReport) -> Option<Advice> {
    let object = as_object(value, path, report)?;
    let [immediate_action, short_term, long_term, mindset, cautions] =
        ADVICE_FIELDS.map(|key| required_text(object, key, &format!("{path}.{key}"), ADVICE_FIELD, report));

    Some(Advice {
        immediate_action: immediate_action?,
        short_term: short_term?,
        long_term: long_term?,
        mindset: mindset?,
        cautions: cautions?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card(position: &str) -> Value {
        json!({
            "position": position,
            "card_name": "The Star",
            "orientation": "upright",
            "key_message": "Hope returns",
            "interpretation": "A period of renewal follows the recent turbulence; trust the slow return of clarity.",
        })
    }

    fn advice() -> Value {
        json!({
            "immediate_action": "Write down what you want",
            "short_term": "Talk to one trusted friend",
            "long_term": "Build a steady routine",
            "mindset": "Patience over urgency",
            "cautions": "Avoid rushing commitments",
        })
    }

    fn overall() -> String {
        "The spread describes a transition from uncertainty toward renewed direction, ".repeat(2)
    }

    fn three_card() -> Value {
        json!({
            "cards": [card("Past"), card("Present"), card("Future")],
            "overall_reading": overall(),
            "advice": advice(),
            "summary": "Renewal after a hard season",
        })
    }

    #[test]
    fn test_valid_three_card_reading() {
        let schema = ReadingSchema::for_spread(SpreadType::ThreeCard);
        let reading = schema.validate(&three_card()).unwrap();
        assert_eq!(reading.cards.len(), 3);
        assert!(reading.card_relationships.is_none());
    }

    #[test]
    fn test_collects_every_violation() {
        let mut value = three_card();
        value["summary"] = json!("x".repeat(151));
        value["advice"]["mindset"] = Value::Null;
        value["cards"][1]["position"] = json!("Crown");

        let report = ReadingSchema::for_spread(SpreadType::ThreeCard)
            .validate(&value)
            .unwrap_err();
        assert_eq!(report.len(), 3, "{report}");
        assert!(report.mentions("summary"));
        assert!(report.mentions("advice.mindset"));
        assert!(report.mentions("cards[1].position"));
    }

    #[test]
    fn test_card_count_and_duplicates() {
        let mut value = three_card();
        value["cards"] = json!([card("Past"), card("Past")]);
        let report = ReadingSchema::for_spread(SpreadType::ThreeCard)
            .validate(&value)
            .unwrap_err();
        assert!(report.mentions("cards"));
        assert!(report.mentions("cards[1].position"));
    }

    #[test]
    fn test_celtic_cross_requires_relationships() {
        let positions = SpreadType::CelticCross.positions();
        let mut value = json!({
            "cards": positions.iter().map(|label| card(label)).collect::<Vec<_>>(),
            "overall_reading": overall(),
            "advice": advice(),
            "summary": "Renewal after a hard season",
        });
        let schema = ReadingSchema::for_spread(SpreadType::CelticCross);
        let report = schema.validate(&value).unwrap_err();
        assert!(report.mentions("card_relationships"));

        value["card_relationships"] = json!("The Challenge and the Outcome mirror each other across the cross.");
        let reading = schema.validate(&value).unwrap();
        assert_eq!(reading.cards.len(), 10);
        assert!(reading.card_relationships.is_some());
    }

    #[test]
    fn test_validate_drawn_flags_substituted_card() {
        let drawn = vec![
            DrawnCard::new("Past", "The Star"),
            DrawnCard::new("Present", "The Tower"),
            DrawnCard::new("Future", "THE STAR"),
        ];
        let report = ReadingSchema::for_spread(SpreadType::ThreeCard)
            .validate_drawn(&three_card(), &drawn)
            .unwrap_err();
        assert_eq!(report.len(), 1, "{report}");
        assert!(report.mentions("cards[1].card_name"));
    }

    #[test]
    fn test_non_object_root() {
        let report = ReadingSchema::for_spread(SpreadType::OneCard)
            .validate(&json!([1, 2]))
            .unwrap_err();
        assert!(report.mentions("$"));
    }

    #[test]
    fn test_structured_round_trip_through_validation() {
        let schema = ReadingSchema::for_spread(SpreadType::ThreeCard);
        let reading = schema.validate(&three_card()).unwrap();
        assert_eq!(schema.validate_structured(&reading).unwrap(), reading);
    }
}
