//! Structural validation of model output against the reading schema.
//!
//! Validators collect every violation before failing so that a single retry
//! can address all of them.

/// Full-reading schema.
pub mod schema;
/// Per-section schemas for the parallel path.
pub mod sections;

pub use schema::ReadingSchema;
pub use sections::{
    OverallSection, parse_advice_section, parse_card_section, parse_overall_section,
    parse_relationships_section,
};

use arcana_core::{CardInterpretation, DrawnCard};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Inclusive character-count bounds for one text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthBound {
    /// Fewest characters allowed
    pub min: usize,
    /// Most characters allowed
    pub max: usize,
}

impl LengthBound {
    const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }
}

/// Bounds of a position label.
pub const POSITION: LengthBound = LengthBound::new(1, 50);
/// Bounds of a card name.
pub const CARD_NAME: LengthBound = LengthBound::new(1, 100);
/// Bounds of a card's key message.
pub const KEY_MESSAGE: LengthBound = LengthBound::new(5, 200);
/// Bounds of a card interpretation.
pub const INTERPRETATION: LengthBound = LengthBound::new(50, 1500);
/// Bounds of the overall narrative.
pub const OVERALL_READING: LengthBound = LengthBound::new(100, 3000);
/// Bounds of the relationships narrative.
pub const CARD_RELATIONSHIPS: LengthBound = LengthBound::new(50, 2000);
/// Bounds of each advice field.
pub const ADVICE_FIELD: LengthBound = LengthBound::new(10, 500);
/// Bounds of the one-line summary.
pub const SUMMARY: LengthBound = LengthBound::new(10, 150);

/// Names of the five advice fields.
pub const ADVICE_FIELDS: [&str; 5] = [
    "immediate_action",
    "short_term",
    "long_term",
    "mindset",
    "cautions",
];

/// One violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON path of the offending field, e.g. `cards[2].interpretation`
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

/// Every violation found in one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Violations in discovery order
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Records a violation.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Whether the document conformed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Whether any violation concerns `field`.
    #[must_use]
    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|violation| violation.field == field)
    }

    /// `Ok(value)` when no violation was recorded.
    ///
    /// # Errors
    /// Returns the report itself when it is non-empty.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} violation(s): ", self.violations.len())?;
        for (index, violation) in self.violations.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", violation.field, violation.message)?;
        }
        Ok(())
    }
}

/// Reads a required bounded string field, recording violations.
pub(crate) fn required_text(
    object: &Map<String, Value>,
    key: &str,
    path: &str,
    bound: LengthBound,
    report: &mut ValidationReport,
) -> Option<String> {
    match object.get(key) {
        None | Some(Value::Null) => {
            report.push(path, "is required");
            None
        }
        Some(Value::String(text)) => {
            check_length(text, path, bound, report);
            Some(text.clone())
        }
        Some(_) => {
            report.push(path, "must be a string");
            None
        }
    }
}

/// Records a violation when `text` is outside `bound`.
pub(crate) fn check_length(text: &str, path: &str, bound: LengthBound, report: &mut ValidationReport) {
    let length = text.trim().chars().count();
    if length < bound.min {
        report.push(path, format!("too short ({length} < {} chars)", bound.min));
    } else if length > bound.max {
        report.push(path, format!("too long ({length} > {} chars)", bound.max));
    }
}

/// Reports a card interpreted under a different name than the one drawn.
///
/// Names compare case-insensitively after trimming.
pub(crate) fn check_drawn_name(card: &CardInterpretation, drawn: &DrawnCard, path: &str, report: &mut ValidationReport) {
    if card.card_name.trim().to_lowercase() != drawn.card_name.trim().to_lowercase() {
        report.push(
            format!("{path}.card_name"),
            format!("expected '{}', got '{}'", drawn.card_name, card.card_name),
        );
    }
}

/// Top-level object or a single violation.
pub(crate) fn as_object<'doc>(
    value: &'doc Value,
    path: &str,
    report: &mut ValidationReport,
) -> Option<&'doc Map<String, Value>> {
    let object = value.as_object();
    if object.is_none() {
        report.push(path, "must be an object");
    }
    object
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_display_lists_every_violation() {
        let mut report = ValidationReport::default();
        report.push("summary", "too long");
        report.push("advice.mindset", "is required");
        assert_eq!(
            report.to_string(),
            "2 violation(s): summary: too long; advice.mindset: is required"
        );
        assert!(report.mentions("summary"));
    }

    #[test]
    fn test_required_text_bounds_count_characters() {
        let value = json!({"summary": "열 글자가 넘는 요약입니다"});
        let mut report = ValidationReport::default();
        let text = required_text(value.as_object().unwrap(), "summary", "summary", SUMMARY, &mut report);
        assert!(text.is_some());
        assert!(report.is_empty(), "{report}");

        let short = json!({"summary": "짧음"});
        required_text(short.as_object().unwrap(), "summary", "summary", SUMMARY, &mut report);
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn test_drawn_name_ignores_case_and_padding() {
        let drawn = DrawnCard::new("Outcome", "The Tower");
        let card = |name: &str| CardInterpretation {
            position: "Outcome".to_owned(),
            card_name: name.to_owned(),
            orientation: drawn.orientation,
            key_message: "Sudden change".to_owned(),
            interpretation: "Structures give way".to_owned(),
        };
        let mut report = ValidationReport::default();
        check_drawn_name(&card(" the tower "), &drawn, "card", &mut report);
        assert!(report.is_empty(), "{report}");

        check_drawn_name(&card("The Fool"), &drawn, "card", &mut report);
        assert!(report.mentions("card.card_name"));
    }

    #[test]
    fn test_wrong_type_and_missing() {
        let value = json!({"summary": 3});
        let mut report = ValidationReport::default();
        required_text(value.as_object().unwrap(), "summary", "summary", SUMMARY, &mut report);
        required_text(value.as_object().unwrap(), "missing", "missing", SUMMARY, &mut report);
        assert_eq!(report.len(), 2);
        assert_eq!(report.violations[0].message, "must be a string");
        assert_eq!(report.violations[1].message, "is required");
    }
}
