//! Reading domain types: spreads, drawn cards, enrichment, and the structured
//! reading document produced by the pipeline.
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::Error;

/// Position labels of the one-card spread.
const ONE_CARD_POSITIONS: [&str; 1] = ["Guidance"];
/// Position labels of the three-card spread.
const THREE_CARD_POSITIONS: [&str; 3] = ["Past", "Present", "Future"];
/// Position labels of the Celtic cross spread.
const CELTIC_CROSS_POSITIONS: [&str; 10] = [
    "Present",
    "Challenge",
    "Foundation",
    "Recent Past",
    "Crown",
    "Near Future",
    "Self",
    "Environment",
    "Hopes and Fears",
    "Outcome",
];

/// Named layout of labeled positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadType {
    /// Single card
    OneCard,
    /// Past, present, future
    ThreeCard,
    /// Ten-position Celtic cross
    CelticCross,
}

impl SpreadType {
    /// Position labels in layout order.
    #[must_use]
    pub const fn positions(self) -> &'static [&'static str] {
        match self {
            Self::OneCard => &ONE_CARD_POSITIONS,
            Self::ThreeCard => &THREE_CARD_POSITIONS,
            Self::CelticCross => &CELTIC_CROSS_POSITIONS,
        }
    }

    /// Number of positions in the layout.
    #[must_use]
    pub const fn position_count(self) -> usize {
        self.positions().len()
    }

    /// Whether positions can be interpreted by independent calls.
    #[must_use]
    pub const fn is_parallel(self) -> bool {
        matches!(self, Self::CelticCross)
    }

    /// Whether the reading must carry a relationships narrative.
    #[must_use]
    pub const fn requires_relationships(self) -> bool {
        self.is_parallel()
    }
}

impl Display for SpreadType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::OneCard => write!(f, "one_card"),
            Self::ThreeCard => write!(f, "three_card"),
            Self::CelticCross => write!(f, "celtic_cross"),
        }
    }
}

impl FromStr for SpreadType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().replace('-', "_").as_str() {
            "one_card" | "single" => Ok(Self::OneCard),
            "three_card" | "triple" => Ok(Self::ThreeCard),
            "celtic_cross" => Ok(Self::CelticCross),
            other => Err(Error::Config(format!("Unknown spread type: {other}"))),
        }
    }
}

/// Upright or reversed, decided when the card was drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Card drawn upright
    #[default]
    Upright,
    /// Card drawn reversed
    Reversed,
}

impl Display for Orientation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Upright => write!(f, "upright"),
            Self::Reversed => write!(f, "reversed"),
        }
    }
}

/// A card placed in a spread position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawnCard {
    /// Position label within the spread
    pub position: String,
    /// Card name, e.g. "The Tower"
    pub card_name: String,
    /// Upright or reversed
    #[serde(default)]
    pub orientation: Orientation,
}

impl DrawnCard {
    /// Creates an upright card at `position`.
    pub fn new(position: impl Into<String>, card_name: impl Into<String>) -> Self {
        Self {
            position: position.into(),
            card_name: card_name.into(),
            orientation: Orientation::Upright,
        }
    }

    /// Marks the card as reversed.
    #[must_use]
    pub fn reversed(mut self) -> Self {
        self.orientation = Orientation::Reversed;
        self
    }
}

/// Knowledge snippet about one card from the retrieval subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSnippet {
    /// Card the snippet describes
    pub card_name: String,
    /// Free-form snippet text
    pub content: String,
}

/// Retrieval context passed through to prompt rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    /// Card-level knowledge snippets
    #[serde(default)]
    pub card_snippets: Vec<CardSnippet>,
    /// Spread-level interpretation guidance
    #[serde(default)]
    pub spread_guidance: Option<String>,
    /// Category guidance (love, career, ...)
    #[serde(default)]
    pub category_guidance: Option<String>,
}

impl Enrichment {
    /// Adds a card snippet.
    #[must_use]
    pub fn with_card_snippet(mut self, card_name: impl Into<String>, content: impl Into<String>) -> Self {
        self.card_snippets.push(CardSnippet {
            card_name: card_name.into(),
            content: content.into(),
        });
        self
    }

    /// Sets the spread guidance.
    #[must_use]
    pub fn with_spread_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.spread_guidance = Some(guidance.into());
        self
    }

    /// Sets the category guidance.
    #[must_use]
    pub fn with_category_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.category_guidance = Some(guidance.into());
        self
    }

    /// Number of non-empty sections carried.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.card_snippets.len()
            + usize::from(self.spread_guidance.is_some())
            + usize::from(self.category_guidance.is_some())
    }

    /// Snippets for one card.
    pub fn snippets_for<'snip>(&'snip self, card_name: &'snip str) -> impl Iterator<Item = &'snip CardSnippet> {
        self.card_snippets
            .iter()
            .filter(move |snippet| snippet.card_name == card_name)
    }
}

/// Kind of generation call; selects allocation row and prompt shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Whole reading in one document
    ReadingGeneration,
    /// One position of a parallel spread
    CardInterpretation,
    /// Narrative on how the cards relate
    RelationshipAnalysis,
    /// Overall narrative and summary line
    OverallReading,
    /// Five-field advice object
    Advice,
}

impl TaskType {
    /// Stable tag used in purpose labels and configuration keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadingGeneration => "reading_generation",
            Self::CardInterpretation => "card_interpretation",
            Self::RelationshipAnalysis => "relationship_analysis",
            Self::OverallReading => "overall_reading",
            Self::Advice => "advice",
        }
    }

    /// Every task type.
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::ReadingGeneration,
            Self::CardInterpretation,
            Self::RelationshipAnalysis,
            Self::OverallReading,
            Self::Advice,
        ]
    }
}

impl Display for TaskType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|task| task.as_str() == value)
            .ok_or_else(|| Error::Config(format!("Unknown task type: {value}")))
    }
}

/// Interpretation of the card in one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInterpretation {
    /// Position label
    pub position: String,
    /// Card name
    pub card_name: String,
    /// Upright or reversed
    #[serde(default)]
    pub orientation: Orientation,
    /// One-line message
    pub key_message: String,
    /// Interpretation body
    pub interpretation: String,
}

/// Advice section with five fixed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    /// What to do now
    pub immediate_action: String,
    /// Next few weeks
    pub short_term: String,
    /// Months ahead
    pub long_term: String,
    /// Attitude to hold
    pub mindset: String,
    /// Things to watch out for
    pub cautions: String,
}

/// Final validated multi-section reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredReading {
    /// Per-position interpretations in layout order
    pub cards: Vec<CardInterpretation>,
    /// Overall narrative
    pub overall_reading: String,
    /// How the cards relate; absent for small spreads
    #[serde(default)]
    pub card_relationships: Option<String>,
    /// Advice object
    pub advice: Advice,
    /// Short summary line
    pub summary: String,
}
