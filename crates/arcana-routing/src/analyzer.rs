//! Prompt analysis for model allocation.
//!
//! Estimates token counts and a complexity score from the rendered prompt and
//! the reading context. Urgency and quality come only from caller hints; the
//! prompt content is never inspected for them.

use arcana_core::{Enrichment, PerformanceTier, TaskType, estimate_tokens};
use serde::{Deserialize, Serialize};

/// Categories that need no special handling.
const COMMON_CATEGORIES: [&str; 5] = ["general", "love", "career", "money", "health"];
/// Input size at which the length component saturates.
const INPUT_TOKENS_SATURATION: f64 = 4000.0;
/// Enrichment sections at which the enrichment component saturates.
const SECTIONS_SATURATION: f64 = 10.0;
/// Card count at which the spread component saturates.
const CARDS_SATURATION: f64 = 10.0;
/// Complexity below which fast models are acceptable.
const FAST_TIER_THRESHOLD: f64 = 0.5;

/// How quickly the caller needs an answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// Regular scheduling
    #[default]
    Normal,
    /// Caller asked for a fast answer
    High,
}

/// Caller-supplied preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisHints {
    /// Prefer latency over quality
    #[serde(default)]
    pub prefer_fast: bool,
    /// Maximum estimated USD per call
    #[serde(default)]
    pub budget_ceiling: Option<f64>,
    /// Insist on the high tier
    #[serde(default)]
    pub require_high_quality: bool,
}

/// Everything the analyzer looks at for one call.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisInput<'input> {
    /// Rendered user prompt
    pub prompt: &'input str,
    /// Task the call performs
    pub task: TaskType,
    /// The querent's question
    pub question: &'input str,
    /// Question category, if any
    pub category: Option<&'input str>,
    /// Reference material passed to the prompt
    pub enrichment: &'input Enrichment,
    /// Cards in the spread
    pub card_count: usize,
    /// Caller preferences
    pub hints: &'input AnalysisHints,
}

/// Result of analyzing one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptAnalysis {
    /// Estimated prompt tokens
    pub estimated_input_tokens: u64,
    /// Estimated completion tokens
    pub estimated_output_tokens: u64,
    /// 0.0 to 1.0
    pub complexity: f64,
    /// Urgency taken from the hints
    pub urgency: Urgency,
    /// Whether the high tier was requested
    pub requires_high_quality: bool,
    /// Tiers in order of preference
    pub acceptable_tiers: Vec<PerformanceTier>,
    /// Maximum estimated USD per call
    pub budget_ceiling: Option<f64>,
    /// Whether latency beats quality
    pub prefer_fast: bool,
}

/// Deterministic, side-effect free analyzer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAnalyzer;

impl PromptAnalyzer {
    /// Creates an analyzer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Analyzes one call.
    #[must_use]
    pub fn analyze(&self, input: &AnalysisInput<'_>) -> PromptAnalysis {
        let estimated_input_tokens = Self::estimate_input_tokens(input);
        let estimated_output_tokens = Self::estimate_output_tokens(input.task, input.card_count);
        let complexity = Self::complexity(
            estimated_input_tokens,
            input.enrichment.section_count(),
            input.category,
            input.card_count,
        );

        let prefer_fast = input.hints.prefer_fast;
        let requires_high_quality = input.hints.require_high_quality;
        let urgency = if prefer_fast {
            Urgency::High
        } else {
            Urgency::Normal
        };

        PromptAnalysis {
            estimated_input_tokens,
            estimated_output_tokens,
            complexity,
            urgency,
            requires_high_quality,
            acceptable_tiers: Self::acceptable_tiers(prefer_fast, requires_high_quality, complexity),
            budget_ceiling: input.hints.budget_ceiling,
            prefer_fast,
        }
    }

    /// Prompt tokens, plus the question if the renderer left it out.
    fn estimate_input_tokens(input: &AnalysisInput<'_>) -> u64 {
        let mut tokens = estimate_tokens(input.prompt);
        if !input.question.is_empty() && !input.prompt.contains(input.question) {
            tokens += estimate_tokens(input.question);
        }
        tokens
    }

    /// Expected completion size per task type.
    #[must_use]
    pub fn estimate_output_tokens(task: TaskType, card_count: usize) -> u64 {
        match task {
            TaskType::ReadingGeneration => 600 + 350 * card_count as u64,
            TaskType::CardInterpretation => 450,
            TaskType::RelationshipAnalysis => 500,
            TaskType::OverallReading => 600,
            TaskType::Advice => 400,
        }
    }

    /// Weighted blend of input size, enrichment, category rarity and spread size.
    fn complexity(
        input_tokens: u64,
        sections: usize,
        category: Option<&str>,
        card_count: usize,
    ) -> f64 {
        let length = (input_tokens as f64 / INPUT_TOKENS_SATURATION).min(1.0);
        let enrichment = (sections as f64 / SECTIONS_SATURATION).min(1.0);
        let rarity = Self::category_rarity(category);
        let cards = (card_count as f64 / CARDS_SATURATION).min(1.0);

        0.1f64
            .mul_add(cards, 0.2f64.mul_add(rarity, 0.4f64.mul_add(length, 0.3 * enrichment)))
            .clamp(0.0, 1.0)
    }

    /// 0.0 for common categories, 1.0 for anything else.
    fn category_rarity(category: Option<&str>) -> f64 {
        match category.map(str::trim) {
            None | Some("") => 0.0,
            Some(name) => {
                let lowered = name.to_ascii_lowercase();
                if COMMON_CATEGORIES.contains(&lowered.as_str()) {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }

    fn acceptable_tiers(
        prefer_fast: bool,
        requires_high_quality: bool,
        complexity: f64,
    ) -> Vec<PerformanceTier> {
        if prefer_fast {
            vec![PerformanceTier::Fast]
        } else if requires_high_quality {
            vec![PerformanceTier::High, PerformanceTier::Balanced]
        } else if complexity < FAST_TIER_THRESHOLD {
            vec![PerformanceTier::Fast, PerformanceTier::Balanced]
        } else {
            vec![PerformanceTier::Balanced, PerformanceTier::High]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(prompt: &str, task: TaskType, category: Option<&str>, cards: usize, hints: &AnalysisHints) -> PromptAnalysis {
        let enrichment = Enrichment::default();
        PromptAnalyzer::new().analyze(&AnalysisInput {
            prompt,
            task,
            question: "",
            category,
            enrichment: &enrichment,
            card_count: cards,
            hints,
        })
    }

    #[test]
    fn test_output_estimates_per_task() {
        assert_eq!(PromptAnalyzer::estimate_output_tokens(TaskType::ReadingGeneration, 1), 950);
        assert_eq!(PromptAnalyzer::estimate_output_tokens(TaskType::ReadingGeneration, 3), 1650);
        assert_eq!(PromptAnalyzer::estimate_output_tokens(TaskType::CardInterpretation, 10), 450);
        assert_eq!(PromptAnalyzer::estimate_output_tokens(TaskType::Advice, 10), 400);
    }

    #[test]
    fn test_deterministic() {
        let hints = AnalysisHints::default();
        let first = analyze("some prompt", TaskType::Advice, Some("love"), 3, &hints);
        let second = analyze("some prompt", TaskType::Advice, Some("love"), 3, &hints);
        assert_eq!(first, second);
    }

    #[test]
    fn test_simple_prompt_prefers_cheap_tiers() {
        let analysis = analyze("short", TaskType::ReadingGeneration, Some("general"), 1, &AnalysisHints::default());
        assert!(analysis.complexity < 0.5);
        assert_eq!(
            analysis.acceptable_tiers,
            vec![PerformanceTier::Fast, PerformanceTier::Balanced]
        );
        assert_eq!(analysis.urgency, Urgency::Normal);
    }

    #[test]
    fn test_rare_category_and_long_prompt_raise_complexity() {
        let long_prompt = "word ".repeat(4000);
        let analysis = analyze(&long_prompt, TaskType::ReadingGeneration, Some("spiritual"), 10, &AnalysisHints::default());
        assert!(analysis.complexity >= 0.7, "complexity {}", analysis.complexity);
        assert_eq!(
            analysis.acceptable_tiers,
            vec![PerformanceTier::Balanced, PerformanceTier::High]
        );
    }

    #[test]
    fn test_hints_drive_urgency_and_quality() {
        let fast = AnalysisHints {
            prefer_fast: true,
            ..AnalysisHints::default()
        };
        let analysis = analyze("p", TaskType::Advice, None, 1, &fast);
        assert_eq!(analysis.urgency, Urgency::High);
        assert_eq!(analysis.acceptable_tiers, vec![PerformanceTier::Fast]);

        let quality = AnalysisHints {
            require_high_quality: true,
            budget_ceiling: Some(0.01),
            ..AnalysisHints::default()
        };
        let analysis = analyze("p", TaskType::Advice, None, 1, &quality);
        assert!(analysis.requires_high_quality);
        assert_eq!(analysis.budget_ceiling, Some(0.01));
        assert_eq!(analysis.acceptable_tiers[0], PerformanceTier::High);
    }

    #[test]
    fn test_question_counted_when_missing_from_prompt() {
        let enrichment = Enrichment::default();
        let hints = AnalysisHints::default();
        let with_question = PromptAnalyzer::new().analyze(&AnalysisInput {
            prompt: "abcd",
            task: TaskType::Advice,
            question: "지금 변화를 시도해도 될까요?",
            category: None,
            enrichment: &enrichment,
            card_count: 1,
            hints: &hints,
        });
        assert!(with_question.estimated_input_tokens > 1);
    }
}
