//! Prompt rendering for each generation task.
//!
//! Every user prompt starts with a tag line naming the task, the spread and,
//! for card calls, the position. Tests and logs rely on that line to tell
//! calls apart.

use arcana_core::{DrawnCard, Enrichment, SpreadType, TaskType};

use crate::validator::{
    ADVICE_FIELD, CARD_RELATIONSHIPS, INTERPRETATION, KEY_MESSAGE, OVERALL_READING, SUMMARY,
};

/// Everything a renderer may draw on for one call.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'ctx> {
    /// Task being prompted for
    pub task: TaskType,
    /// Spread of the reading
    pub spread: SpreadType,
    /// All cards of the reading in layout order
    pub cards: &'ctx [DrawnCard],
    /// Card under interpretation for card calls
    pub focus: Option<&'ctx DrawnCard>,
    /// Reference material
    pub enrichment: &'ctx Enrichment,
    /// The querent's question
    pub question: &'ctx str,
    /// Question category, if any
    pub category: Option<&'ctx str>,
}

/// System and user prompt for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// System prompt
    pub system: String,
    /// User prompt
    pub user: String,
}

/// Turns a prompt context into prompt text.
pub trait PromptRenderer: Send + Sync {
    /// Renders the system and user prompt for one call.
    fn render(&self, context: &PromptContext<'_>) -> RenderedPrompt;
}

/// Built-in renderer producing tagged prompts with the expected JSON shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPromptRenderer;

impl PromptRenderer for DefaultPromptRenderer {
    fn render(&self, context: &PromptContext<'_>) -> RenderedPrompt {
        RenderedPrompt {
            system: system_prompt(),
            user: user_prompt(context),
        }
    }
}

/// Tag line opening every user prompt.
#[must_use]
pub fn task_tag(context: &PromptContext<'_>) -> String {
    match context.focus {
        Some(card) => format!(
            "[task: {} | spread: {} | position: {}]",
            context.task, context.spread, card.position
        ),
        None => format!("[task: {} | spread: {}]", context.task, context.spread),
    }
}

fn system_prompt() -> String {
    r"You are an experienced tarot reader writing structured readings.

RULES:
1. Answer in the same language as the querent's question.
2. Respect each card's orientation; reversed cards carry their reversed meaning.
3. Ground the reading in the question and category; do not invent cards.
4. Respond with a single JSON object and nothing else. No prose outside the JSON."
        .to_owned()
}

fn user_prompt(context: &PromptContext<'_>) -> String {
    let mut prompt = task_tag(context);
    prompt.push_str("\n\n");
    prompt.push_str(&format!("Question: \"{}\"\n", context.question));
    if let Some(category) = context.category {
        prompt.push_str(&format!("Category: {category}\n"));
    }

    prompt.push_str("\nCards:\n");
    for card in context.cards {
        prompt.push_str(&format!("- {}: {} ({})\n", card.position, card.card_name, card.orientation));
    }

    if let Some(card) = context.focus {
        prompt.push_str(&format!(
            "\nInterpret only the card in the {} position: {} ({}).\n",
            card.position, card.card_name, card.orientation
        ));
    }

    push_enrichment(&mut prompt, context);
    prompt.push_str("\nJSON SHAPE:\n");
    prompt.push_str(&json_shape(context));
    prompt
}

fn push_enrichment(prompt: &mut String, context: &PromptContext<'_>) {
    let enrichment = context.enrichment;
    let relevant: Vec<_> = match context.focus {
        Some(card) => enrichment.snippets_for(&card.card_name).collect(),
        None => enrichment
            .card_snippets
            .iter()
            .filter(|snippet| context.cards.iter().any(|card| card.card_name == snippet.card_name))
            .collect(),
    };

    if !relevant.is_empty() {
        prompt.push_str("\nCard knowledge:\n");
        for snippet in relevant {
            prompt.push_str(&format!("- {}: {}\n", snippet.card_name, snippet.content));
        }
    }
    if let Some(guidance) = &enrichment.spread_guidance {
        prompt.push_str(&format!("\nSpread guidance:\n{guidance}\n"));
    }
    if let Some(guidance) = &enrichment.category_guidance {
        prompt.push_str(&format!("\nCategory guidance:\n{guidance}\n"));
    }
}

fn card_shape(position: &str, card_name: &str) -> String {
    format!(
        r#"{{
  "position": "{position}",
  "card_name": "{card_name}",
  "orientation": "upright or reversed",
  "key_message": "{}-{} characters",
  "interpretation": "{}-{} characters"
}}"#,
        KEY_MESSAGE.min, KEY_MESSAGE.max, INTERPRETATION.min, INTERPRETATION.max
    )
}

fn advice_shape() -> String {
    let field = format!("\"{}-{} characters\"", ADVICE_FIELD.min, ADVICE_FIELD.max);
    format!(
        r#"{{
  "immediate_action": {field},
  "short_term": {field},
  "long_term": {field},
  "mindset": {field},
  "cautions": {field}
}}"#
    )
}

fn json_shape(context: &PromptContext<'_>) -> String {
    match context.task {
        TaskType::CardInterpretation => match context.focus {
            Some(card) => card_shape(&card.position, &card.card_name),
            None => card_shape("<position>", "<card name>"),
        },
        TaskType::RelationshipAnalysis => format!(
            "{{\n  \"card_relationships\": \"{}-{} characters\"\n}}",
            CARD_RELATIONSHIPS.min, CARD_RELATIONSHIPS.max
        ),
        TaskType::OverallReading => format!(
            "{{\n  \"overall_reading\": \"{}-{} characters\",\n  \"summary\": \"{}-{} characters\"\n}}",
            OVERALL_READING.min, OVERALL_READING.max, SUMMARY.min, SUMMARY.max
        ),
        TaskType::Advice => format!("{{\n  \"advice\": {}\n}}", advice_shape()),
        TaskType::ReadingGeneration => reading_shape(context),
    }
}

fn reading_shape(context: &PromptContext<'_>) -> String {
    let cards = context
        .cards
        .iter()
        .map(|card| card_shape(&card.position, &card.card_name))
        .collect::<Vec<_>>()
        .join(",\n");
    let relationships = if context.spread.requires_relationships() {
        format!(
            "\n\"card_relationships\": \"{}-{} characters\",",
            CARD_RELATIONSHIPS.min, CARD_RELATIONSHIPS.max
        )
    } else {
        String::new()
    };
    format!(
        "{{\n\"cards\": [\n{cards}\n],\n\"overall_reading\": \"{}-{} characters\",{relationships}\n\"advice\": {},\n\"summary\": \"{}-{} characters\"\n}}",
        OVERALL_READING.min,
        OVERALL_READING.max,
        advice_shape(),
        SUMMARY.min,
        SUMMARY.max
    )
}
