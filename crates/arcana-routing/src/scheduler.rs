//! Spread scheduling: one whole-reading call for small spreads, independent
//! section calls under a concurrency bound for the Celtic cross.

use std::sync::Arc;

use arcana_core::{
    Advice, CardInterpretation, DrawnCard, Enrichment, SpreadType, StructuredReading, TaskType,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::allocator::ModelAllocator;
use crate::analyzer::{AnalysisHints, AnalysisInput, PromptAnalyzer};
use crate::error::{ReadingError, Result};
use crate::events::{ProgressChannel, ProgressEvent};
use crate::extract::extract_and_parse;
use crate::ledger::UsageLedger;
use crate::orchestrator::GenerationRequest;
use crate::prompts::{PromptContext, PromptRenderer};
use crate::retry::{ExecutionPath, RetryController};
use crate::validator::{
    OverallSection, ReadingSchema, parse_advice_section, parse_card_section, parse_overall_section,
    parse_relationships_section,
};

/// A validated reading request with cards in layout order.
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadRequest {
    /// Spread to lay out
    pub spread: SpreadType,
    /// Drawn cards in layout order
    pub cards: Vec<DrawnCard>,
    /// Reference material
    pub enrichment: Enrichment,
    /// The querent's question
    pub question: String,
    /// Non-blank category, if any
    pub category: Option<String>,
    /// Allocation preferences
    pub hints: AnalysisHints,
}

/// One independently generated part of a parallel spread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionTask {
    /// Card at this index of the request's cards
    Card(usize),
    /// How the cards relate
    Relationships,
    /// Overall narrative and summary
    Overall,
    /// Five-part advice
    Advice,
}

impl SectionTask {
    /// Every section of a parallel spread over `card_count` cards.
    #[must_use]
    pub fn plan(card_count: usize) -> Vec<Self> {
        (0..card_count)
            .map(Self::Card)
            .chain([Self::Relationships, Self::Overall, Self::Advice])
            .collect()
    }

    /// Task type the section is generated under.
    #[must_use]
    pub const fn task_type(&self) -> TaskType {
        match self {
            Self::Card(_) => TaskType::CardInterpretation,
            Self::Relationships => TaskType::RelationshipAnalysis,
            Self::Overall => TaskType::OverallReading,
            Self::Advice => TaskType::Advice,
        }
    }

    /// Label used in progress events and logs.
    #[must_use]
    pub fn label(&self, cards: &[DrawnCard]) -> String {
        match self {
            Self::Card(index) => cards
                .get(*index)
                .map_or_else(|| format!("card:{index}"), |card| format!("card:{}", card.position)),
            other => other.task_type().to_string(),
        }
    }
}

/// Parsed output of one section.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SectionOutput {
    Card(CardInterpretation),
    Relationships(String),
    Overall(OverallSection),
    Advice(Advice),
}

/// Issues the generation calls for a spread and assembles the reading.
#[derive(Clone)]
pub struct SpreadScheduler {
    retry: RetryController,
    allocator: Arc<dyn ModelAllocator>,
    analyzer: PromptAnalyzer,
    renderer: Arc<dyn PromptRenderer>,
    max_concurrent: usize,
    progress: Option<ProgressChannel>,
}

impl SpreadScheduler {
    /// Creates a scheduler; `max_concurrent` below one is treated as one.
    pub fn new(
        retry: RetryController,
        allocator: Arc<dyn ModelAllocator>,
        renderer: Arc<dyn PromptRenderer>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            retry,
            allocator,
            analyzer: PromptAnalyzer::new(),
            renderer,
            max_concurrent: max_concurrent.max(1),
            progress: None,
        }
    }

    /// Replaces the prompt renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Attaches a progress channel.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressChannel) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Upper bound on in-flight section calls.
    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Generates the reading for `request`, appending every call to `ledger`.
    ///
    /// # Errors
    /// Returns the first exhausted section's error, or a validation error if
    /// the merged reading does not conform.
    pub async fn generate(&self, request: Arc<SpreadRequest>, ledger: &UsageLedger) -> Result<StructuredReading> {
        if request.spread.is_parallel() {
            self.generate_parallel(request, ledger).await
        } else {
            self.generate_single(&request, ledger).await
        }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(progress) = &self.progress {
            progress.send(event);
        }
    }

    /// Renders, analyzes and allocates one call.
    fn prepare(&self, request: &SpreadRequest, task: TaskType, focus: Option<&DrawnCard>) -> GenerationRequest {
        let context = PromptContext {
            task,
            spread: request.spread,
            cards: &request.cards,
            focus,
            enrichment: &request.enrichment,
            question: &request.question,
            category: request.category.as_deref(),
        };
        let rendered = self.renderer.render(&context);

        let analysis = self.analyzer.analyze(&AnalysisInput {
            prompt: &rendered.user,
            task,
            question: &request.question,
            category: request.category.as_deref(),
            enrichment: &request.enrichment,
            card_count: request.cards.len(),
            hints: &request.hints,
        });
        let config = self.allocator.get_config_for_task(task, Some(&analysis));
        debug!(
            "{task}: model {} max_tokens {} (complexity {:.2})",
            config.model, config.max_tokens, analysis.complexity
        );

        GenerationRequest {
            prompt: rendered.user,
            system_prompt: rendered.system,
            config,
            purpose: task.as_str().to_owned(),
        }
    }

    async fn generate_single(&self, request: &SpreadRequest, ledger: &UsageLedger) -> Result<StructuredReading> {
        let section = TaskType::ReadingGeneration.to_string();
        let generation = self.prepare(request, TaskType::ReadingGeneration, None);
        let schema = ReadingSchema::for_spread(request.spread);

        self.emit(ProgressEvent::SectionStarted {
            section: section.clone(),
        });
        let outcome = self
            .retry
            .run(generation, ExecutionPath::Single, ledger, |text| {
                let value = extract_and_parse(text, TaskType::ReadingGeneration.as_str())?;
                schema
                    .validate_drawn(&value, &request.cards)
                    .map_err(ReadingError::Validation)
            })
            .await;

        match outcome {
            Ok(mut reading) => {
                align_with_draw(&mut reading.cards, &request.cards);
                self.emit(ProgressEvent::SectionCompleted { section });
                Ok(reading)
            }
            Err(error) => {
                self.emit(ProgressEvent::SectionFailed {
                    section,
                    error: error.to_string(),
                });
                Err(error)
            }
        }
    }

    async fn generate_parallel(&self, request: Arc<SpreadRequest>, ledger: &UsageLedger) -> Result<StructuredReading> {
        let sections = SectionTask::plan(request.cards.len());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        info!(
            "Scheduling {} sections for {} (max {} concurrent)",
            sections.len(),
            request.spread,
            self.max_concurrent
        );

        let mut join_set = JoinSet::new();
        for (index, section) in sections.iter().cloned().enumerate() {
            let scheduler = self.clone();
            let request = Arc::clone(&request);
            let ledger = ledger.clone();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let result = scheduler.run_section(&request, &section, &ledger, semaphore).await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<Result<SectionOutput>>> = vec![None; sections.len()];
        let mut join_failure = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(result);
                    }
                }
                Err(error) => {
                    warn!("Section task did not complete: {error}");
                    if join_failure.is_none() {
                        join_failure = Some(ReadingError::TaskFailed(error.to_string()));
                    }
                }
            }
        }

        let mut outputs = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Some(Ok(output)) => outputs.push(output),
                Some(Err(error)) => return Err(error),
                None => {
                    return Err(join_failure
                        .unwrap_or_else(|| ReadingError::TaskFailed("section result missing".to_owned())));
                }
            }
        }

        let reading = merge(&request, outputs)?;
        self.emit(ProgressEvent::ReadingMerged {
            sections: sections.len(),
        });
        Ok(reading)
    }

    /// Runs one section under a semaphore permit held for its whole retry loop.
    async fn run_section(
        &self,
        request: &SpreadRequest,
        section: &SectionTask,
        ledger: &UsageLedger,
        semaphore: Arc<Semaphore>,
    ) -> Result<SectionOutput> {
        let _permit = semaphore
            .acquire_owned()
            .await
            .map_err(|error| ReadingError::TaskFailed(error.to_string()))?;

        let label = section.label(&request.cards);
        self.emit(ProgressEvent::SectionStarted {
            section: label.clone(),
        });

        let outcome = match section {
            SectionTask::Card(index) => match request.cards.get(*index) {
                Some(drawn) => {
                    let generation = self.prepare(request, TaskType::CardInterpretation, Some(drawn));
                    self.retry
                        .run(generation, ExecutionPath::Parallel, ledger, |text| {
                            let value = extract_and_parse(text, TaskType::CardInterpretation.as_str())?;
                            parse_card_section(&value, drawn).map_err(ReadingError::Validation)
                        })
                        .await
                        .map(SectionOutput::Card)
                }
                None => Err(ReadingError::InvalidRequest(format!("no card at index {index}"))),
            },
            SectionTask::Relationships => {
                let generation = self.prepare(request, TaskType::RelationshipAnalysis, None);
                self.retry
                    .run(generation, ExecutionPath::Parallel, ledger, |text| {
                        let value = extract_and_parse(text, TaskType::RelationshipAnalysis.as_str())?;
                        parse_relationships_section(&value).map_err(ReadingError::Validation)
                    })
                    .await
                    .map(SectionOutput::Relationships)
            }
            SectionTask::Overall => {
                let generation = self.prepare(request, TaskType::OverallReading, None);
                self.retry
                    .run(generation, ExecutionPath::Parallel, ledger, |text| {
                        let value = extract_and_parse(text, TaskType::OverallReading.as_str())?;
                        parse_overall_section(&value).map_err(ReadingError::Validation)
                    })
                    .await
                    .map(SectionOutput::Overall)
            }
            SectionTask::Advice => {
                let generation = self.prepare(request, TaskType::Advice, None);
                self.retry
                    .run(generation, ExecutionPath::Parallel, ledger, |text| {
                        let value = extract_and_parse(text, TaskType::Advice.as_str())?;
                        parse_advice_section(&value).map_err(ReadingError::Validation)
                    })
                    .await
                    .map(SectionOutput::Advice)
            }
        };

        match &outcome {
            Ok(_) => self.emit(ProgressEvent::SectionCompleted { section: label }),
            Err(error) => {
                warn!("Section {label} failed: {error}");
                self.emit(ProgressEvent::SectionFailed {
                    section: label,
                    error: error.to_string(),
                });
            }
        }
        outcome
    }
}

/// Assembles section outputs in layout order and validates the result.
fn merge(request: &SpreadRequest, outputs: Vec<SectionOutput>) -> Result<StructuredReading> {
    let mut cards = Vec::with_capacity(request.cards.len());
    let mut relationships = None;
    let mut overall = None;
    let mut advice = None;

    for output in outputs {
        match output {
            SectionOutput::Card(card) => cards.push(card),
            SectionOutput::Relationships(text) => relationships = Some(text),
            SectionOutput::Overall(section) => overall = Some(section),
            SectionOutput::Advice(section) => advice = Some(section),
        }
    }

    let (Some(overall), Some(advice)) = (overall, advice) else {
        return Err(ReadingError::TaskFailed("overall or advice section missing".to_owned()));
    };
    align_with_draw(&mut cards, &request.cards);

    let reading = StructuredReading {
        cards,
        overall_reading: overall.overall_reading,
        card_relationships: relationships,
        advice,
        summary: overall.summary,
    };
    ReadingSchema::for_spread(request.spread)
        .validate_structured(&reading)
        .map_err(ReadingError::Validation)
}

/// Orders interpretations like the draw and copies each drawn orientation.
fn align_with_draw(cards: &mut [CardInterpretation], drawn: &[DrawnCard]) {
    let rank = |position: &str| {
        drawn
            .iter()
            .position(|card| card.position == position)
            .unwrap_or(usize::MAX)
    };
    cards.sort_by_key(|card| rank(&card.position));
    for card in cards.iter_mut() {
        if let Some(source) = drawn.iter().find(|source| source.position == card.position) {
            card.orientation = source.orientation;
        }
    }
}
