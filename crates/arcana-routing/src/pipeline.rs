//! Reading pipeline facade: request validation, wiring and failure staging.

use std::collections::HashSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::result::Result as StdResult;
use std::sync::Arc;

use arcana_core::{
    ArcanaConfig, DrawnCard, Enrichment, ModelCatalog, ProviderAdapter, SpreadType, StructuredReading,
};
use arcana_providers::ProviderRegistry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::allocator::{BaseAllocator, SmartAllocator};
use crate::analyzer::AnalysisHints;
use crate::cache::CachingGenerator;
use crate::error::{ReadingError, Result};
use crate::events::ProgressChannel;
use crate::ledger::UsageLedger;
use crate::orchestrator::{Generator, Orchestrator};
use crate::prompts::{DefaultPromptRenderer, PromptRenderer};
use crate::retry::{RetryController, RetryPolicy};
use crate::scheduler::{SpreadRequest, SpreadScheduler};

/// What the caller asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRequest {
    /// Spread to lay out
    pub spread: SpreadType,
    /// One drawn card per position, in any order
    pub cards: Vec<DrawnCard>,
    /// Reference material for the prompts
    #[serde(default)]
    pub enrichment: Enrichment,
    /// The querent's question
    pub question: String,
    /// Question category, e.g. `love`
    #[serde(default)]
    pub category: Option<String>,
    /// Allocation preferences
    #[serde(default)]
    pub hints: AnalysisHints,
}

/// Stage at which a reading failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// The request itself was malformed
    Input,
    /// Every provider failed
    ProviderExhaustion,
    /// Output never parsed or validated within the retry budget
    ParseExhaustion,
    /// Scheduling or configuration failure
    Internal,
}

impl FailureStage {
    /// Stage an error belongs to.
    #[must_use]
    pub fn classify(error: &ReadingError) -> Self {
        if error.is_provider_exhaustion() {
            return Self::ProviderExhaustion;
        }
        match error {
            ReadingError::InvalidRequest(_) => Self::Input,
            ReadingError::BudgetExhausted { .. } => Self::ParseExhaustion,
            other if other.is_repairable() => Self::ParseExhaustion,
            _ => Self::Internal,
        }
    }
}

impl Display for FailureStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Input => write!(f, "input"),
            Self::ProviderExhaustion => write!(f, "provider exhaustion"),
            Self::ParseExhaustion => write!(f, "parse exhaustion"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// A failed reading with every attempt made before the failure.
#[derive(Debug, Error)]
#[error("Reading failed at {stage} stage: {error}")]
pub struct ReadingFailure {
    /// Stage that failed
    pub stage: FailureStage,
    /// Underlying error
    pub error: ReadingError,
    /// Every attempt made before the failure
    pub ledger: UsageLedger,
}

impl ReadingFailure {
    fn new(error: ReadingError, ledger: UsageLedger) -> Self {
        Self {
            stage: FailureStage::classify(&error),
            error,
            ledger,
        }
    }
}

/// Entry point turning a reading request into a validated reading.
///
/// Built once from configuration; holds no per-request state.
#[derive(Clone)]
pub struct ReadingPipeline {
    scheduler: SpreadScheduler,
    provider_names: Vec<String>,
}

impl ReadingPipeline {
    /// Builds every enabled provider through `registry` and wires the pipeline.
    ///
    /// # Errors
    /// Returns a configuration error when the configuration is invalid or no
    /// provider could be built.
    pub fn from_config(config: &ArcanaConfig, registry: &ProviderRegistry) -> Result<Self> {
        config.validate()?;
        let catalog = Arc::new(config.build_catalog());
        let providers = registry.build_enabled(config, &catalog)?;
        Self::assemble(config, providers, catalog)
    }

    /// Wires the pipeline over already constructed providers.
    ///
    /// # Errors
    /// Returns a configuration error when the configuration is invalid or
    /// `providers` is empty.
    pub fn with_providers(config: &ArcanaConfig, providers: Vec<Arc<dyn ProviderAdapter>>) -> Result<Self> {
        config.validate()?;
        let catalog = Arc::new(config.build_catalog());
        Self::assemble(config, providers, catalog)
    }

    fn assemble(
        config: &ArcanaConfig,
        providers: Vec<Arc<dyn ProviderAdapter>>,
        catalog: Arc<ModelCatalog>,
    ) -> Result<Self> {
        let orchestrator = Orchestrator::with_priority(
            providers,
            config.routing.primary.as_deref(),
            &config.routing.fallbacks,
            Arc::clone(&catalog),
        )?;
        let provider_names: Vec<String> = orchestrator
            .provider_names()
            .into_iter()
            .map(str::to_owned)
            .collect();

        let generator: Arc<dyn Generator> = if config.cache.enabled {
            Arc::new(CachingGenerator::new(orchestrator, config.cache.clone()))
        } else {
            Arc::new(orchestrator)
        };

        let base = BaseAllocator::from_config(&config.allocation)?;
        let policy = RetryPolicy::from_config(&config.retry, base.hard_max_tokens());
        let allocator = SmartAllocator::new(base, catalog, config.allocation.dynamic_enabled)
            .serving(provider_names.iter().cloned());

        info!(
            "Reading pipeline ready: providers [{}], dynamic allocation {}, cache {}",
            provider_names.join(", "),
            if config.allocation.dynamic_enabled { "on" } else { "off" },
            if config.cache.enabled { "on" } else { "off" }
        );

        let scheduler = SpreadScheduler::new(
            RetryController::new(generator, policy),
            Arc::new(allocator),
            Arc::new(DefaultPromptRenderer),
            config.execution.max_concurrent_calls,
        );
        Ok(Self {
            scheduler,
            provider_names,
        })
    }

    /// Replaces the prompt renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.scheduler = self.scheduler.with_renderer(renderer);
        self
    }

    /// Sends progress events to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressChannel) -> Self {
        self.scheduler = self.scheduler.with_progress(progress);
        self
    }

    /// Providers in the order they are tried.
    #[must_use]
    pub fn provider_names(&self) -> &[String] {
        &self.provider_names
    }

    /// Generates a reading with default hints.
    ///
    /// # Errors
    /// Returns a [`ReadingFailure`] naming the failed stage, with the ledger of
    /// every attempt made.
    pub async fn generate_reading(
        &self,
        spread: SpreadType,
        cards: Vec<DrawnCard>,
        enrichment: Enrichment,
        question: &str,
        category: Option<&str>,
    ) -> StdResult<(StructuredReading, UsageLedger), ReadingFailure> {
        self.generate(ReadingRequest {
            spread,
            cards,
            enrichment,
            question: question.to_owned(),
            category: category.map(str::to_owned),
            hints: AnalysisHints::default(),
        })
        .await
    }

    /// Generates a reading for a full request.
    ///
    /// # Errors
    /// Returns a [`ReadingFailure`] naming the failed stage, with the ledger of
    /// every attempt made.
    pub async fn generate(&self, request: ReadingRequest) -> StdResult<(StructuredReading, UsageLedger), ReadingFailure> {
        let ledger = UsageLedger::new();
        let spread_request = match validate_request(request) {
            Ok(valid) => valid,
            Err(error) => return Err(ReadingFailure::new(error, ledger)),
        };

        info!(
            "Generating {} reading with {} card(s)",
            spread_request.spread,
            spread_request.cards.len()
        );
        match self.scheduler.generate(Arc::new(spread_request), &ledger).await {
            Ok(reading) => {
                info!(
                    "Reading complete: {} attempt(s), ${:.6}, {} tokens",
                    ledger.len(),
                    ledger.total_cost(),
                    ledger.total_tokens()
                );
                Ok((reading, ledger))
            }
            Err(error) => Err(ReadingFailure::new(error, ledger)),
        }
    }
}

/// Checks the request against its spread and puts cards in layout order.
fn validate_request(request: ReadingRequest) -> Result<SpreadRequest> {
    let ReadingRequest {
        spread,
        mut cards,
        enrichment,
        question,
        category,
        hints,
    } = request;

    if question.trim().is_empty() {
        return Err(ReadingError::InvalidRequest("question must not be empty".to_owned()));
    }
    let labels = spread.positions();
    if cards.len() != labels.len() {
        return Err(ReadingError::InvalidRequest(format!(
            "{spread} needs {} card(s), got {}",
            labels.len(),
            cards.len()
        )));
    }

    let mut seen = HashSet::new();
    for card in &cards {
        if !labels.contains(&card.position.as_str()) {
            return Err(ReadingError::InvalidRequest(format!(
                "position '{}' is not part of {spread} (expected one of: {})",
                card.position,
                labels.join(", ")
            )));
        }
        if !seen.insert(card.position.as_str()) {
            return Err(ReadingError::InvalidRequest(format!(
                "position '{}' given twice",
                card.position
            )));
        }
        if card.card_name.trim().is_empty() {
            return Err(ReadingError::InvalidRequest(format!(
                "card name missing at position '{}'",
                card.position
            )));
        }
    }

    cards.sort_by_key(|card| {
        labels
            .iter()
            .position(|label| *label == card.position)
            .unwrap_or(usize::MAX)
    });

    Ok(SpreadRequest {
        spread,
        cards,
        enrichment,
        question,
        category: category.filter(|value| !value.trim().is_empty()),
        hints,
    })
}
