use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use arcana_core::{ModelCatalog, ModelConfig, ModelMetadata, PerformanceTier, TaskType};
use tracing::{debug, info, warn};

use super::{BaseAllocator, ModelAllocator};
use crate::analyzer::{PromptAnalysis, Urgency};

/// Timeout multiplier above the high complexity threshold.
const HIGH_COMPLEXITY_TIMEOUT_FACTOR: f64 = 1.5;
/// Timeout multiplier above the medium complexity threshold.
const MEDIUM_COMPLEXITY_TIMEOUT_FACTOR: f64 = 1.2;

/// Picks a catalog model from the prompt analysis.
///
/// Falls back to the base table whenever dynamic allocation is disabled, no
/// analysis is supplied, the budget ceiling rules out every candidate, or the
/// chosen model is not in the catalog. Once restricted with
/// [`SmartAllocator::serving`], only models of those providers are candidates.
#[derive(Debug, Clone)]
pub struct SmartAllocator {
    base: BaseAllocator,
    catalog: Arc<ModelCatalog>,
    dynamic_enabled: bool,
    providers: Option<HashSet<String>>,
}

impl SmartAllocator {
    /// Creates a smart allocator over `base`.
    #[must_use]
    pub const fn new(base: BaseAllocator, catalog: Arc<ModelCatalog>, dynamic_enabled: bool) -> Self {
        Self {
            base,
            catalog,
            dynamic_enabled,
            providers: None,
        }
    }

    /// Restricts candidates to models served by `providers`.
    #[must_use]
    pub fn serving<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.providers = Some(providers.into_iter().map(Into::into).collect());
        self
    }

    fn is_served(&self, model: &ModelMetadata) -> bool {
        self.providers
            .as_ref()
            .is_none_or(|providers| providers.contains(&model.provider))
    }

    /// The wrapped base allocator.
    #[must_use]
    pub const fn base(&self) -> &BaseAllocator {
        &self.base
    }

    fn select(&self, task: TaskType, analysis: &PromptAnalysis) -> ModelConfig {
        let base_config = self.base.config_for(task);

        let mut candidates = self.catalog.find_in_tiers(&analysis.acceptable_tiers, true);
        candidates.retain(|model| self.is_served(model));
        if candidates.is_empty() {
            debug!("No served model in tiers {:?}; using full catalog", analysis.acceptable_tiers);
            candidates = self.catalog.find(None, true);
            candidates.retain(|model| self.is_served(model));
        }

        let cost_of = |model: &ModelMetadata| {
            model.estimate_cost(analysis.estimated_input_tokens, analysis.estimated_output_tokens)
        };

        if let Some(ceiling) = analysis.budget_ceiling {
            candidates.retain(|model| cost_of(model) <= ceiling);
            if candidates.is_empty() {
                info!("No model fits budget ${ceiling:.6} for {task}; using base config");
                return base_config;
            }
        }

        let cheapest_in = |tier: Option<PerformanceTier>| {
            candidates
                .iter()
                .copied()
                .filter(|model| tier.is_none_or(|wanted| model.tier == wanted))
                .min_by(|left, right| compare_cost(cost_of(left), cost_of(right)))
        };

        let chosen = if analysis.urgency == Urgency::High || analysis.prefer_fast {
            cheapest_in(Some(PerformanceTier::Fast)).or_else(|| cheapest_in(None))
        } else if analysis.requires_high_quality {
            cheapest_in(Some(PerformanceTier::High))
                .or_else(|| {
                    candidates
                        .iter()
                        .copied()
                        .filter(|model| model.tier == PerformanceTier::Balanced)
                        .max_by(|left, right| compare_cost(cost_of(left), cost_of(right)))
                })
                .or_else(|| cheapest_in(None))
        } else {
            cheapest_in(None)
        };

        let Some(model_id) = chosen.map(|model| model.id.clone()) else {
            return base_config;
        };
        let Some(metadata) = self.catalog.get(&model_id) else {
            warn!("Allocated model {model_id} missing from catalog; falling back to base config");
            return base_config;
        };

        let wanted_tokens = (1.5f64.mul_add(analysis.estimated_output_tokens as f64, 200.0)).ceil() as u32;
        let max_tokens = wanted_tokens
            .max(base_config.max_tokens)
            .min(self.base.hard_max_tokens());

        let timeout = if analysis.complexity > 0.7 {
            base_config.timeout.mul_f64(HIGH_COMPLEXITY_TIMEOUT_FACTOR)
        } else if analysis.complexity > 0.4 {
            base_config.timeout.mul_f64(MEDIUM_COMPLEXITY_TIMEOUT_FACTOR)
        } else {
            base_config.timeout
        };

        tracing::info!(
            "Allocated {} ({}) for {} | complexity {:.2} | est. ${:.6} | max_tokens {}",
            metadata.id,
            metadata.tier,
            task,
            analysis.complexity,
            cost_of(metadata),
            max_tokens
        );

        ModelConfig {
            model: metadata.id.clone(),
            max_tokens,
            temperature: base_config.temperature,
            timeout,
        }
    }
}

/// Total order on costs; NaN sorts last.
fn compare_cost(left: f64, right: f64) -> Ordering {
    left.partial_cmp(&right).unwrap_or(Ordering::Greater)
}

impl ModelAllocator for SmartAllocator {
    fn get_config_for_task(&self, task: TaskType, analysis: Option<&PromptAnalysis>) -> ModelConfig {
        match analysis {
            Some(analysis) if self.dynamic_enabled => self.select(task, analysis),
            _ => self.base.config_for(task),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn analysis(tiers: Vec<PerformanceTier>, complexity: f64) -> PromptAnalysis {
        PromptAnalysis {
            estimated_input_tokens: 1000,
            estimated_output_tokens: 1000,
            complexity,
            urgency: Urgency::Normal,
            requires_high_quality: false,
            acceptable_tiers: tiers,
            budget_ceiling: None,
            prefer_fast: false,
        }
    }

    fn allocator() -> SmartAllocator {
        SmartAllocator::new(
            BaseAllocator::with_defaults(),
            Arc::new(ModelCatalog::with_defaults()),
            true,
        )
    }

    #[test]
    fn test_disabled_returns_base() {
        let smart = SmartAllocator::new(
            BaseAllocator::with_defaults(),
            Arc::new(ModelCatalog::with_defaults()),
            false,
        );
        let base = BaseAllocator::with_defaults();
        let chosen = smart.get_config_for_task(
            TaskType::Advice,
            Some(&analysis(vec![PerformanceTier::High], 0.9)),
        );
        assert_eq!(chosen, base.config_for(TaskType::Advice));
    }

    #[test]
    fn test_no_analysis_returns_base() {
        let chosen = allocator().get_config_for_task(TaskType::Advice, None);
        assert_eq!(chosen, BaseAllocator::with_defaults().config_for(TaskType::Advice));
    }

    #[test]
    fn test_cheapest_in_acceptable_tiers() {
        let chosen = allocator().get_config_for_task(
            TaskType::CardInterpretation,
            Some(&analysis(vec![PerformanceTier::Fast, PerformanceTier::Balanced], 0.2)),
        );
        assert_eq!(chosen.model, "llama-3.1-8b-instant");
    }

    #[test]
    fn test_budget_below_every_model_returns_base() {
        let mut tight = analysis(vec![PerformanceTier::Balanced, PerformanceTier::High], 0.8);
        tight.budget_ceiling = Some(0.000_000_1);

        let chosen = allocator().get_config_for_task(TaskType::OverallReading, Some(&tight));
        assert_eq!(chosen, BaseAllocator::with_defaults().config_for(TaskType::OverallReading));
    }

    #[test]
    fn test_prefer_fast_picks_cheapest_fast() {
        let mut fast = analysis(vec![PerformanceTier::Fast], 0.1);
        fast.urgency = Urgency::High;
        fast.prefer_fast = true;
        let chosen = allocator().get_config_for_task(TaskType::Advice, Some(&fast));
        assert_eq!(chosen.model, "llama-3.1-8b-instant");
    }

    #[test]
    fn test_high_quality_picks_cheapest_high() {
        let mut quality = analysis(vec![PerformanceTier::High, PerformanceTier::Balanced], 0.3);
        quality.requires_high_quality = true;
        let chosen = allocator().get_config_for_task(TaskType::Advice, Some(&quality));
        assert_eq!(chosen.model, "gpt-4o");
    }

    #[test]
    fn test_high_quality_without_high_tier_takes_best_balanced() {
        let mut catalog = ModelCatalog::new();
        catalog.insert(ModelMetadata::new("cheap-bal", "p", 0.1, 0.1, PerformanceTier::Balanced));
        catalog.insert(ModelMetadata::new("rich-bal", "p", 1.0, 1.0, PerformanceTier::Balanced));
        let smart = SmartAllocator::new(BaseAllocator::with_defaults(), Arc::new(catalog), true);

        let mut quality = analysis(vec![PerformanceTier::High, PerformanceTier::Balanced], 0.3);
        quality.requires_high_quality = true;
        let chosen = smart.get_config_for_task(TaskType::Advice, Some(&quality));
        assert_eq!(chosen.model, "rich-bal");
    }

    #[test]
    fn test_max_tokens_and_timeout_scaling() {
        let base = BaseAllocator::with_defaults().config_for(TaskType::CardInterpretation);

        let complex = allocator().get_config_for_task(
            TaskType::CardInterpretation,
            Some(&analysis(vec![PerformanceTier::Balanced], 0.75)),
        );
        assert_eq!(complex.max_tokens, 1700);
        assert_eq!(complex.timeout, base.timeout.mul_f64(1.5));

        let medium = allocator().get_config_for_task(
            TaskType::CardInterpretation,
            Some(&analysis(vec![PerformanceTier::Balanced], 0.5)),
        );
        assert_eq!(medium.timeout, base.timeout.mul_f64(1.2));

        let simple = allocator().get_config_for_task(
            TaskType::CardInterpretation,
            Some(&analysis(vec![PerformanceTier::Balanced], 0.1)),
        );
        assert_eq!(simple.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_max_tokens_clamped_to_hard_ceiling() {
        let config = arcana_core::AllocationConfig {
            hard_max_tokens: 1500,
            ..arcana_core::AllocationConfig::default()
        };
        let smart = SmartAllocator::new(
            BaseAllocator::from_config(&config).unwrap(),
            Arc::new(ModelCatalog::with_defaults()),
            true,
        );
        let chosen = smart.get_config_for_task(
            TaskType::CardInterpretation,
            Some(&analysis(vec![PerformanceTier::Balanced], 0.1)),
        );
        assert_eq!(chosen.max_tokens, 1500);
    }

    #[test]
    fn test_candidates_limited_to_served_providers() {
        let smart = allocator().serving(["groq"]);

        let mut quality = analysis(vec![PerformanceTier::High, PerformanceTier::Balanced], 0.3);
        quality.requires_high_quality = true;
        let chosen = smart.get_config_for_task(TaskType::Advice, Some(&quality));
        assert_eq!(chosen.model, "llama-3.3-70b-versatile");

        let chosen = allocator()
            .serving(["openai"])
            .get_config_for_task(
                TaskType::CardInterpretation,
                Some(&analysis(vec![PerformanceTier::Fast], 0.2)),
            );
        assert_eq!(chosen.model, "gpt-4o-mini");
    }

    #[test]
    fn test_no_served_model_returns_base() {
        let smart = allocator().serving(["offline"]);
        let chosen = smart.get_config_for_task(
            TaskType::Advice,
            Some(&analysis(vec![PerformanceTier::High], 0.9)),
        );
        assert_eq!(chosen, BaseAllocator::with_defaults().config_for(TaskType::Advice));
    }

    #[test]
    fn test_empty_tier_match_uses_full_catalog() {
        let mut catalog = ModelCatalog::new();
        catalog.insert(ModelMetadata::new("only-fast", "p", 0.1, 0.1, PerformanceTier::Fast));
        let smart = SmartAllocator::new(BaseAllocator::with_defaults(), Arc::new(catalog), true);

        let chosen = smart.get_config_for_task(
            TaskType::Advice,
            Some(&analysis(vec![PerformanceTier::High], 0.9)),
        );
        assert_eq!(chosen.model, "only-fast");
    }
}
