//! Model catalog: pricing, tier, and availability per model id.
//!
//! The catalog is reference data. It is built once at startup (defaults plus
//! configuration overrides) and shared read-only afterwards.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::PerformanceTier;

/// Tokens per pricing unit.
const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// Static metadata about one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model identifier as sent to the provider
    pub id: String,
    /// Provider that serves this model
    pub provider: String,
    /// USD per million prompt tokens
    pub input_cost_per_million: f64,
    /// USD per million completion tokens
    pub output_cost_per_million: f64,
    /// Speed/quality bucket
    pub tier: PerformanceTier,
    /// Whether the model may be selected
    #[serde(default = "default_available")]
    pub available: bool,
}

/// Serde default for [`ModelMetadata::available`].
const fn default_available() -> bool {
    true
}

impl ModelMetadata {
    /// Creates an available model entry.
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        input_cost_per_million: f64,
        output_cost_per_million: f64,
        tier: PerformanceTier,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            input_cost_per_million,
            output_cost_per_million,
            tier,
            available: true,
        }
    }

    /// Marks the entry as unavailable.
    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Estimated USD cost of a call with the given token counts.
    #[must_use]
    pub fn estimate_cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        (prompt_tokens as f64 / TOKENS_PER_MILLION).mul_add(
            self.input_cost_per_million,
            (completion_tokens as f64 / TOKENS_PER_MILLION) * self.output_cost_per_million,
        )
    }
}

/// Lookup structure over [`ModelMetadata`], preserving insertion order.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    /// Entries in insertion order
    models: Vec<ModelMetadata>,
    /// Index from model id into `models`
    index: HashMap<String, usize>,
}

impl ModelCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog with the built-in models of every bundled provider.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        for model in [
            ModelMetadata::new("gpt-4o-mini", "openai", 0.15, 0.60, PerformanceTier::Fast),
            ModelMetadata::new("gpt-4o", "openai", 2.50, 10.00, PerformanceTier::High),
            ModelMetadata::new("llama-3.1-8b-instant", "groq", 0.05, 0.08, PerformanceTier::Fast),
            ModelMetadata::new(
                "llama-3.3-70b-versatile",
                "groq",
                0.59,
                0.79,
                PerformanceTier::Balanced,
            ),
            ModelMetadata::new(
                "deepseek/deepseek-chat",
                "openrouter",
                0.27,
                1.10,
                PerformanceTier::Balanced,
            ),
            ModelMetadata::new(
                "claude-3-5-haiku-latest",
                "anthropic",
                0.80,
                4.00,
                PerformanceTier::Balanced,
            ),
            ModelMetadata::new(
                "claude-sonnet-4-20250514",
                "anthropic",
                3.00,
                15.00,
                PerformanceTier::High,
            ),
        ] {
            catalog.insert(model);
        }
        catalog
    }

    /// Inserts a model, replacing any entry with the same id in place.
    pub fn insert(&mut self, model: ModelMetadata) {
        if let Some(&position) = self.index.get(&model.id) {
            self.models[position] = model;
        } else {
            self.index.insert(model.id.clone(), self.models.len());
            self.models.push(model);
        }
    }

    /// Looks up a model by id.
    #[must_use]
    pub fn get(&self, model_id: &str) -> Option<&ModelMetadata> {
        self.index
            .get(model_id)
            .and_then(|&position| self.models.get(position))
    }

    /// Lists models, optionally restricted to one tier and to available models.
    #[must_use]
    pub fn find(&self, tier: Option<PerformanceTier>, available_only: bool) -> Vec<&ModelMetadata> {
        self.models
            .iter()
            .filter(|model| tier.is_none_or(|wanted| model.tier == wanted))
            .filter(|model| !available_only || model.available)
            .collect()
    }

    /// Lists models whose tier is one of `tiers`.
    #[must_use]
    pub fn find_in_tiers(
        &self,
        tiers: &[PerformanceTier],
        available_only: bool,
    ) -> Vec<&ModelMetadata> {
        self.models
            .iter()
            .filter(|model| tiers.contains(&model.tier))
            .filter(|model| !available_only || model.available)
            .collect()
    }

    /// Estimated cost of a call, or `None` for an unknown model.
    #[must_use]
    pub fn estimate_cost(
        &self,
        model_id: &str,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) -> Option<f64> {
        self.get(model_id)
            .map(|model| model.estimate_cost(prompt_tokens, completion_tokens))
    }

    /// All entries in insertion order.
    #[must_use]
    pub fn models(&self) -> &[ModelMetadata] {
        &self.models
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_tier() {
        let catalog = ModelCatalog::with_defaults();
        for tier in PerformanceTier::all() {
            assert!(
                !catalog.find(Some(tier), true).is_empty(),
                "no default model for tier {tier}"
            );
        }
    }

    #[test]
    fn test_get_unknown_model_is_none() {
        let catalog = ModelCatalog::with_defaults();
        assert!(catalog.get("not-a-model").is_none());
        assert!(catalog.estimate_cost("not-a-model", 10, 10).is_none());
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut catalog = ModelCatalog::new();
        catalog.insert(ModelMetadata::new("a", "p", 1.0, 1.0, PerformanceTier::Fast));
        catalog.insert(ModelMetadata::new("b", "p", 1.0, 1.0, PerformanceTier::High));
        catalog.insert(ModelMetadata::new("a", "p", 2.0, 2.0, PerformanceTier::Balanced));

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.models()[0].id, "a");
        assert_eq!(catalog.models()[0].tier, PerformanceTier::Balanced);
    }

    #[test]
    fn test_find_respects_availability() {
        let mut catalog = ModelCatalog::new();
        catalog.insert(ModelMetadata::new("on", "p", 1.0, 1.0, PerformanceTier::Fast));
        catalog.insert(ModelMetadata::new("off", "p", 1.0, 1.0, PerformanceTier::Fast).unavailable());

        assert_eq!(catalog.find(Some(PerformanceTier::Fast), true).len(), 1);
        assert_eq!(catalog.find(Some(PerformanceTier::Fast), false).len(), 2);
        assert_eq!(catalog.find(None, false).len(), 2);
        assert!(
            catalog
                .find_in_tiers(&[PerformanceTier::High], false)
                .is_empty()
        );
    }

    #[test]
    fn test_cost_estimation() {
        let model = ModelMetadata::new("m", "p", 3.0, 15.0, PerformanceTier::High);
        let cost = model.estimate_cost(1_000_000, 1_000_000);
        assert!((cost - 18.0).abs() < 1e-9);
        assert!(model.estimate_cost(0, 0).abs() < f64::EPSILON);
    }
}
