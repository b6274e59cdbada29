use std::collections::HashMap;
use std::time::Duration;

use arcana_core::{AllocationConfig, ModelConfig, TaskType};
use tracing::debug;

use super::ModelAllocator;
use crate::analyzer::PromptAnalysis;
use crate::error::{ReadingError, Result};

/// Default model for every task.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Static task-type to configuration table.
///
/// Loaded once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct BaseAllocator {
    table: HashMap<TaskType, ModelConfig>,
    hard_max_tokens: u32,
}

impl BaseAllocator {
    /// Built-in table.
    #[must_use]
    pub fn with_defaults() -> Self {
        let table = TaskType::all()
            .into_iter()
            .map(|task| (task, Self::default_config(task)))
            .collect();
        Self {
            table,
            hard_max_tokens: AllocationConfig::default().hard_max_tokens,
        }
    }

    /// Built-in table with configured overrides applied.
    ///
    /// # Errors
    /// Returns a configuration error for an unknown task key.
    pub fn from_config(config: &AllocationConfig) -> Result<Self> {
        let mut allocator = Self::with_defaults();
        allocator.hard_max_tokens = config.hard_max_tokens;

        for (key, overrides) in &config.tasks {
            let task = key
                .parse::<TaskType>()
                .map_err(|error| ReadingError::Config(error.to_string()))?;
            let entry = allocator
                .table
                .entry(task)
                .or_insert_with(|| Self::default_config(task));
            if let Some(model) = &overrides.model {
                entry.model.clone_from(model);
            }
            if let Some(max_tokens) = overrides.max_tokens {
                entry.max_tokens = max_tokens;
            }
            if let Some(temperature) = overrides.temperature {
                entry.temperature = temperature;
            }
            if let Some(timeout) = overrides.timeout_seconds {
                entry.timeout = Duration::from_secs(timeout);
            }
            debug!("Allocation override for {task}: {entry:?}");
        }

        for entry in allocator.table.values_mut() {
            entry.max_tokens = entry.max_tokens.min(allocator.hard_max_tokens);
        }
        Ok(allocator)
    }

    /// Hard per-call output token ceiling.
    #[must_use]
    pub const fn hard_max_tokens(&self) -> u32 {
        self.hard_max_tokens
    }

    /// Table entry for a task.
    #[must_use]
    pub fn config_for(&self, task: TaskType) -> ModelConfig {
        self.table
            .get(&task)
            .cloned()
            .unwrap_or_else(|| Self::default_config(task))
    }

    fn default_config(task: TaskType) -> ModelConfig {
        let (max_tokens, temperature, timeout_secs) = match task {
            TaskType::ReadingGeneration => (4000, 0.7, 60),
            TaskType::CardInterpretation => (1200, 0.7, 30),
            TaskType::RelationshipAnalysis | TaskType::OverallReading => (1500, 0.7, 40),
            TaskType::Advice => (1000, 0.6, 30),
        };
        ModelConfig::new(
            DEFAULT_MODEL,
            max_tokens,
            temperature,
            Duration::from_secs(timeout_secs),
        )
    }
}

impl ModelAllocator for BaseAllocator {
    fn get_config_for_task(&self, task: TaskType, _analysis: Option<&PromptAnalysis>) -> ModelConfig {
        self.config_for(task)
    }
}
