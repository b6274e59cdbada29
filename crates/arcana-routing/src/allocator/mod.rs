//! Model allocation: task type (and optional analysis) to model configuration.

/// Static task table.
pub mod base;
/// Catalog-driven selection.
pub mod smart;

pub use base::BaseAllocator;
pub use smart::SmartAllocator;

use arcana_core::{ModelConfig, TaskType};

use crate::analyzer::PromptAnalysis;

/// Shared interface of the base and smart allocators.
pub trait ModelAllocator: Send + Sync {
    /// Returns the model configuration for one call.
    fn get_config_for_task(&self, task: TaskType, analysis: Option<&PromptAnalysis>) -> ModelConfig;
}
