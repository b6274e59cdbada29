//! Core types and traits for the arcana reading pipeline.
//!
//! This crate provides the domain model, error taxonomy, provider trait,
//! model catalog and configuration shared by the provider and routing crates.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stdout,
        clippy::print_stderr,
        reason = "Test allows"
    )
)]

/// Model catalog with pricing and tier metadata.
pub mod catalog;
/// Configuration loading and persistence.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Spreads, cards, enrichment and the structured reading document.
pub mod reading;
/// Synchronization helpers.
pub mod sync;
/// Token estimation heuristics.
pub mod tokens;
/// Trait definitions for provider adapters.
pub mod traits;
/// Core data types for provider calls.
pub mod types;

pub use catalog::{ModelCatalog, ModelMetadata};
pub use config::{
    AllocationConfig, ArcanaConfig, CacheConfig, CatalogConfig, ExecutionConfig, ProviderSettings,
    RetryConfig, RoutingSettings, TaskOverride,
};
pub use error::{Error, ProviderError, ProviderResult, Result};
pub use reading::{
    Advice, CardInterpretation, CardSnippet, DrawnCard, Enrichment, Orientation, SpreadType,
    StructuredReading, TaskType,
};
pub use sync::IgnoreLock;
pub use tokens::estimate_tokens;
pub use traits::ProviderAdapter;
pub use types::{FinishReason, ModelConfig, PerformanceTier, ProviderResponse, TokenUsage};
