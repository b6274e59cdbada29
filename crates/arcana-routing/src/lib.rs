//! Reading generation: analysis, allocation, provider fallback, parse repair
//! and spread scheduling.
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

/// Model allocation from task type and prompt analysis.
pub mod allocator;
/// Prompt analysis for allocation.
pub mod analyzer;
/// Response caching decorator.
pub mod cache;
/// Reading error type.
pub mod error;
/// Progress events.
pub mod events;
/// JSON extraction from model text.
pub mod extract;
/// Attempt ledger.
pub mod ledger;
/// Sequential provider fallback.
pub mod orchestrator;
/// Pipeline facade.
pub mod pipeline;
/// Prompt rendering.
pub mod prompts;
/// Parse-repair retries.
pub mod retry;
/// Spread scheduling.
pub mod scheduler;
/// Reading schema validation.
pub mod validator;

pub use allocator::{BaseAllocator, ModelAllocator, SmartAllocator};
pub use analyzer::{AnalysisHints, AnalysisInput, PromptAnalysis, PromptAnalyzer, Urgency};
pub use cache::{CacheStats, CachedGeneration, CachingGenerator, ResponseCache};
pub use error::{ReadingError, Result};
pub use events::{ProgressChannel, ProgressEvent};
pub use extract::{extract_and_parse, extract_json};
pub use ledger::{LedgerReport, PurposeSummary, UsageLedger};
pub use orchestrator::{
    GenerationAttempt, GenerationRequest, Generator, Orchestrator, OrchestratorResult,
};
pub use pipeline::{FailureStage, ReadingFailure, ReadingPipeline, ReadingRequest};
pub use prompts::{DefaultPromptRenderer, PromptContext, PromptRenderer, RenderedPrompt};
pub use retry::{ExecutionPath, RetryController, RetryPolicy, RetryState};
pub use scheduler::{SectionTask, SpreadRequest, SpreadScheduler};
pub use validator::{ReadingSchema, ValidationReport, Violation};
