use arcana_core::Error as CoreError;
use serde_json::Error as JsonError;
use std::result::Result as StdResult;
use thiserror::Error;

use crate::orchestrator::GenerationAttempt;
use crate::validator::ValidationReport;

/// Result type for reading generation.
pub type Result<T> = StdResult<T, ReadingError>;

/// Failure of one stage of reading generation.
#[derive(Debug, Clone, Error)]
pub enum ReadingError {
    /// No structured block was found in model output.
    #[error("No JSON payload found in {purpose} output: {preview}")]
    Extraction {
        /// Purpose tag of the call
        purpose: String,
        /// Start of the offending output
        preview: String,
    },

    /// A structured block was found but is not valid JSON.
    #[error("Malformed JSON at line {line}, column {column}: {message}")]
    Parse {
        /// Parser message
        message: String,
        /// 1-based line of the error
        line: usize,
        /// 1-based column of the error
        column: usize,
    },

    /// Parsed output violates the reading schema.
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    /// The model stopped because it hit the output token limit.
    #[error("Output for {purpose} truncated at {max_tokens} tokens")]
    Truncated {
        /// Purpose tag of the call
        purpose: String,
        /// Limit the call was issued with
        max_tokens: u32,
    },

    /// Retry limit reached without a valid result.
    #[error("Retry budget exhausted for {purpose} after {attempts} attempts: {last_error}")]
    BudgetExhausted {
        /// Purpose tag without the retry suffix
        purpose: String,
        /// Attempts made, including the first
        attempts: usize,
        /// Failure of the final attempt
        last_error: Box<ReadingError>,
    },

    /// Every configured provider failed for one call.
    #[error("All providers failed ({}): {}", .attempts.len(), summarize(.attempts))]
    AllProvidersFailed {
        /// One failed attempt per provider, in priority order
        attempts: Vec<GenerationAttempt>,
    },

    /// The caller's request is malformed.
    #[error("Invalid reading request: {0}")]
    InvalidRequest(String),

    /// Configuration cannot be turned into a working pipeline.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error raised by the core crate, e.g. while loading configuration.
    #[error("Core error: {0}")]
    Core(String),

    /// A spawned sub-task panicked or was cancelled.
    #[error("Sub-task failed: {0}")]
    TaskFailed(String),
}

impl ReadingError {
    /// Whether a retry with a larger output budget may fix this failure.
    #[must_use]
    pub fn is_repairable(&self) -> bool {
        matches!(
            self,
            Self::Extraction { .. } | Self::Parse { .. } | Self::Validation(_) | Self::Truncated { .. }
        )
    }

    /// Whether the failure comes from providers rather than model output.
    #[must_use]
    pub fn is_provider_exhaustion(&self) -> bool {
        match self {
            Self::AllProvidersFailed { .. } => true,
            Self::BudgetExhausted { last_error, .. } => last_error.is_provider_exhaustion(),
            _ => false,
        }
    }

    /// Builds a parse error from a `serde_json` failure.
    #[must_use]
    pub fn from_json(error: &JsonError) -> Self {
        Self::Parse {
            message: error.to_string(),
            line: error.line(),
            column: error.column(),
        }
    }
}

impl From<CoreError> for ReadingError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Config(message) => Self::Config(message),
            other => Self::Core(other.to_string()),
        }
    }
}

/// One line per failed attempt: `provider/model: error`.
fn summarize(attempts: &[GenerationAttempt]) -> String {
    attempts
        .iter()
        .map(|attempt| {
            format!(
                "{}/{}: {}",
                attempt.provider,
                attempt.model,
                attempt.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}
