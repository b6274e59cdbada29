use core::result::Result as CoreResult;
use std::io::Error as IoError;
use std::time::Duration;

use reqwest::Error as ReqwestError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, Error>;

/// Result type returned by provider adapters.
pub type ProviderResult<T> = CoreResult<T, ProviderError>;

/// Errors that can occur in the core library.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// An HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Request(#[from] ReqwestError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required API key was not found.
    #[error("API key not found: {0}")]
    MissingApiKey(String),
}

/// Normalized failure of a single provider call.
///
/// Every adapter maps its backend-specific failures onto these five kinds so
/// the orchestrator can decide on fallback without knowing the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderError {
    /// The backend throttled the request.
    #[error("Rate limited by {provider}: {message}")]
    RateLimited {
        /// Provider that rejected the call
        provider: String,
        /// Backend message
        message: String,
        /// Hint from the backend on when to try again
        retry_after: Option<Duration>,
    },

    /// Credentials were missing or rejected.
    #[error("Authentication failed for {provider}: {message}")]
    Unauthenticated {
        /// Provider that rejected the call
        provider: String,
        /// Backend message
        message: String,
    },

    /// The backend refused the request payload.
    #[error("Invalid request to {provider}: {message}")]
    InvalidRequest {
        /// Provider that rejected the call
        provider: String,
        /// Backend message
        message: String,
    },

    /// The call did not finish within its timeout.
    #[error("Request to {provider} timed out after {elapsed_ms}ms")]
    TimedOut {
        /// Provider that timed out
        provider: String,
        /// Time spent before giving up
        elapsed_ms: u64,
    },

    /// The backend could not be reached or returned a server error.
    #[error("Provider {provider} unavailable: {message}")]
    Unavailable {
        /// Provider that failed
        provider: String,
        /// Backend message
        message: String,
    },
}

impl ProviderError {
    /// Name of the provider that produced this error.
    pub fn provider(&self) -> &str {
        match self {
            Self::RateLimited { provider, .. }
            | Self::Unauthenticated { provider, .. }
            | Self::InvalidRequest { provider, .. }
            | Self::TimedOut { provider, .. }
            | Self::Unavailable { provider, .. } => provider,
        }
    }

    /// Whether the same provider may succeed if called again later.
    ///
    /// Authentication and request errors are configuration problems; the
    /// orchestrator still falls through to the next provider on them.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::TimedOut { .. } | Self::Unavailable { .. }
        )
    }

    /// Backend-supplied retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
