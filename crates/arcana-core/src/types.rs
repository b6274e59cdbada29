use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

use crate::Error;

/// Token accounting for one provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt
    pub prompt: u64,
    /// Tokens produced by the model
    pub completion: u64,
}

impl TokenUsage {
    /// Creates a usage record.
    #[must_use]
    pub const fn new(prompt: u64, completion: u64) -> Self {
        Self { prompt, completion }
    }

    /// Prompt plus completion tokens.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.prompt + self.completion
    }
}

/// Why the model stopped producing output, normalized across backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of output
    Stop,
    /// The max output token limit was hit
    Length,
    /// Output was withheld by the backend's safety filter
    ContentFilter,
    /// Anything the backend reports that has no mapping
    Other,
}

impl FinishReason {
    /// Maps a raw backend finish/stop reason string.
    #[must_use]
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "stop" | "end_turn" | "stop_sequence" | "eos" => Self::Stop,
            "length" | "max_tokens" => Self::Length,
            "content_filter" | "safety" | "refusal" => Self::ContentFilter,
            _ => Self::Other,
        }
    }

    /// Whether the output was cut off by the token limit.
    #[must_use]
    pub const fn is_truncated(self) -> bool {
        matches!(self, Self::Length)
    }
}

impl Display for FinishReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Stop => write!(f, "stop"),
            Self::Length => write!(f, "length"),
            Self::ContentFilter => write!(f, "content_filter"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Successful output of a provider adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Generated text
    pub text: String,
    /// Model that produced the text
    pub model: String,
    /// Token accounting reported (or estimated) for the call
    pub usage: TokenUsage,
    /// Normalized stop reason
    pub finish_reason: FinishReason,
    /// Wall-clock latency of the call
    pub latency_ms: u64,
}

/// Coarse speed/quality bucket used to narrow model choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    /// Cheap, low-latency models
    Fast,
    /// General purpose models
    Balanced,
    /// Highest quality models
    High,
}

impl PerformanceTier {
    /// All tiers from fastest to highest quality.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Fast, Self::Balanced, Self::High]
    }
}

impl Display for PerformanceTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Balanced => write!(f, "balanced"),
            Self::High => write!(f, "high"),
        }
    }
}

impl FromStr for PerformanceTier {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "high" => Ok(Self::High),
            other => Err(Error::Config(format!("Unknown performance tier: {other}"))),
        }
    }
}

/// Per-call model parameters produced by an allocator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Catalog id of the model
    pub model: String,
    /// Output token limit for the call
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Timeout applied to the provider call
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl ModelConfig {
    /// Creates a model configuration.
    pub fn new(model: impl Into<String>, max_tokens: u32, temperature: f32, timeout: Duration) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            temperature,
            timeout,
        }
    }

    /// Returns a copy targeting a different model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Serializes a `Duration` as fractional seconds.
mod duration_secs {
    use serde::{Deserialize as _, Deserializer, Serializer};
    use std::time::Duration;

    /// Writes the duration as seconds.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    /// Reads seconds into a duration.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(FinishReason::from_provider("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::from_provider("end_turn"), FinishReason::Stop);
        assert_eq!(FinishReason::from_provider("length"), FinishReason::Length);
        assert_eq!(FinishReason::from_provider("max_tokens"), FinishReason::Length);
        assert_eq!(
            FinishReason::from_provider("content_filter"),
            FinishReason::ContentFilter
        );
        assert_eq!(FinishReason::from_provider("tool_calls"), FinishReason::Other);
        assert!(FinishReason::Length.is_truncated());
        assert!(!FinishReason::Stop.is_truncated());
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::new(120, 80);
        assert_eq!(usage.total(), 200);
        assert_eq!(TokenUsage::default().total(), 0);
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!("fast".parse::<PerformanceTier>().ok(), Some(PerformanceTier::Fast));
        assert_eq!("HIGH".parse::<PerformanceTier>().ok(), Some(PerformanceTier::High));
        assert!("turbo".parse::<PerformanceTier>().is_err());
    }

    #[test]
    fn test_model_config_serialization() {
        let config = ModelConfig::new("gpt-4o-mini", 2000, 0.7, Duration::from_secs(45));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"timeout\":45.0"));
        let back: ModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
