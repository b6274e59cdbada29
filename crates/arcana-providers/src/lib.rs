//! Provider adapters for external LLM services.
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

/// Anthropic messages API adapter.
pub mod anthropic;
/// HTTP status and transport error normalization.
pub mod http;
/// Scripted provider for tests and offline runs.
pub mod mock;
/// OpenAI-compatible chat completions adapter.
pub mod openai_compat;
/// Name to constructor registry.
pub mod registry;

pub use anthropic::AnthropicProvider;
pub use mock::{MockCall, MockFailure, MockProvider, MockReply};
pub use openai_compat::OpenAiCompatProvider;
pub use registry::{ProviderConstructor, ProviderRegistry};
