//! Response caching in front of the orchestrator.
//!
//! Identical requests (same prompt, system prompt and effective model
//! configuration) are served from memory until their TTL expires.

/// Caching decorator implementing [`Generator`](crate::orchestrator::Generator).
pub mod caching;
/// Cache storage implementation
pub mod storage;

pub use caching::CachingGenerator;
pub use storage::{CacheStats, CachedGeneration, ResponseCache};
