//! Cache storage implementation using in-memory HashMap.
//!
//! Entries expire after the configured TTL; when the size limit is reached
//! the oldest entries are evicted first.

use arcana_core::{CacheConfig, ProviderResponse};
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// What a cache hit replays.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedGeneration {
    /// Provider that originally produced the response
    pub provider: String,
    /// The cached response
    pub response: ProviderResponse,
}

/// A cached generation with bookkeeping.
#[derive(Debug, Clone)]
struct CacheEntry {
    generation: CachedGeneration,
    created_at: Instant,
    expires_at: Instant,
    size_bytes: usize,
}

impl CacheEntry {
    fn new(generation: CachedGeneration, ttl: Duration) -> Self {
        let created_at = Instant::now();
        let size_bytes = generation.response.text.len() + generation.response.model.len();
        Self {
            generation,
            created_at,
            expires_at: created_at + ttl,
            size_bytes,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of live entries
    pub entries: usize,
    /// Total size of all entries in bytes
    pub total_size_bytes: usize,
    /// Lookups served from cache
    pub hits: u64,
    /// Lookups that fell through
    pub misses: u64,
}

/// In-memory response cache with TTL-based expiration
pub struct ResponseCache {
    storage: HashMap<String, CacheEntry>,
    config: CacheConfig,
    total_size_bytes: usize,
    hits: u64,
    misses: u64,
}

impl ResponseCache {
    /// Creates a new response cache with the given configuration
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            storage: HashMap::new(),
            config,
            total_size_bytes: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Gets a cached generation if it exists and hasn't expired
    pub fn get(&mut self, key: &str) -> Option<CachedGeneration> {
        if !self.config.enabled {
            return None;
        }

        let Some(entry) = self.storage.get(key) else {
            self.misses += 1;
            return None;
        };
        if entry.is_expired() {
            self.remove(key);
            self.misses += 1;
            return None;
        }

        let generation = entry.generation.clone();
        self.hits += 1;
        Some(generation)
    }

    /// Stores a generation in the cache
    pub fn put(&mut self, key: String, generation: CachedGeneration) {
        if !self.config.enabled {
            return;
        }

        let entry = CacheEntry::new(generation, Duration::from_secs(self.config.ttl_seconds));
        self.remove(&key);

        if self.config.max_size_mb > 0 {
            let max_bytes = self.config.max_size_mb * 1024 * 1024;
            if entry.size_bytes > max_bytes {
                return;
            }
            while self.total_size_bytes + entry.size_bytes > max_bytes && !self.storage.is_empty() {
                self.evict_oldest();
            }
        }

        self.total_size_bytes += entry.size_bytes;
        self.storage.insert(key, entry);
    }

    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.storage.remove(key) {
            self.total_size_bytes = self.total_size_bytes.saturating_sub(entry.size_bytes);
        }
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .storage
            .iter()
            .min_by_key(|(_, entry)| entry.created_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.remove(&key);
        }
    }

    /// Returns the number of entries in the cache
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.storage.len(),
            total_size_bytes: self.total_size_bytes,
            hits: self.hits,
            misses: self.misses,
        }
    }
}
