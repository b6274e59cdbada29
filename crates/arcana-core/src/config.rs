//! Configuration for providers, routing, allocation, retry, execution and cache.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{ModelCatalog, ModelMetadata};
use crate::{Error, Result};

/// Complete pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcanaConfig {
    /// Provider backends, in declaration order
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderSettings>,
    /// Provider priority
    #[serde(default)]
    pub routing: RoutingSettings,
    /// Model allocation
    #[serde(default)]
    pub allocation: AllocationConfig,
    /// Catalog overrides
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Parse-repair retry policy
    #[serde(default)]
    pub retry: RetryConfig,
    /// Concurrency limits
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Response cache
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for ArcanaConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            routing: RoutingSettings::default(),
            allocation: AllocationConfig::default(),
            catalog: CatalogConfig::default(),
            retry: RetryConfig::default(),
            execution: ExecutionConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Providers configured when the file declares none.
fn default_providers() -> Vec<ProviderSettings> {
    vec![
        ProviderSettings::new("openai"),
        ProviderSettings::new("anthropic"),
        ProviderSettings::new("groq"),
    ]
}

/// Settings for one provider backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Registry name of the provider (`openai`, `anthropic`, ...)
    pub name: String,
    /// API key; falls back to `<NAME>_API_KEY` in the environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model used when the allocated model belongs to another provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    /// Endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// HTTP client timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
    /// Whether the provider takes part in routing
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Serde default for [`ProviderSettings::timeout_seconds`].
const fn default_provider_timeout() -> u64 {
    120
}

/// Serde default for boolean switches that are on unless disabled.
const fn default_true() -> bool {
    true
}

impl ProviderSettings {
    /// Creates enabled settings for `name` with no explicit key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key: None,
            default_model: None,
            base_url: None,
            timeout_seconds: default_provider_timeout(),
            enabled: true,
        }
    }

    /// Environment variable consulted for the API key.
    #[must_use]
    pub fn api_key_env(&self) -> String {
        format!("{}_API_KEY", self.name.to_ascii_uppercase().replace('-', "_"))
    }

    /// API key from the config file, then from the environment.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| env::var(self.api_key_env()).ok().filter(|key| !key.is_empty()))
    }
}

/// Provider priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingSettings {
    /// Provider tried first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    /// Providers tried next, in order
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            primary: Some("openai".to_owned()),
            fallbacks: vec!["anthropic".to_owned()],
        }
    }
}

/// Per-task override of the base allocation table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOverride {
    /// Model id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Output token limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Call timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// Model allocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Whether the smart allocator may override the base table
    #[serde(default)]
    pub dynamic_enabled: bool,
    /// Hard per-call output token ceiling
    #[serde(default = "default_hard_max_tokens")]
    pub hard_max_tokens: u32,
    /// Base table overrides keyed by task type tag
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskOverride>,
}

/// Serde default for [`AllocationConfig::hard_max_tokens`].
const fn default_hard_max_tokens() -> u32 {
    16_000
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            dynamic_enabled: false,
            hard_max_tokens: default_hard_max_tokens(),
            tasks: BTreeMap::new(),
        }
    }
}

/// Extra or replacement catalog entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Entries merged over the built-in catalog
    #[serde(default)]
    pub models: Vec<ModelMetadata>,
}

/// Parse-repair retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u8,
    /// Multiplier applied to max output tokens on each retry
    pub growth_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            growth_factor: 1.3,
        }
    }
}

/// Concurrency limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Simultaneous provider calls in a parallel spread
    pub max_concurrent_calls: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 5,
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Time-to-live for cache entries in seconds
    pub ttl_seconds: u64,
    /// Maximum cache size in megabytes
    pub max_size_mb: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_seconds: 3600,
            max_size_mb: 64,
        }
    }
}

impl ArcanaConfig {
    /// Get the default config directory path (`~/.arcana`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".arcana"))
    }

    /// Get the default config file path (`~/.arcana/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location, writing defaults if it is missing.
    ///
    /// # Errors
    /// Returns an error if the config cannot be read, parsed, or created
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        tracing::debug!(
            "Loaded config from {}: providers={:?}, primary={:?}",
            path.display(),
            config
                .providers
                .iter()
                .map(|provider| provider.name.as_str())
                .collect::<Vec<_>>(),
            config.routing.primary
        );

        Ok(config)
    }

    /// Save config to a file, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;

        let header = "# Arcana Configuration File\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))?;
        Ok(())
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    /// Returns a configuration error naming the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if self.execution.max_concurrent_calls == 0 {
            return Err(Error::Config(
                "execution.max_concurrent_calls must be at least 1".to_owned(),
            ));
        }
        if self.retry.growth_factor <= 1.0 {
            return Err(Error::Config(
                "retry.growth_factor must be greater than 1.0".to_owned(),
            ));
        }
        if self.allocation.hard_max_tokens == 0 {
            return Err(Error::Config(
                "allocation.hard_max_tokens must be positive".to_owned(),
            ));
        }
        let referenced = self
            .routing
            .primary
            .iter()
            .chain(self.routing.fallbacks.iter());
        for name in referenced {
            if self.provider(name).is_none() {
                return Err(Error::Config(format!(
                    "routing references unknown provider '{name}'"
                )));
            }
        }
        Ok(())
    }

    /// Settings for a provider by name.
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&ProviderSettings> {
        self.providers.iter().find(|provider| provider.name == name)
    }

    /// Providers with `enabled = true`.
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderSettings> {
        self.providers.iter().filter(|provider| provider.enabled)
    }

    /// Built-in catalog with the configured entries merged over it.
    #[must_use]
    pub fn build_catalog(&self) -> ModelCatalog {
        let mut catalog = ModelCatalog::with_defaults();
        for model in &self.catalog.models {
            catalog.insert(model.clone());
        }
        catalog
    }
}
