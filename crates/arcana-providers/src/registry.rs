//! Provider registry mapping backend names to adapter constructors.
//!
//! The registry is populated explicitly at startup; nothing registers itself
//! as a side effect of being linked in.

use std::collections::BTreeMap;
use std::sync::Arc;

use arcana_core::{ArcanaConfig, Error, ModelCatalog, ProviderAdapter, ProviderSettings, Result};
use tracing::{info, warn};

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Builds an adapter from its settings and the shared catalog.
pub type ProviderConstructor =
    fn(&ProviderSettings, &Arc<ModelCatalog>) -> Result<Arc<dyn ProviderAdapter>>;

/// Name to constructor map.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    /// Constructors keyed by provider name
    constructors: BTreeMap<String, ProviderConstructor>,
}

/// Constructor for OpenAI-compatible backends.
fn build_openai_compat(
    settings: &ProviderSettings,
    catalog: &Arc<ModelCatalog>,
) -> Result<Arc<dyn ProviderAdapter>> {
    Ok(Arc::new(OpenAiCompatProvider::from_settings(settings, catalog)?))
}

/// Constructor for the Anthropic backend.
fn build_anthropic(
    settings: &ProviderSettings,
    catalog: &Arc<ModelCatalog>,
) -> Result<Arc<dyn ProviderAdapter>> {
    Ok(Arc::new(AnthropicProvider::from_settings(settings, catalog)?))
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every bundled backend registered.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("openai", build_openai_compat);
        registry.register("groq", build_openai_compat);
        registry.register("openrouter", build_openai_compat);
        registry.register("anthropic", build_anthropic);
        registry
    }

    /// Registers or replaces a constructor.
    pub fn register(&mut self, name: impl Into<String>, constructor: ProviderConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    /// Whether a constructor exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Builds one adapter.
    ///
    /// # Errors
    /// Returns a configuration error for an unregistered name, or the
    /// constructor's error.
    pub fn build(
        &self,
        settings: &ProviderSettings,
        catalog: &Arc<ModelCatalog>,
    ) -> Result<Arc<dyn ProviderAdapter>> {
        let constructor = self.constructors.get(&settings.name).ok_or_else(|| {
            Error::Config(format!(
                "unknown provider '{}' (registered: {})",
                settings.name,
                self.names().join(", ")
            ))
        })?;
        constructor(settings, catalog)
    }

    /// Builds every enabled provider in the configuration.
    ///
    /// Providers without credentials are skipped with a warning so a missing
    /// key for one backend does not block the others.
    ///
    /// # Errors
    /// Returns an error for unregistered names, for other constructor
    /// failures, or when no provider could be built.
    pub fn build_enabled(
        &self,
        config: &ArcanaConfig,
        catalog: &Arc<ModelCatalog>,
    ) -> Result<Vec<Arc<dyn ProviderAdapter>>> {
        let mut adapters = Vec::new();
        for settings in config.enabled_providers() {
            match self.build(settings, catalog) {
                Ok(adapter) => {
                    info!("Provider '{}' ready", settings.name);
                    adapters.push(adapter);
                }
                Err(Error::MissingApiKey(variable)) => {
                    warn!(
                        "Skipping provider '{}': no API key ({variable} not set)",
                        settings.name
                    );
                }
                Err(error) => return Err(error),
            }
        }

        if adapters.is_empty() {
            return Err(Error::Config(
                "no provider could be constructed; configure an API key".to_owned(),
            ));
        }
        Ok(adapters)
    }
}
