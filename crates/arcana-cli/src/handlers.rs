//! Command handlers for CLI operations

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use arcana_core::{ArcanaConfig, Enrichment, PerformanceTier, ProviderAdapter, StructuredReading};
use arcana_providers::ProviderRegistry;
use arcana_routing::{AnalysisHints, LedgerReport, ReadingPipeline, ReadingRequest};
use serde::Serialize;
use serde_json::json;

use crate::cli::ReadingArgs;
use crate::offline::offline_provider;

/// Placeholder shown instead of configured API keys.
const REDACTED: &str = "<redacted>";

/// Loads the configuration from `path`, or from `~/.arcana/config.toml`
/// (created with defaults when missing).
///
/// # Errors
/// Returns an error if the file cannot be read, parsed, or created
pub fn load_config(path: Option<&Path>) -> Result<ArcanaConfig> {
    let config = match path {
        Some(path) => ArcanaConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ArcanaConfig::load_or_create().context("Failed to load ~/.arcana/config.toml")?,
    };
    Ok(config)
}

/// Successful reading output.
#[derive(Debug, Serialize)]
struct ReadingOutput<'out> {
    reading: &'out StructuredReading,
    providers: &'out [String],
    usage: LedgerReport,
}

/// Generates a reading and prints it with its usage report as JSON.
///
/// # Errors
/// Returns an error if the request is invalid, no provider can be built, or
/// the reading fails. A failed reading still prints its usage report.
pub async fn handle_reading(config: &ArcanaConfig, args: ReadingArgs) -> Result<()> {
    let enrichment = match &args.enrichment {
        Some(path) => load_enrichment(path)?,
        None => Enrichment::default(),
    };

    let pipeline = if args.mock {
        let primary = config
            .routing
            .primary
            .as_deref()
            .or_else(|| config.enabled_providers().next().map(|provider| provider.name.as_str()));
        let provider: Arc<dyn ProviderAdapter> = Arc::new(offline_provider(primary, args.spread, &args.cards));
        ReadingPipeline::with_providers(config, vec![provider])?
    } else {
        ReadingPipeline::from_config(config, &ProviderRegistry::with_builtin())?
    };
    tracing::info!(
        "Generating {} reading with providers {:?}",
        args.spread,
        pipeline.provider_names()
    );

    let request = ReadingRequest {
        spread: args.spread,
        cards: args.cards,
        enrichment,
        question: args.question,
        category: args.category,
        hints: AnalysisHints {
            prefer_fast: args.prefer_fast,
            budget_ceiling: args.budget_ceiling,
            require_high_quality: args.high_quality,
        },
    };

    match pipeline.generate(request).await {
        Ok((reading, ledger)) => print_json(&ReadingOutput {
            reading: &reading,
            providers: pipeline.provider_names(),
            usage: ledger.report(),
        }),
        Err(failure) => {
            print_json(&json!({
                "error": failure.error.to_string(),
                "stage": failure.stage,
                "usage": failure.ledger.report(),
            }))?;
            bail!(failure)
        }
    }
}

fn load_enrichment(path: &Path) -> Result<Enrichment> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read enrichment file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Invalid enrichment JSON in {}", path.display()))
}

/// Prints the effective configuration as TOML with API keys redacted.
///
/// # Errors
/// Returns an error if the configuration cannot be serialized or its path
/// cannot be determined
pub fn handle_config(config: &ArcanaConfig, explicit_path: Option<&Path>, path_only: bool) -> Result<()> {
    if path_only {
        let path = match explicit_path {
            Some(path) => path.to_path_buf(),
            None => ArcanaConfig::config_path()?,
        };
        print_line(&path.display().to_string());
        return Ok(());
    }

    let mut shown = config.clone();
    for provider in &mut shown.providers {
        if provider.api_key.is_some() {
            provider.api_key = Some(REDACTED.to_owned());
        }
    }
    print_line(toml::to_string_pretty(&shown)?.trim_end());
    Ok(())
}

/// Lists catalog models, optionally restricted to one tier.
///
/// # Errors
/// Returns an error if the listing cannot be serialized
pub fn handle_catalog(config: &ArcanaConfig, tier: Option<PerformanceTier>, include_unavailable: bool) -> Result<()> {
    let catalog = config.build_catalog();
    let models = catalog.find(tier, !include_unavailable);
    tracing::debug!("Listing {} catalog models", models.len());
    print_json(&models)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    print_line(&serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_line(text: &str) {
    // Command output goes to stdout; logs go to stderr
    #[allow(clippy::print_stdout, reason = "Command output")]
    {
        println!("{text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_from_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("arcana.toml");
        fs::write(
            &path,
            "[retry]\nmax_retries = 4\ngrowth_factor = 1.5\n\n[execution]\nmax_concurrent_calls = 2\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.retry.max_retries, 4);
        assert_eq!(config.execution.max_concurrent_calls, 2);
    }

    #[test]
    fn test_load_config_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let error = load_config(Some(&temp.path().join("absent.toml"))).unwrap_err();
        assert!(error.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_load_enrichment_reads_snippets() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("enrichment.json");
        fs::write(
            &path,
            r#"{"card_snippets": [{"card_name": "The Star", "content": "hope and renewal"}], "category_guidance": "Focus on career"}"#,
        )
        .unwrap();

        let enrichment = load_enrichment(&path).unwrap();
        assert_eq!(enrichment.card_snippets.len(), 1);
        assert_eq!(enrichment.category_guidance.as_deref(), Some("Focus on career"));
    }

    #[test]
    fn test_load_enrichment_rejects_bad_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("enrichment.json");
        fs::write(&path, "not json").unwrap();
        assert!(load_enrichment(&path).is_err());
    }
}
