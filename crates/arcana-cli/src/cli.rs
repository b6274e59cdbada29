use std::path::PathBuf;

use arcana_core::{DrawnCard, Orientation, PerformanceTier, SpreadType};
use clap::{Args, Parser, Subcommand};

/// Command-line arguments for the `arcana` binary
#[derive(Debug, Parser)]
#[command(name = "arcana")]
#[command(about = "Structured tarot readings from language models", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ~/.arcana/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a reading for drawn cards
    Reading(ReadingArgs),

    /// Show the effective configuration
    Config {
        /// Print the configuration file path only
        #[arg(long)]
        path: bool,
    },

    /// List catalog models
    Catalog {
        /// Only models in this tier (fast, balanced, high)
        #[arg(long, value_parser = parse_tier)]
        tier: Option<PerformanceTier>,

        /// Include models marked unavailable
        #[arg(long)]
        all: bool,
    },
}

/// Arguments of the `reading` subcommand
#[derive(Debug, Args)]
pub struct ReadingArgs {
    /// Spread type (one_card, three_card, celtic_cross)
    #[arg(short, long, value_parser = parse_spread)]
    pub spread: SpreadType,

    /// The querent's question
    #[arg(short, long)]
    pub question: String,

    /// Question category, e.g. love or career
    #[arg(long)]
    pub category: Option<String>,

    /// Drawn card as position=card[:reversed]; repeat per position
    #[arg(short, long = "card", value_parser = parse_card)]
    pub cards: Vec<DrawnCard>,

    /// JSON file with card snippets and guidance
    #[arg(long)]
    pub enrichment: Option<PathBuf>,

    /// Answer from canned offline replies instead of real providers
    #[arg(long)]
    pub mock: bool,

    /// Prefer fast models over quality
    #[arg(long)]
    pub prefer_fast: bool,

    /// Maximum estimated USD per provider call
    #[arg(long)]
    pub budget_ceiling: Option<f64>,

    /// Insist on the high quality tier
    #[arg(long)]
    pub high_quality: bool,
}

fn parse_spread(value: &str) -> Result<SpreadType, String> {
    value.parse().map_err(|error| format!("{error}"))
}

fn parse_tier(value: &str) -> Result<PerformanceTier, String> {
    value.parse().map_err(|error| format!("{error}"))
}

/// Parses `position=card[:reversed]`.
///
/// # Errors
/// Returns a message when the position or card name is missing, or the
/// orientation suffix is not `upright` or `reversed`.
pub fn parse_card(value: &str) -> Result<DrawnCard, String> {
    let Some((position, rest)) = value.split_once('=') else {
        return Err(format!("expected position=card[:reversed], got '{value}'"));
    };

    let (name, orientation) = match rest.rsplit_once(':') {
        Some((name, suffix)) => match suffix.trim().to_ascii_lowercase().as_str() {
            "reversed" | "r" => (name, Orientation::Reversed),
            "upright" | "u" => (name, Orientation::Upright),
            other => return Err(format!("unknown orientation '{other}' in '{value}'")),
        },
        None => (rest, Orientation::Upright),
    };

    let position = position.trim();
    let name = name.trim();
    if position.is_empty() {
        return Err(format!("missing position in '{value}'"));
    }
    if name.is_empty() {
        return Err(format!("missing card name in '{value}'"));
    }

    let card = DrawnCard::new(position, name);
    Ok(match orientation {
        Orientation::Reversed => card.reversed(),
        Orientation::Upright => card,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn test_parse_card_upright_by_default() {
        let card = parse_card("Past=The Tower").unwrap();
        assert_eq!(card.position, "Past");
        assert_eq!(card.card_name, "The Tower");
        assert_eq!(card.orientation, Orientation::Upright);
    }

    #[test]
    fn test_parse_card_reversed_suffix() {
        let card = parse_card("Near Future = Three of Cups : reversed").unwrap();
        assert_eq!(card.position, "Near Future");
        assert_eq!(card.card_name, "Three of Cups");
        assert_eq!(card.orientation, Orientation::Reversed);
    }

    #[test]
    fn test_parse_card_rejects_malformed() {
        assert!(parse_card("The Tower").is_err());
        assert!(parse_card("=The Tower").is_err());
        assert!(parse_card("Past=").is_err());
        assert!(parse_card("Past=The Tower:sideways").is_err());
    }

    #[test]
    fn test_reading_args_parse() {
        let cli = Cli::try_parse_from([
            "arcana",
            "reading",
            "--spread",
            "three-card",
            "--question",
            "Will the move go well?",
            "--card",
            "Past=The Fool",
            "--card",
            "Present=The Star:reversed",
            "--card",
            "Future=The Sun",
            "--mock",
        ])
        .unwrap();

        let Commands::Reading(args) = cli.command else {
            panic!("expected reading command");
        };
        assert_eq!(args.spread, SpreadType::ThreeCard);
        assert_eq!(args.cards.len(), 3);
        assert_eq!(args.cards[1].orientation, Orientation::Reversed);
        assert!(args.mock);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_catalog_tier_filter_parses() {
        let cli = Cli::try_parse_from(["arcana", "catalog", "--tier", "fast"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Catalog {
                tier: Some(PerformanceTier::Fast),
                all: false
            }
        ));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
