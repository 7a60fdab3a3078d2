use clap::{Parser, Subcommand, ValueEnum};
use dailypaper_recommend::OptimizerMetric;
use dailypaper_state::InteractionAction;
use std::path::PathBuf;

/// Output format shared by every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Command-line interface for the `dailypaper` application.
#[derive(Debug, Parser)]
#[command(
    name = "dailypaper",
    version,
    about = "Multi-strategy research paper recommendations"
)]
pub struct Cli {
    /// SQLite database path (overrides `DAILYPAPER_DB` and the config file).
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

/// Available `dailypaper` commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Recommends unread papers by fusing the enabled strategies.
    Recommend {
        /// Number of papers to return.
        #[arg(long, short = 'k')]
        top_k: Option<usize>,
        /// Strategies to run (comma-separated; overrides `DAILYPAPER_STRATEGIES`).
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<String>,
        /// Fusion weight as `name=value` (repeatable).
        #[arg(long = "weight", value_name = "NAME=VALUE", value_parser = parse_weight)]
        weights: Vec<(String, f64)>,
        /// Do not update recommendation counts.
        #[arg(long, default_value_t = false)]
        no_record: bool,
    },
    /// Evaluates ranking quality against interactions after a split date.
    Evaluate {
        /// `YYYY-MM-DD`; defaults to the configured optimizer split date.
        #[arg(long)]
        split_date: Option<String>,
        /// Ranking depth used for evaluation.
        #[arg(long)]
        top_k: Option<usize>,
        /// Strategies to run (comma-separated).
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<String>,
        /// Fusion weight as `name=value` (repeatable).
        #[arg(long = "weight", value_name = "NAME=VALUE", value_parser = parse_weight)]
        weights: Vec<(String, f64)>,
    },
    /// Searches fusion weights by coordinate descent.
    Optimize {
        /// `YYYY-MM-DD`; defaults to the configured optimizer split date.
        #[arg(long)]
        split_date: Option<String>,
        /// Maximum coordinate-descent passes.
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Objective: mrr, hit_rate or mean_rank.
        #[arg(long)]
        metric: Option<OptimizerMetric>,
        /// Strategies to run (comma-separated).
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<String>,
    },
    /// Lists registered strategies and which ones are enabled.
    Strategies,
    /// Imports papers from a JSON array file.
    Import {
        /// File containing `[{"source", "source_id", "title", ...}]`.
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Records what you did with a paper.
    Mark {
        paper_id: i64,
        /// interested, not_interested or no_action.
        action: InteractionAction,
        /// Free-form notes; non-blank notes count as a positive signal.
        #[arg(long)]
        notes: Option<String>,
    },
    /// Shows or updates the user profile.
    Profile {
        /// Comma-separated interests.
        #[arg(long)]
        interested: Option<String>,
        /// Comma-separated keywords that exclude papers.
        #[arg(long)]
        disinterested: Option<String>,
        /// Free-text description of research interests.
        #[arg(long)]
        description: Option<String>,
    },
    /// Shows active interest themes, optionally regenerating them.
    Themes {
        /// Regenerate when themes are missing, stale or outpaced by new likes.
        #[arg(long, default_value_t = false)]
        refresh: bool,
        /// Regenerate even when the current themes are fresh.
        #[arg(long, default_value_t = false, requires = "refresh")]
        force: bool,
    },
}

/// Parse `name=value` into a strategy weight.
pub(crate) fn parse_weight(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing strategy name in '{raw}'"));
    }
    let weight: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid weight in '{raw}': {e}"))?;
    if !weight.is_finite() || weight < 0.0 {
        return Err(format!("weight must be a non-negative number, got '{raw}'"));
    }
    Ok((name.to_string(), weight))
}
