//! CLI command handlers for the dailypaper application.

mod evaluate;
mod library;
mod optimize;
mod profile;
mod recommend;
mod strategies;
mod themes;

pub(crate) use evaluate::handle_evaluate_command;
pub(crate) use library::{handle_import_command, handle_mark_command};
pub(crate) use optimize::handle_optimize_command;
pub(crate) use profile::handle_profile_command;
pub(crate) use recommend::handle_recommend_command;
pub(crate) use strategies::handle_strategies_command;
pub(crate) use themes::handle_themes_command;

use crate::cli::OutputFormat;
use anyhow::Result;
use serde::Serialize;

/// Print `value` as pretty JSON, or run `text` for the human format.
pub(crate) fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(value),
    }
    Ok(())
}

/// Collect `--weight` pairs; `None` when no weights were given.
pub(crate) fn weight_map(
    weights: Vec<(String, f64)>,
) -> Option<std::collections::BTreeMap<String, f64>> {
    (!weights.is_empty()).then(|| weights.into_iter().collect())
}
