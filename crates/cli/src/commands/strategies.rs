//! CLI handler for the `strategies` command.

use super::emit;
use crate::app::Services;
use crate::cli::OutputFormat;
use anyhow::Result;
use dailypaper_recommend::StrategyKind;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct StrategyRow {
    name: String,
    kind: StrategyKind,
    enabled: bool,
    weight: f64,
}

/// Handle the `strategies` command.
pub(crate) fn handle_strategies_command(services: &Services, format: OutputFormat) -> Result<()> {
    let manager = services.manager(Vec::new())?;
    let enabled = manager.enabled_strategies();
    let mut rows = Vec::new();
    for name in manager.registry().list_strategies() {
        let strategy = manager.registry().create(&name, manager.context())?;
        rows.push(StrategyRow {
            enabled: enabled.contains(&name),
            kind: strategy.kind(),
            weight: manager.fusion().strategy_weight(&name),
            name,
        });
    }

    emit(format, &rows, |rows| {
        println!("{:<24} {:<8} {:<8} weight", "strategy", "kind", "enabled");
        for row in rows {
            println!(
                "{:<24} {:<8} {:<8} {}",
                row.name,
                row.kind.to_string(),
                if row.enabled { "yes" } else { "no" },
                row.weight
            );
        }
    })
}
