//! CLI handler for the `optimize` command.

use super::emit;
use super::evaluate::{print_report, split_date};
use crate::app::Services;
use crate::cli::OutputFormat;
use anyhow::Result;
use dailypaper_recommend::{OptimizerMetric, RecommendationOptimizer};

/// Handle the `optimize` command.
pub(crate) async fn handle_optimize_command(
    services: &Services,
    split: Option<String>,
    max_iterations: Option<usize>,
    metric: Option<OptimizerMetric>,
    strategies: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let settings = &services.optimizer;
    let split = split_date(services, split)?;
    let ranges = (!settings.weight_ranges.is_empty()).then(|| settings.weight_ranges.clone());
    let max_iterations = max_iterations.unwrap_or(settings.max_iterations);
    let metric = metric.unwrap_or(settings.metric);

    let mut optimizer = RecommendationOptimizer::new(services.manager(strategies)?);
    let result = optimizer
        .grid_search(&split, ranges, max_iterations, metric, settings.top_k)
        .await;

    emit(format, &result, |result| {
        println!(
            "Grid search ({} passes, {} trials, metric {})",
            result.iterations,
            result.history.len(),
            result.metric
        );
        println!("Best score: {:.4}", result.best_score);
        println!("Best weights:");
        for (name, weight) in &result.best_weights {
            println!("  {name} = {weight}");
        }
        println!();
        print_report(&result.best_metrics);
        println!("\nAdd to ~/.dailypaper/config.toml:\n\n[recommendation.strategy_weights]");
        for (name, weight) in &result.best_weights {
            println!("{name} = {weight:?}");
        }
    })
}
