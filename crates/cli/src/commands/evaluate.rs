//! CLI handler for the `evaluate` command.

use super::{emit, weight_map};
use crate::app::Services;
use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use dailypaper_recommend::{EvaluationReport, RecommendationOptimizer};

/// Resolve the split date from the flag or the `[optimizer]` settings.
pub(crate) fn split_date(services: &Services, flag: Option<String>) -> Result<String> {
    flag.or_else(|| services.optimizer.split_date.clone())
        .context("no split date: pass --split-date or set [optimizer] split_date")
}

/// Handle the `evaluate` command.
pub(crate) async fn handle_evaluate_command(
    services: &Services,
    split: Option<String>,
    top_k: Option<usize>,
    strategies: Vec<String>,
    weights: Vec<(String, f64)>,
    format: OutputFormat,
) -> Result<()> {
    let split = split_date(services, split)?;
    let top_k = top_k.unwrap_or(services.optimizer.top_k);
    let weights = weight_map(weights);

    let mut optimizer = RecommendationOptimizer::new(services.manager(strategies)?);
    let report: EvaluationReport = optimizer
        .evaluate(&split, weights.as_ref(), top_k)
        .await
        .into();

    emit(format, &report, print_report)?;
    match report {
        EvaluationReport::Metrics(_) => Ok(()),
        EvaluationReport::Error(err) => Err(err.into()),
    }
}

pub(crate) fn print_report(report: &EvaluationReport) {
    match report {
        EvaluationReport::Metrics(m) => {
            println!("Evaluation (split {})", m.split_date);
            println!("  test papers:  {}", m.test_count);
            println!("  found:        {} (top {})", m.found_count, m.top_k);
            println!("  hit rate:     {:.4}", m.hit_rate);
            match m.mean_rank {
                Some(rank) => println!("  mean rank:    {rank:.2}"),
                None => println!("  mean rank:    n/a"),
            }
            println!("  MRR:          {:.4}", m.mrr);
            for (name, weight) in &m.strategy_weights {
                println!("  weight {name}: {weight}");
            }
        }
        EvaluationReport::Error(err) => println!("Evaluation failed: {err}"),
    }
}
