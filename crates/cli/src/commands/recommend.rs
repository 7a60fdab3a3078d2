//! CLI handler for the `recommend` command.

use super::{emit, weight_map};
use crate::app::Services;
use crate::cli::OutputFormat;
use anyhow::Result;
use dailypaper_recommend::{RecommendRequest, RecommendationResult};
use dailypaper_state::PaperQueries;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Serialize)]
struct RecommendedPaper {
    rank: usize,
    paper_id: i64,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    score: f64,
    reason: String,
}

/// Handle the `recommend` command.
pub(crate) async fn handle_recommend_command(
    services: &Services,
    top_k: Option<usize>,
    strategies: Vec<String>,
    weights: Vec<(String, f64)>,
    no_record: bool,
    format: OutputFormat,
) -> Result<()> {
    let mut manager = services.manager(strategies)?;
    let top_k = top_k.unwrap_or(services.recommendation.top_k);
    let mut request = RecommendRequest::new(top_k).record(!no_record);
    if let Some(weights) = weight_map(weights) {
        request = request.with_weights(weights);
    }

    match manager.recommend(request).await {
        Ok(results) => print_results(services, &results, format),
        Err(err) => {
            if let Some(results) = err.results() {
                print_results(services, results, format)?;
            }
            Err(err.into())
        }
    }
}

fn print_results(
    services: &Services,
    results: &[RecommendationResult],
    format: OutputFormat,
) -> Result<()> {
    let ids: Vec<i64> = results.iter().map(|r| r.paper_id).collect();
    let papers: HashMap<i64, _> = services
        .store
        .papers_by_ids(&ids)?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let rows: Vec<RecommendedPaper> = results
        .iter()
        .enumerate()
        .map(|(idx, r)| {
            let paper = papers.get(&r.paper_id);
            RecommendedPaper {
                rank: idx + 1,
                paper_id: r.paper_id,
                title: paper.map(|p| p.title.clone()).unwrap_or_default(),
                url: paper.and_then(|p| p.url.clone()),
                score: r.score,
                reason: r.reason.clone(),
            }
        })
        .collect();

    emit(format, &rows, |rows| {
        if rows.is_empty() {
            println!("No recommendations.");
            println!("Import papers or set a profile with 'dailypaper profile --interested ...'.");
            return;
        }
        println!("Recommendations ({})", rows.len());
        println!("===================\n");
        for row in rows {
            println!("{:>3}. {} (id {})", row.rank, row.title, row.paper_id);
            if let Some(ref url) = row.url {
                println!("     {url}");
            }
            println!("     score {:.4} | {}", row.score, row.reason);
        }
    })
}
