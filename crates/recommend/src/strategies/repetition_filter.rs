use super::RecommendationStrategy;
use crate::settings::REPETITION_FILTER;
use crate::types::{sort_by_score_desc, RecommendationResult, StrategyKind, StrategyParams};
use anyhow::Result;
use async_trait::async_trait;
use dailypaper_state::{Paper, PaperQueries};
use std::sync::Arc;
use tracing::info;

/// Downweights papers that were already surfaced several times.
pub struct RepetitionFilter {
    queries: Arc<dyn PaperQueries>,
    downweight_factor: f64,
    max_recommendations: u32,
}

/// Multiplier for a paper recommended `count` times.
///
/// 1.0 up to the first recommendation, then `1 / (1 + factor * (count - 1))`,
/// and 0.0 once `count` reaches `max`.
pub fn downweight(count: u32, factor: f64, max: u32) -> f64 {
    if count >= max {
        0.0
    } else if count <= 1 {
        1.0
    } else {
        1.0 / (1.0 + factor * f64::from(count - 1))
    }
}

impl RepetitionFilter {
    pub fn new(queries: Arc<dyn PaperQueries>, downweight_factor: f64, max_recommendations: u32) -> Self {
        Self {
            queries,
            downweight_factor,
            max_recommendations,
        }
    }

    fn limits(&self, params: &StrategyParams) -> (f64, u32) {
        (
            params.downweight_factor.unwrap_or(self.downweight_factor),
            params.max_recommendations.unwrap_or(self.max_recommendations),
        )
    }

    /// Scale another strategy's scores by each paper's downweight.
    ///
    /// Papers at the recommendation cap are dropped; the rest are re-sorted.
    pub fn adjust_scores(
        &self,
        base: &[RecommendationResult],
        params: &StrategyParams,
    ) -> Result<Vec<RecommendationResult>> {
        let (factor, max) = self.limits(params);
        let ids: Vec<i64> = base.iter().map(|r| r.paper_id).collect();
        let counts = self.queries.recommendation_counts(&ids)?;

        let mut adjusted: Vec<RecommendationResult> = base
            .iter()
            .filter_map(|r| {
                let count = counts.get(&r.paper_id).copied().unwrap_or(0);
                let w = downweight(count, factor, max);
                if w == 0.0 {
                    return None;
                }
                let mut out = r.clone();
                out.score *= w;
                if w < 1.0 {
                    out.reason = format!("{} (downweighted x{w:.3}, count={count})", r.reason);
                }
                Some(out)
            })
            .collect();
        sort_by_score_desc(&mut adjusted);
        Ok(adjusted)
    }
}

#[async_trait]
impl RecommendationStrategy for RepetitionFilter {
    fn strategy_name(&self) -> &'static str {
        REPETITION_FILTER
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Filter
    }

    /// Unlike the `< 0` default, a paper at the cap (score `0.0`) is excluded
    /// too, so it is surfaced at most `max_recommendations` times.
    fn excludes(&self, result: &RecommendationResult) -> bool {
        result.score <= 0.0
    }

    async fn recommend(
        &self,
        candidates: &[Paper],
        top_k: usize,
        params: &StrategyParams,
    ) -> Result<Vec<RecommendationResult>> {
        let (factor, max) = self.limits(params);
        let ids: Vec<i64> = candidates.iter().map(|p| p.id).collect();
        let counts = self.queries.recommendation_counts(&ids)?;

        let mut capped = 0usize;
        let mut results: Vec<RecommendationResult> = candidates
            .iter()
            .map(|paper| {
                let count = counts.get(&paper.id).copied().unwrap_or(0);
                let score = downweight(count, factor, max);
                let reason = if score == 0.0 {
                    capped += 1;
                    format!("Exceeded max recommendations ({count} >= {max})")
                } else if count == 0 {
                    "Not previously recommended (count=0)".to_string()
                } else if count == 1 {
                    "First recommendation (count=1)".to_string()
                } else {
                    format!("Recommended {count} times, downweight factor: {score:.3} (count={count})")
                };
                RecommendationResult::new(paper.id, score, reason, REPETITION_FILTER)
            })
            .collect();
        sort_by_score_desc(&mut results);
        results.truncate(top_k);

        info!(
            strategy = REPETITION_FILTER,
            capped,
            eligible = results.len().saturating_sub(capped),
            "repetition filter applied"
        );
        Ok(results)
    }
}
