//! Shared value types for strategies, fusion and the manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One scored paper produced by a strategy or by fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub paper_id: i64,
    pub score: f64,
    /// Human-readable explanation of the score.
    pub reason: String,
    /// Registry name of the producing strategy, or `fusion`.
    pub strategy_name: String,
}

impl RecommendationResult {
    pub fn new(
        paper_id: i64,
        score: f64,
        reason: impl Into<String>,
        strategy_name: impl Into<String>,
    ) -> Self {
        Self {
            paper_id,
            score,
            reason: reason.into(),
            strategy_name: strategy_name.into(),
        }
    }
}

/// Sort by score descending, ties by ascending paper id.
pub(crate) fn sort_by_score_desc(results: &mut [RecommendationResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.paper_id.cmp(&b.paper_id))
    });
}

/// Whether a strategy's output is fused or used to exclude papers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Output list is ranked and fed into fusion.
    Scoring,
    /// Strictly negative scores exclude papers from every scoring list.
    Filter,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scoring => f.write_str("scoring"),
            Self::Filter => f.write_str("filter"),
        }
    }
}

/// Per-call overrides. `None` falls back to the strategy's configured value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interested_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downweight_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_recommendations: Option<u32>,
    /// Training-state cutoff: only interactions created before this instant
    /// are visible to strategies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<DateTime<Utc>>,
}

impl StrategyParams {
    pub fn as_of(mut self, at: DateTime<Utc>) -> Self {
        self.as_of = Some(at);
        self
    }

    /// The instant strategies treat as "now".
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.as_of.unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_breaks_ties_by_paper_id() {
        let mut results = vec![
            RecommendationResult::new(9, 0.5, "", "s"),
            RecommendationResult::new(3, 0.5, "", "s"),
            RecommendationResult::new(5, 0.9, "", "s"),
        ];
        sort_by_score_desc(&mut results);
        let ids: Vec<i64> = results.iter().map(|r| r.paper_id).collect();
        assert_eq!(ids, vec![5, 3, 9]);
    }

    #[test]
    fn params_serialize_only_overrides() {
        let params = StrategyParams {
            min_similarity: Some(0.7),
            ..Default::default()
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, serde_json::json!({"min_similarity": 0.7}));
    }
}
