//! Weighted Reciprocal Rank Fusion.
//!
//! Each strategy list contributes `weight * 1 / (rrf_k + rank)` to every paper
//! it ranks, with `rank` 1-based by list position. Only positions matter, so
//! lists on unrelated score scales combine without calibration.

use crate::types::RecommendationResult;
use std::collections::{BTreeMap, HashMap};

/// Standard RRF smoothing constant.
pub const DEFAULT_RRF_K: f64 = 60.0;

/// `strategy_name` stamped on fused results.
pub const FUSION_STRATEGY: &str = "fusion";

#[derive(Debug, Clone)]
pub struct FusionEngine {
    rrf_k: f64,
    weights: HashMap<String, f64>,
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_RRF_K)
    }
}

#[derive(Default)]
struct Accumulator {
    score: f64,
    reasons: Vec<String>,
}

impl FusionEngine {
    pub fn new(rrf_k: f64) -> Self {
        Self {
            rrf_k,
            weights: HashMap::new(),
        }
    }

    pub fn with_weights(mut self, weights: impl IntoIterator<Item = (String, f64)>) -> Self {
        self.set_strategy_weights(weights);
        self
    }

    pub fn rrf_k(&self) -> f64 {
        self.rrf_k
    }

    /// Replace all weights. Strategies not listed fall back to 1.0.
    pub fn set_strategy_weights(&mut self, weights: impl IntoIterator<Item = (String, f64)>) {
        self.weights = weights.into_iter().collect();
    }

    pub fn strategy_weight(&self, name: &str) -> f64 {
        self.weights.get(name).copied().unwrap_or(1.0)
    }

    /// Fuse per-strategy lists into the top `top_k` papers.
    ///
    /// Each input list must already be ordered best-first. Ties in fused
    /// score are broken by ascending `paper_id`.
    pub fn fuse(
        &self,
        strategy_results: &BTreeMap<String, Vec<RecommendationResult>>,
        top_k: usize,
    ) -> Vec<RecommendationResult> {
        let mut acc: HashMap<i64, Accumulator> = HashMap::new();

        for (strategy, results) in strategy_results {
            let weight = self.strategy_weight(strategy);
            for (idx, result) in results.iter().enumerate() {
                let rank = (idx + 1) as f64;
                let entry = acc.entry(result.paper_id).or_default();
                entry.score += weight / (self.rrf_k + rank);
                if !result.reason.is_empty() {
                    entry.reasons.push(format!("{strategy}: {}", result.reason));
                }
            }
        }

        let mut fused: Vec<(i64, Accumulator)> = acc.into_iter().collect();
        fused.sort_by(|(id_a, a), (id_b, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| id_a.cmp(id_b))
        });

        fused
            .into_iter()
            .take(top_k)
            .map(|(paper_id, acc)| {
                let reason = if acc.reasons.is_empty() {
                    format!("RRF score: {:.4}", acc.score)
                } else {
                    acc.reasons.join(" | ")
                };
                RecommendationResult::new(paper_id, acc.score, reason, FUSION_STRATEGY)
            })
            .collect()
    }

    /// Min-max normalize each list into `[0, 1]`, re-sort, then `fuse`.
    ///
    /// A list whose scores are all equal normalizes to 1.0 throughout.
    pub fn fuse_with_normalization(
        &self,
        strategy_results: &BTreeMap<String, Vec<RecommendationResult>>,
        top_k: usize,
    ) -> Vec<RecommendationResult> {
        let normalized: BTreeMap<String, Vec<RecommendationResult>> = strategy_results
            .iter()
            .map(|(name, results)| (name.clone(), normalize_scores(results)))
            .collect();
        self.fuse(&normalized, top_k)
    }
}

fn normalize_scores(results: &[RecommendationResult]) -> Vec<RecommendationResult> {
    if results.is_empty() {
        return Vec::new();
    }
    let (min, max) = results
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
            (lo.min(r.score), hi.max(r.score))
        });
    let range = max - min;

    let mut out: Vec<RecommendationResult> = results
        .iter()
        .map(|r| {
            let score = if range > 0.0 {
                (r.score - min) / range
            } else {
                1.0
            };
            RecommendationResult {
                score,
                ..r.clone()
            }
        })
        .collect();
    // Stable: equal scores keep their input order.
    out.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    out
}
