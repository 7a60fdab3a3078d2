//! Offline evaluation and weight tuning against a temporal split.
//!
//! Interactions the user acted on at or after the split date form the test set; the
//! recommender sees only the state before the split and must rank the
//! held-out positives.

use crate::manager::{RecommendRequest, RecommendationManager};
use crate::settings::{
    OptimizerMetric, DISINTERESTED_SEMANTIC, INTERESTED_SEMANTIC, KEYWORD_SEMANTIC, LLM_THEMES,
};
use crate::types::StrategyParams;
use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Ranking quality over the held-out positives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationMetrics {
    pub split_date: String,
    pub test_count: usize,
    pub found_count: usize,
    pub hit_rate: f64,
    /// Mean 1-based rank over found papers only. `None` when nothing was found.
    pub mean_rank: Option<f64>,
    /// Mean reciprocal rank over all test papers, missing papers count 0.
    pub mrr: f64,
    pub top_k: usize,
    /// Weights used for the run; empty means the manager's current weights.
    pub strategy_weights: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("invalid split date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("no interactions after split date {0}")]
    NoTestData(String),
    #[error("no positive interactions after split date {0}")]
    NoPositiveTestData(String),
    #[error("recommendation failed: {0}")]
    RecommendationFailed(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl Serialize for EvaluationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("error", &self.to_string())?;
        map.end()
    }
}

/// Metrics or the error that prevented computing them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EvaluationReport {
    Metrics(EvaluationMetrics),
    Error(EvaluationError),
}

impl From<Result<EvaluationMetrics, EvaluationError>> for EvaluationReport {
    fn from(result: Result<EvaluationMetrics, EvaluationError>) -> Self {
        match result {
            Ok(metrics) => Self::Metrics(metrics),
            Err(err) => Self::Error(err),
        }
    }
}

impl EvaluationReport {
    pub fn metrics(&self) -> Option<&EvaluationMetrics> {
        match self {
            Self::Metrics(m) => Some(m),
            Self::Error(_) => None,
        }
    }
}

/// One weight tried during grid search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSearchStep {
    /// 1-based pass number.
    pub iteration: usize,
    pub strategy: String,
    pub weight: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSearchResult {
    pub best_weights: BTreeMap<String, f64>,
    /// Evaluation rerun with `best_weights`.
    pub best_metrics: EvaluationReport,
    /// Objective value of `best_weights`.
    pub best_score: f64,
    pub metric: OptimizerMetric,
    /// Passes actually run.
    pub iterations: usize,
    pub history: Vec<GridSearchStep>,
}

/// Candidate weights searched when no ranges are configured.
pub fn default_weight_ranges() -> BTreeMap<String, Vec<f64>> {
    BTreeMap::from([
        (KEYWORD_SEMANTIC.to_string(), vec![0.5, 1.0, 1.5, 2.0]),
        (INTERESTED_SEMANTIC.to_string(), vec![0.5, 1.0, 1.5, 2.0]),
        (LLM_THEMES.to_string(), vec![0.0, 0.5, 1.0, 1.5]),
        (DISINTERESTED_SEMANTIC.to_string(), vec![0.0, 0.5, 1.0]),
    ])
}

/// Larger is better for every metric.
pub fn objective(metric: OptimizerMetric, metrics: &EvaluationMetrics) -> f64 {
    match metric {
        OptimizerMetric::Mrr => metrics.mrr,
        OptimizerMetric::HitRate => metrics.hit_rate,
        OptimizerMetric::MeanRank => metrics.mean_rank.map_or(0.0, |rank| 1.0 / rank),
    }
}

/// Parse `YYYY-MM-DD` into midnight UTC.
pub fn parse_split_date(raw: &str) -> Result<DateTime<Utc>, EvaluationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| EvaluationError::InvalidDate(raw.to_string()))
}

pub struct RecommendationOptimizer {
    manager: RecommendationManager,
}

impl RecommendationOptimizer {
    pub fn new(manager: RecommendationManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &RecommendationManager {
        &self.manager
    }

    pub fn into_manager(self) -> RecommendationManager {
        self.manager
    }

    /// Score one recommendation run against the positives after `split_date`.
    ///
    /// Never writes to the store.
    pub async fn evaluate(
        &mut self,
        split_date: &str,
        strategy_weights: Option<&BTreeMap<String, f64>>,
        top_k: usize,
    ) -> Result<EvaluationMetrics, EvaluationError> {
        let split = parse_split_date(split_date)?;
        let queries = self.manager.context().queries.clone();
        let storage = |e: dailypaper_state::StateError| EvaluationError::Storage(e.to_string());

        let after = queries.interactions_acted_since(split).map_err(storage)?;
        if after.is_empty() {
            return Err(EvaluationError::NoTestData(split_date.to_string()));
        }
        let test_ids: BTreeSet<i64> = after
            .iter()
            .filter(|i| i.is_positive())
            .map(|i| i.paper_id)
            .collect();
        if test_ids.is_empty() {
            return Err(EvaluationError::NoPositiveTestData(split_date.to_string()));
        }

        let mut pool: Vec<_> = queries
            .papers_published_before(split)
            .map_err(storage)?
            .into_iter()
            .filter(|p| !test_ids.contains(&p.id))
            .collect();
        let ids: Vec<i64> = test_ids.iter().copied().collect();
        pool.extend(queries.papers_by_ids(&ids).map_err(storage)?);
        debug!(
            split = %split_date,
            test = test_ids.len(),
            pool = pool.len(),
            "evaluating split"
        );

        let mut request = RecommendRequest::new(top_k)
            .with_candidates(pool)
            .record(false)
            .with_params(StrategyParams::default().as_of(split));
        if let Some(weights) = strategy_weights {
            request = request.with_weights(weights.clone());
        }
        let results = self
            .manager
            .recommend(request)
            .await
            .map_err(|e| EvaluationError::RecommendationFailed(e.to_string()))?;

        let ranks: HashMap<i64, usize> = results
            .iter()
            .enumerate()
            .map(|(idx, r)| (r.paper_id, idx + 1))
            .collect();
        let found: Vec<usize> = test_ids.iter().filter_map(|id| ranks.get(id).copied()).collect();
        let test_count = test_ids.len();
        let reciprocal: f64 = found.iter().map(|rank| 1.0 / *rank as f64).sum();

        let metrics = EvaluationMetrics {
            split_date: split_date.to_string(),
            test_count,
            found_count: found.len(),
            hit_rate: found.len() as f64 / test_count as f64,
            mean_rank: (!found.is_empty())
                .then(|| found.iter().sum::<usize>() as f64 / found.len() as f64),
            mrr: reciprocal / test_count as f64,
            top_k,
            strategy_weights: strategy_weights.cloned().unwrap_or_default(),
        };
        info!(
            split = %split_date,
            test = metrics.test_count,
            found = metrics.found_count,
            mrr = metrics.mrr,
            "evaluation complete"
        );
        Ok(metrics)
    }

    async fn score(
        &mut self,
        split_date: &str,
        weights: &BTreeMap<String, f64>,
        top_k: usize,
        metric: OptimizerMetric,
    ) -> f64 {
        match self.evaluate(split_date, Some(weights), top_k).await {
            Ok(metrics) => objective(metric, &metrics),
            Err(err) => {
                debug!(error = %err, "evaluation failed, scoring 0");
                0.0
            }
        }
    }

    /// Sequential coordinate descent over per-strategy weights.
    ///
    /// Every weight starts at 1.0. Each pass walks the strategies in name
    /// order, tries every candidate value with the others held fixed and
    /// commits the best one before moving on. Stops after a pass that does
    /// not beat the running best.
    pub async fn grid_search(
        &mut self,
        split_date: &str,
        weight_ranges: Option<BTreeMap<String, Vec<f64>>>,
        max_iterations: usize,
        metric: OptimizerMetric,
        top_k: usize,
    ) -> GridSearchResult {
        let ranges: BTreeMap<String, Vec<f64>> = weight_ranges
            .unwrap_or_else(default_weight_ranges)
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .collect();

        let mut current: BTreeMap<String, f64> =
            ranges.keys().map(|name| (name.clone(), 1.0)).collect();
        let mut best_weights = current.clone();
        let mut best_score = self.score(split_date, &current, top_k, metric).await;
        let mut history = Vec::new();
        let mut iterations = 0;

        info!(
            split = %split_date,
            metric = %metric,
            initial = best_score,
            strategies = ranges.len(),
            "starting grid search"
        );

        for iteration in 1..=max_iterations {
            iterations = iteration;
            let mut improved = false;

            for (strategy, values) in &ranges {
                let mut local_best: Option<(f64, f64)> = None;
                for &weight in values {
                    let mut trial = current.clone();
                    trial.insert(strategy.clone(), weight);
                    let score = self.score(split_date, &trial, top_k, metric).await;
                    history.push(GridSearchStep {
                        iteration,
                        strategy: strategy.clone(),
                        weight,
                        score,
                    });
                    if local_best.map_or(true, |(_, best)| score > best) {
                        local_best = Some((weight, score));
                    }
                }

                if let Some((weight, score)) = local_best {
                    current.insert(strategy.clone(), weight);
                    if score > best_score {
                        best_score = score;
                        best_weights = current.clone();
                        improved = true;
                    }
                    debug!(iteration, strategy = %strategy, weight, score, "coordinate committed");
                }
            }

            if !improved {
                info!(iteration, "no improvement in pass, stopping");
                break;
            }
        }

        let best_metrics: EvaluationReport = self
            .evaluate(split_date, Some(&best_weights), top_k)
            .await
            .into();
        if let EvaluationReport::Error(err) = &best_metrics {
            warn!(error = %err, "final evaluation with best weights failed");
        }
        info!(best_score, iterations, "grid search complete");

        GridSearchResult {
            best_weights,
            best_metrics,
            best_score,
            metric,
            iterations,
            history,
        }
    }
}
