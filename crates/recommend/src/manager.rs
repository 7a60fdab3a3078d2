//! Orchestrates strategies, filters and fusion for one recommendation call.

use crate::fusion::FusionEngine;
use crate::registry::{StrategyContext, StrategyRegistry};
use crate::strategies::RecommendationStrategy;
use crate::types::{RecommendationResult, StrategyKind, StrategyParams};
use chrono::Utc;
use dailypaper_state::{Paper, RecommendationRecorder, StateError};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Inputs for `RecommendationManager::recommend`.
#[derive(Debug, Clone)]
pub struct RecommendRequest {
    pub top_k: usize,
    /// Explicit pool. `None` means every unread paper.
    pub candidates: Option<Vec<Paper>>,
    pub record_recommendations: bool,
    /// Replaces the fusion weights before fusing when present.
    pub strategy_weights: Option<BTreeMap<String, f64>>,
    pub params: StrategyParams,
}

impl RecommendRequest {
    /// Request over unread papers that records the outcome.
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            candidates: None,
            record_recommendations: true,
            strategy_weights: None,
            params: StrategyParams::default(),
        }
    }

    pub fn with_candidates(mut self, candidates: Vec<Paper>) -> Self {
        self.candidates = Some(candidates);
        self
    }

    pub fn record(mut self, record: bool) -> Self {
        self.record_recommendations = record;
        self
    }

    pub fn with_weights(mut self, weights: BTreeMap<String, f64>) -> Self {
        self.strategy_weights = Some(weights);
        self
    }

    pub fn with_params(mut self, params: StrategyParams) -> Self {
        self.params = params;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("failed to load candidate papers: {0}")]
    Candidates(#[source] StateError),
    /// The ranking was computed but could not be recorded; nothing was written.
    #[error("failed to record {} recommendations: {source}", .results.len())]
    Recording {
        results: Vec<RecommendationResult>,
        #[source]
        source: StateError,
    },
}

impl RecommendError {
    /// The computed ranking, when one exists.
    pub fn results(&self) -> Option<&[RecommendationResult]> {
        match self {
            Self::Recording { results, .. } => Some(results),
            Self::Candidates(_) => None,
        }
    }
}

pub struct RecommendationManager {
    registry: StrategyRegistry,
    context: StrategyContext,
    recorder: Arc<dyn RecommendationRecorder>,
    enabled: Vec<String>,
    fusion: FusionEngine,
}

impl RecommendationManager {
    /// Enabled strategies, `rrf_k` and initial weights come from `context.settings`.
    pub fn new(
        registry: StrategyRegistry,
        context: StrategyContext,
        recorder: Arc<dyn RecommendationRecorder>,
    ) -> Self {
        let settings = &context.settings;
        let fusion = FusionEngine::new(settings.rrf_k).with_weights(
            settings
                .strategy_weights
                .iter()
                .map(|(k, v)| (k.clone(), *v)),
        );
        let enabled = settings.enabled_strategies.clone();
        Self {
            registry,
            context,
            recorder,
            enabled,
            fusion,
        }
    }

    pub fn enabled_strategies(&self) -> &[String] {
        &self.enabled
    }

    pub fn set_enabled_strategies(&mut self, names: Vec<String>) {
        self.enabled = names;
    }

    pub fn fusion(&self) -> &FusionEngine {
        &self.fusion
    }

    pub fn context(&self) -> &StrategyContext {
        &self.context
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    fn instantiate(&self) -> Vec<Box<dyn RecommendationStrategy>> {
        self.enabled
            .iter()
            .filter_map(|name| match self.registry.create(name, &self.context) {
                Ok(strategy) => Some(strategy),
                Err(err) => {
                    warn!(strategy = %name, error = %err, "skipping unknown strategy");
                    None
                }
            })
            .collect()
    }

    /// Rank candidates with every enabled strategy and fuse the lists.
    ///
    /// Strategy failures are logged and the strategy is left out. Only a
    /// failed candidate load or a failed recording surfaces as an error.
    pub async fn recommend(
        &mut self,
        request: RecommendRequest,
    ) -> Result<Vec<RecommendationResult>, RecommendError> {
        let RecommendRequest {
            top_k,
            candidates,
            record_recommendations,
            strategy_weights,
            params,
        } = request;

        let candidates = match candidates {
            Some(c) => c,
            None => self
                .context
                .queries
                .unread_papers()
                .map_err(RecommendError::Candidates)?,
        };
        if candidates.is_empty() || self.enabled.is_empty() {
            info!(
                candidates = candidates.len(),
                strategies = self.enabled.len(),
                "nothing to recommend"
            );
            return Ok(Vec::new());
        }

        let (scoring, filters): (Vec<_>, Vec<_>) = self
            .instantiate()
            .into_iter()
            .partition(|s| s.kind() == StrategyKind::Scoring);

        let mut lists: BTreeMap<String, Vec<RecommendationResult>> = BTreeMap::new();
        for strategy in &scoring {
            let name = strategy.strategy_name();
            match strategy
                .recommend(&candidates, top_k.saturating_mul(2), &params)
                .await
            {
                Ok(results) if results.is_empty() => {
                    debug!(strategy = name, "strategy produced no results");
                }
                Ok(results) => {
                    debug!(strategy = name, count = results.len(), "strategy scored");
                    lists.insert(name.to_string(), results);
                }
                Err(err) => {
                    warn!(strategy = name, error = %err, "strategy failed, omitting from fusion");
                }
            }
        }
        if lists.is_empty() {
            info!("no scoring strategy produced results");
            return Ok(Vec::new());
        }

        let mut excluded: HashSet<i64> = HashSet::new();
        for filter in &filters {
            let name = filter.strategy_name();
            match filter
                .recommend(&candidates, candidates.len(), &params)
                .await
            {
                Ok(results) => {
                    let before = excluded.len();
                    excluded.extend(
                        results
                            .iter()
                            .filter(|r| filter.excludes(r))
                            .map(|r| r.paper_id),
                    );
                    info!(filter = name, excluded = excluded.len() - before, "filter applied");
                }
                Err(err) => warn!(filter = name, error = %err, "filter failed"),
            }
        }
        if !excluded.is_empty() {
            for results in lists.values_mut() {
                results.retain(|r| !excluded.contains(&r.paper_id));
            }
        }

        if let Some(weights) = strategy_weights {
            self.fusion.set_strategy_weights(weights);
        }
        let fused = self.fusion.fuse(&lists, top_k);
        info!(
            candidates = candidates.len(),
            strategies = lists.len(),
            excluded = excluded.len(),
            returned = fused.len(),
            "recommendations fused"
        );

        if record_recommendations && !fused.is_empty() {
            let ids: Vec<i64> = fused.iter().map(|r| r.paper_id).collect();
            if let Err(source) = self.recorder.record_recommendations(&ids, Utc::now()) {
                warn!(error = %source, "recording recommendations failed, batch rolled back");
                return Err(RecommendError::Recording {
                    results: fused,
                    source,
                });
            }
        }
        Ok(fused)
    }
}
