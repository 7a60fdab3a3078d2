use super::RecommendationStrategy;
use crate::embedding::{embed_all, EmbeddingProvider};
use crate::settings::DISINTERESTED_SEMANTIC;
use crate::similarity::mean_similarity;
use crate::types::{RecommendationResult, StrategyKind, StrategyParams};
use anyhow::Result;
use async_trait::async_trait;
use dailypaper_state::{InteractionAction, Paper, PaperQueries};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

/// Penalizes papers resembling ones the user marked not interested.
///
/// Emits one result per candidate. Scores are `-avg_similarity` at or above
/// the threshold and `0.0` below it, so the list orders neutral papers first.
/// Equal scores keep the order of the candidates.
pub struct DisinterestedSemantic {
    queries: Arc<dyn PaperQueries>,
    embedder: Arc<dyn EmbeddingProvider>,
    similarity_threshold: f64,
}

impl DisinterestedSemantic {
    pub fn new(
        queries: Arc<dyn PaperQueries>,
        embedder: Arc<dyn EmbeddingProvider>,
        similarity_threshold: f64,
    ) -> Self {
        Self {
            queries,
            embedder,
            similarity_threshold,
        }
    }
}

fn neutral(candidates: &[Paper], reason: &str) -> Vec<RecommendationResult> {
    candidates
        .iter()
        .map(|p| RecommendationResult::new(p.id, 0.0, reason, DISINTERESTED_SEMANTIC))
        .collect()
}

#[async_trait]
impl RecommendationStrategy for DisinterestedSemantic {
    fn strategy_name(&self) -> &'static str {
        DISINTERESTED_SEMANTIC
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Scoring
    }

    async fn recommend(
        &self,
        candidates: &[Paper],
        _top_k: usize,
        params: &StrategyParams,
    ) -> Result<Vec<RecommendationResult>> {
        let threshold = params
            .similarity_threshold
            .unwrap_or(self.similarity_threshold);

        let disliked_ids: Vec<i64> = self
            .queries
            .interactions_by_action(InteractionAction::NotInterested, None, params.as_of)?
            .iter()
            .map(|i| i.paper_id)
            .collect();
        if disliked_ids.is_empty() {
            return Ok(neutral(candidates, "No disinterested papers to compare"));
        }
        let disliked = self.queries.papers_by_ids(&disliked_ids)?;
        let disliked_texts: Vec<&str> =
            disliked.iter().filter_map(Paper::embedding_text).collect();
        if disliked_texts.is_empty() {
            return Ok(neutral(candidates, "No disinterested papers to compare"));
        }

        let disliked_vecs = match embed_all(self.embedder.as_ref(), &disliked_texts).await {
            Ok(v) => v,
            Err(err) => {
                warn!(strategy = DISINTERESTED_SEMANTIC, error = %err, "embedding failed");
                return Ok(Vec::new());
            }
        };
        let texts: Vec<&str> = candidates.iter().filter_map(Paper::embedding_text).collect();
        let vectors = match embed_all(self.embedder.as_ref(), &texts).await {
            Ok(v) => v,
            Err(err) => {
                warn!(strategy = DISINTERESTED_SEMANTIC, error = %err, "embedding failed");
                return Ok(Vec::new());
            }
        };

        let mut vectors = vectors.iter();
        let mut results: Vec<RecommendationResult> = candidates
            .iter()
            .map(|paper| {
                let Some(vec) = paper.embedding_text().and_then(|_| vectors.next()) else {
                    return RecommendationResult::new(
                        paper.id,
                        0.0,
                        "No text to compare",
                        DISINTERESTED_SEMANTIC,
                    );
                };
                let avg = mean_similarity(vec, &disliked_vecs);
                if avg >= threshold {
                    RecommendationResult::new(
                        paper.id,
                        -avg,
                        format!(
                            "Similar to {} disinterested papers (avg: {avg:.3})",
                            disliked_vecs.len()
                        ),
                        DISINTERESTED_SEMANTIC,
                    )
                } else {
                    RecommendationResult::new(
                        paper.id,
                        0.0,
                        format!("Not similar to disinterested papers (avg: {avg:.3})"),
                        DISINTERESTED_SEMANTIC,
                    )
                }
            })
            .collect();
        // Stable on score alone: neutral papers keep candidate order.
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let penalized = results.iter().filter(|r| r.score < 0.0).count();
        info!(
            strategy = DISINTERESTED_SEMANTIC,
            candidates = results.len(),
            penalized,
            "disinterested semantic scored"
        );
        Ok(results)
    }
}
