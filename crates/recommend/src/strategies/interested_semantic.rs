use super::{unread, RecommendationStrategy};
use crate::embedding::{embed_all, EmbeddingProvider};
use crate::settings::INTERESTED_SEMANTIC;
use crate::similarity::mean_similarity;
use crate::types::{sort_by_score_desc, RecommendationResult, StrategyKind, StrategyParams};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use dailypaper_state::{InteractionAction, Paper, PaperQueries};
use std::sync::Arc;
use tracing::{info, warn};

/// Mean similarity to papers recently marked interested.
pub struct InterestedSemantic {
    queries: Arc<dyn PaperQueries>,
    embedder: Arc<dyn EmbeddingProvider>,
    interested_days: i64,
    min_similarity: f64,
}

impl InterestedSemantic {
    pub fn new(
        queries: Arc<dyn PaperQueries>,
        embedder: Arc<dyn EmbeddingProvider>,
        interested_days: i64,
        min_similarity: f64,
    ) -> Self {
        Self {
            queries,
            embedder,
            interested_days,
            min_similarity,
        }
    }
}

#[async_trait]
impl RecommendationStrategy for InterestedSemantic {
    fn strategy_name(&self) -> &'static str {
        INTERESTED_SEMANTIC
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Scoring
    }

    async fn recommend(
        &self,
        candidates: &[Paper],
        top_k: usize,
        params: &StrategyParams,
    ) -> Result<Vec<RecommendationResult>> {
        let days = params.interested_days.unwrap_or(self.interested_days);
        let min_similarity = params.min_similarity.unwrap_or(self.min_similarity);
        let since = params.reference_time() - Duration::days(days);

        let interactions = self.queries.interactions_by_action(
            InteractionAction::Interested,
            Some(since),
            params.as_of,
        )?;
        if interactions.is_empty() {
            info!(strategy = INTERESTED_SEMANTIC, days, "no recently interested papers");
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = interactions.iter().map(|i| i.paper_id).collect();
        let liked = self.queries.papers_by_ids(&ids)?;
        let liked_texts: Vec<&str> = liked.iter().filter_map(Paper::preferred_text).collect();
        if liked_texts.is_empty() {
            info!(strategy = INTERESTED_SEMANTIC, "interested papers have no text");
            return Ok(Vec::new());
        }

        let papers: Vec<(&Paper, &str)> = unread(self.queries.as_ref(), candidates, params)?
            .into_iter()
            .filter_map(|p| p.preferred_text().map(|text| (p, text)))
            .collect();
        if papers.is_empty() {
            return Ok(Vec::new());
        }

        let liked_vecs = match embed_all(self.embedder.as_ref(), &liked_texts).await {
            Ok(v) => v,
            Err(err) => {
                warn!(strategy = INTERESTED_SEMANTIC, error = %err, "embedding failed");
                return Ok(Vec::new());
            }
        };
        let texts: Vec<&str> = papers.iter().map(|(_, text)| *text).collect();
        let vectors = match embed_all(self.embedder.as_ref(), &texts).await {
            Ok(v) => v,
            Err(err) => {
                warn!(strategy = INTERESTED_SEMANTIC, error = %err, "embedding failed");
                return Ok(Vec::new());
            }
        };

        let mut results: Vec<RecommendationResult> = papers
            .iter()
            .zip(&vectors)
            .filter_map(|((paper, _), vec)| {
                let avg = mean_similarity(vec, &liked_vecs);
                (avg >= min_similarity).then(|| {
                    RecommendationResult::new(
                        paper.id,
                        avg,
                        format!(
                            "Similar to {} recently interested papers (avg: {avg:.3})",
                            liked_vecs.len()
                        ),
                        INTERESTED_SEMANTIC,
                    )
                })
            })
            .collect();
        sort_by_score_desc(&mut results);
        results.truncate(top_k);

        info!(
            strategy = INTERESTED_SEMANTIC,
            liked = liked_vecs.len(),
            matched = results.len(),
            "interested semantic scored"
        );
        Ok(results)
    }
}
