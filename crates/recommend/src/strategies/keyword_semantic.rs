use super::{unread, RecommendationStrategy};
use crate::embedding::{embed_all, EmbeddingProvider};
use crate::settings::KEYWORD_SEMANTIC;
use crate::similarity::cosine_similarity;
use crate::types::{sort_by_score_desc, RecommendationResult, StrategyKind, StrategyParams};
use anyhow::Result;
use async_trait::async_trait;
use dailypaper_state::{Paper, PaperQueries, UserProfile};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Similarity between the profile's stated interests and each paper.
pub struct KeywordSemantic {
    queries: Arc<dyn PaperQueries>,
    embedder: Arc<dyn EmbeddingProvider>,
    min_similarity: f64,
}

impl KeywordSemantic {
    pub fn new(
        queries: Arc<dyn PaperQueries>,
        embedder: Arc<dyn EmbeddingProvider>,
        min_similarity: f64,
    ) -> Self {
        Self {
            queries,
            embedder,
            min_similarity,
        }
    }
}

/// `interested_keywords` and `interest_description` joined by a space.
fn interest_query(profile: &UserProfile) -> Option<String> {
    let parts: Vec<&str> = [
        profile.interested_keywords.as_deref(),
        profile.interest_description.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

#[async_trait]
impl RecommendationStrategy for KeywordSemantic {
    fn strategy_name(&self) -> &'static str {
        KEYWORD_SEMANTIC
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
        let min_similarity = params.min_similarity.unwrap_or(self.min_similarity);

        let Some(profile) = self.queries.user_profile()? else {
            info!(strategy = KEYWORD_SEMANTIC, "no user profile");
            return Ok(Vec::new());
        };
        let Some(query) = interest_query(&profile) else {
            info!(strategy = KEYWORD_SEMANTIC, "profile has no interests");
            return Ok(Vec::new());
        };

        let papers: Vec<(&Paper, &str)> = unread(self.queries.as_ref(), candidates, params)?
            .into_iter()
            .filter_map(|p| p.embedding_text().map(|text| (p, text)))
            .collect();
        if papers.is_empty() {
            debug!(strategy = KEYWORD_SEMANTIC, "no unread candidates with text");
            return Ok(Vec::new());
        }

        let query_vec = match self.embedder.embed(&query).await {
            Ok(v) => v,
            Err(err) => {
                warn!(strategy = KEYWORD_SEMANTIC, error = %err, "query embedding failed");
                return Ok(Vec::new());
            }
        };
        let texts: Vec<&str> = papers.iter().map(|(_, text)| *text).collect();
        let vectors = match embed_all(self.embedder.as_ref(), &texts).await {
            Ok(v) => v,
            Err(err) => {
                warn!(strategy = KEYWORD_SEMANTIC, error = %err, "paper embedding failed");
                return Ok(Vec::new());
            }
        };

        let mut results: Vec<RecommendationResult> = papers
            .iter()
            .zip(&vectors)
            .filter_map(|((paper, _), vec)| {
                let sim = cosine_similarity(&query_vec, vec);
                (sim >= min_similarity).then(|| {
                    RecommendationResult::new(
                        paper.id,
                        sim,
                        format!("Matches your interests (similarity: {sim:.3})"),
                        KEYWORD_SEMANTIC,
                    )
                })
            })
            .collect();
        sort_by_score_desc(&mut results);
        results.truncate(top_k);

        info!(
            strategy = KEYWORD_SEMANTIC,
            candidates = papers.len(),
            matched = results.len(),
            "keyword semantic scored"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, FakeEmbedder};
    use dailypaper_state::InteractionAction;

    #[test]
    fn query_joins_non_blank_parts() {
        let profile = UserProfile {
            interested_keywords: Some(" retrieval ".into()),
            interest_description: Some("".into()),
            ..Default::default()
        };
        assert_eq!(interest_query(&profile).as_deref(), Some("retrieval"));
        assert_eq!(interest_query(&UserProfile::default()), None);
    }

    #[tokio::test]
    async fn ranks_unread_papers_above_threshold() {
        let fx = fixture();
        fx.profile(Some("graph"), None, None);
        let close = fx.paper("graph neural networks");
        let far = fx.paper("protein folding");
        let read = fx.paper("graph transformers");
        fx.mark(read, InteractionAction::Interested, "2024-01-01");

        let strategy = KeywordSemantic::new(fx.queries(), fx.embedder(), 0.5);
        let results = strategy
            .recommend(&fx.all_papers(), 10, &StrategyParams::default())
            .await
            .unwrap();

        let ids: Vec<i64> = results.iter().map(|r| r.paper_id).collect();
        assert_eq!(ids, vec![close]);
        assert!(!ids.contains(&far));
        assert_eq!(results[0].strategy_name, KEYWORD_SEMANTIC);
    }

    #[tokio::test]
    async fn min_similarity_override_widens_results() {
        let fx = fixture();
        fx.profile(Some("graph"), Some("neural"), None);
        fx.paper("graph neural networks");
        fx.paper("neural protein folding");

        let strategy = KeywordSemantic::new(fx.queries(), fx.embedder(), 0.99);
        let params = StrategyParams {
            min_similarity: Some(0.0),
            ..Default::default()
        };
        let results = strategy.recommend(&fx.all_papers(), 10, &params).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn soft_failures_yield_empty() {
        let fx = fixture();
        fx.paper("graph neural networks");
        let strategy = KeywordSemantic::new(fx.queries(), fx.embedder(), 0.0);
        assert!(strategy
            .recommend(&fx.all_papers(), 10, &StrategyParams::default())
            .await
            .unwrap()
            .is_empty(), "no profile");

        fx.profile(Some("graph"), None, None);
        let failing = KeywordSemantic::new(fx.queries(), Arc::new(FakeEmbedder::failing()), 0.0);
        assert!(failing
            .recommend(&fx.all_papers(), 10, &StrategyParams::default())
            .await
            .unwrap()
            .is_empty(), "embedding failure");
    }

    #[tokio::test]
    async fn short_embedding_batch_is_a_failure_not_a_truncation() {
        let fx = fixture();
        fx.profile(Some("graph"), None, None);
        fx.paper("graph neural networks");
        fx.paper("graph transformers");

        let strategy =
            KeywordSemantic::new(fx.queries(), Arc::new(FakeEmbedder::dropping_last()), 0.0);
        let results = strategy
            .recommend(&fx.all_papers(), 10, &StrategyParams::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
