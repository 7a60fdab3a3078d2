use super::RecommendationStrategy;
use crate::settings::DISINTERESTED_FILTER;
use crate::types::{RecommendationResult, StrategyKind, StrategyParams};
use anyhow::Result;
use async_trait::async_trait;
use dailypaper_state::{Paper, PaperQueries};
use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};

/// Excludes papers whose title or abstract mentions a disinterested keyword.
///
/// Keywords match as whole words, case-insensitively. Each distinct keyword
/// found subtracts 1.0 from the score.
pub struct DisinterestedKeywordFilter {
    queries: Arc<dyn PaperQueries>,
}

impl DisinterestedKeywordFilter {
    pub fn new(queries: Arc<dyn PaperQueries>) -> Self {
        Self { queries }
    }
}

/// Lower-cased keywords split on commas and whitespace, deduplicated.
pub(crate) fn parse_keywords(raw: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for kw in raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
    {
        if !keywords.contains(&kw) {
            keywords.push(kw);
        }
    }
    keywords
}

fn keyword_patterns(keywords: &[String]) -> Vec<(String, Regex)> {
    keywords
        .iter()
        .filter_map(|kw| {
            match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw))) {
                Ok(re) => Some((kw.clone(), re)),
                Err(err) => {
                    warn!(keyword = %kw, error = %err, "skipping unusable keyword");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl RecommendationStrategy for DisinterestedKeywordFilter {
    fn strategy_name(&self) -> &'static str {
        DISINTERESTED_FILTER
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Filter
    }

    async fn recommend(
        &self,
        candidates: &[Paper],
        _top_k: usize,
        _params: &StrategyParams,
    ) -> Result<Vec<RecommendationResult>> {
        let Some(profile) = self.queries.user_profile()? else {
            info!(strategy = DISINTERESTED_FILTER, "no user profile");
            return Ok(Vec::new());
        };
        let keywords = profile
            .disinterested_keywords
            .as_deref()
            .map(parse_keywords)
            .unwrap_or_default();
        if keywords.is_empty() {
            return Ok(candidates
                .iter()
                .map(|p| {
                    RecommendationResult::new(
                        p.id,
                        0.0,
                        "No disinterested keywords configured",
                        DISINTERESTED_FILTER,
                    )
                })
                .collect());
        }
        let patterns = keyword_patterns(&keywords);

        let mut flagged = 0usize;
        let results = candidates
            .iter()
            .map(|paper| {
                let haystack = format!(
                    "{} {}",
                    paper.title,
                    paper.abstract_text.as_deref().unwrap_or_default()
                );
                let matched: Vec<&str> = patterns
                    .iter()
                    .filter(|(_, re)| re.is_match(&haystack))
                    .map(|(kw, _)| kw.as_str())
                    .collect();
                if matched.is_empty() {
                    RecommendationResult::new(
                        paper.id,
                        0.0,
                        "No disinterested keywords matched",
                        DISINTERESTED_FILTER,
                    )
                } else {
                    flagged += 1;
                    RecommendationResult::new(
                        paper.id,
                        -(matched.len() as f64),
                        format!("Matches disinterested keywords: {}", matched.join(", ")),
                        DISINTERESTED_FILTER,
                    )
                }
            })
            .collect();

        info!(
            strategy = DISINTERESTED_FILTER,
            keywords = keywords.len(),
            flagged,
            "keyword filter applied"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture;

    #[test]
    fn keywords_split_on_commas_and_whitespace() {
        assert_eq!(
            parse_keywords("CNN, gan  reinforcement,,cnn"),
            vec!["cnn", "gan", "reinforcement"]
        );
    }

    #[tokio::test]
    async fn whole_word_case_insensitive_match() {
        let fx = fixture();
        fx.profile(None, Some("cnn"), None);
        let cnn = fx.paper_titled("A CNN-based approach", "segmentation of scans");
        let clean = fx.paper_titled("Transformers everywhere", "attention is enough");
        let partial = fx.paper_titled("Scnn variants", "no keyword here");

        let strategy = DisinterestedKeywordFilter::new(fx.queries());
        let results = strategy
            .recommend(&fx.all_papers(), 0, &StrategyParams::default())
            .await
            .unwrap();
        let score = |id: i64| results.iter().find(|r| r.paper_id == id).unwrap().score;
        assert_eq!(score(cnn), -1.0);
        assert_eq!(score(clean), 0.0);
        assert_eq!(score(partial), 0.0, "substring inside a word must not match");
    }

    #[tokio::test]
    async fn score_counts_distinct_keywords() {
        let fx = fixture();
        fx.profile(None, Some("gan, diffusion"), None);
        let both = fx.paper_titled("GAN meets diffusion", "a GAN and a GAN");
        let strategy = DisinterestedKeywordFilter::new(fx.queries());
        let results = strategy
            .recommend(&fx.all_papers(), 0, &StrategyParams::default())
            .await
            .unwrap();
        assert_eq!(results[0].paper_id, both);
        assert_eq!(results[0].score, -2.0);
        assert!(strategy.excludes(&results[0]));
    }

    #[tokio::test]
    async fn profile_states() {
        let fx = fixture();
        fx.paper("anything");
        let strategy = DisinterestedKeywordFilter::new(fx.queries());
        let params = StrategyParams::default();
        assert!(strategy
            .recommend(&fx.all_papers(), 0, &params)
            .await
            .unwrap()
            .is_empty());

        fx.profile(Some("graphs"), Some("  "), None);
        let results = strategy.recommend(&fx.all_papers(), 0, &params).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 0.0);
        assert!(!strategy.excludes(&results[0]));
    }
}
