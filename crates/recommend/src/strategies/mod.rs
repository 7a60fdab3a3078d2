//! Built-in recommendation strategies.
//!
//! Scoring strategies produce ranked lists for fusion. Filter strategies
//! score every candidate and the manager drops the papers they exclude.

mod disinterested_filter;
mod disinterested_semantic;
mod interested_semantic;
mod keyword_semantic;
mod llm_themes;
mod repetition_filter;

pub use disinterested_filter::DisinterestedKeywordFilter;
pub use disinterested_semantic::DisinterestedSemantic;
pub use interested_semantic::InterestedSemantic;
pub use keyword_semantic::KeywordSemantic;
pub use llm_themes::LlmThemes;
pub use repetition_filter::RepetitionFilter;

use crate::types::{RecommendationResult, StrategyKind, StrategyParams};
use anyhow::Result;
use async_trait::async_trait;
use dailypaper_state::{Paper, PaperQueries};

/// A pluggable scorer over candidate papers.
///
/// Implementations never mutate the candidates and return results ordered
/// by score descending.
#[async_trait]
pub trait RecommendationStrategy: Send + Sync {
    /// Registry name, also used as the fusion weight key.
    fn strategy_name(&self) -> &'static str;

    fn kind(&self) -> StrategyKind;

    /// Whether a filter result removes its paper from every scoring list.
    fn excludes(&self, result: &RecommendationResult) -> bool {
        result.score < 0.0
    }

    async fn recommend(
        &self,
        candidates: &[Paper],
        top_k: usize,
        params: &StrategyParams,
    ) -> Result<Vec<RecommendationResult>>;
}

/// Candidates the user has not read as of `params.as_of`.
pub(crate) fn unread<'a>(
    queries: &dyn PaperQueries,
    candidates: &'a [Paper],
    params: &StrategyParams,
) -> Result<Vec<&'a Paper>> {
    let read = queries.read_paper_ids(params.as_of)?;
    Ok(candidates.iter().filter(|p| !read.contains(&p.id)).collect())
}
