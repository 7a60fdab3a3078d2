use super::{unread, RecommendationStrategy};
use crate::llm::{extract_json_array, LlmClient};
use crate::settings::LLM_THEMES;
use crate::types::{sort_by_score_desc, RecommendationResult, StrategyKind, StrategyParams};
use anyhow::Result;
use async_trait::async_trait;
use dailypaper_state::{Paper, PaperQueries};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Papers per prompt; the rest of the pool is not scored by the model.
const MAX_PROMPT_PAPERS: usize = 50;
const MAX_ABSTRACT_CHARS: usize = 500;

const SYSTEM_PROMPT: &str = "You rate research papers against a reader's interest themes. \
Reply with a JSON array only.";

/// Asks the LLM to score candidates against the active interest themes.
pub struct LlmThemes {
    queries: Arc<dyn PaperQueries>,
    llm: Option<Arc<dyn LlmClient>>,
}

#[derive(Debug, Deserialize)]
struct ThemeScore {
    paper_id: i64,
    score: f64,
    #[serde(default)]
    reason: String,
}

impl LlmThemes {
    pub fn new(queries: Arc<dyn PaperQueries>, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { queries, llm }
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn build_prompt(themes: &[String], papers: &[&Paper]) -> String {
    let mut prompt = String::from("Interest themes:\n");
    for theme in themes {
        let _ = writeln!(prompt, "- {theme}");
    }
    prompt.push_str("\nPapers:\n");
    for paper in papers {
        let _ = writeln!(prompt, "[{}] {}", paper.id, paper.title);
        if let Some(text) = paper.abstract_content() {
            let _ = writeln!(prompt, "{}", truncate_chars(text, MAX_ABSTRACT_CHARS));
        }
    }
    prompt.push_str(
        "\nReturn a JSON array of {\"paper_id\": <id>, \"score\": <0..1>, \"reason\": <short text>} \
         for papers relevant to any theme.",
    );
    prompt
}

/// Keep known ids once each, clamp scores into `[0, 1]`.
fn sanitize(scores: Vec<ThemeScore>, known: &HashSet<i64>) -> Vec<RecommendationResult> {
    let mut seen = HashSet::new();
    scores
        .into_iter()
        .filter(|s| known.contains(&s.paper_id) && s.score.is_finite())
        .filter(|s| seen.insert(s.paper_id))
        .map(|s| {
            let reason = if s.reason.trim().is_empty() {
                "Matches an interest theme".to_string()
            } else {
                s.reason.trim().to_string()
            };
            RecommendationResult::new(s.paper_id, s.score.clamp(0.0, 1.0), reason, LLM_THEMES)
        })
        .collect()
}

#[async_trait]
impl RecommendationStrategy for LlmThemes {
    fn strategy_name(&self) -> &'static str {
        LLM_THEMES
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
        let Some(llm) = self.llm.as_ref() else {
            info!(strategy = LLM_THEMES, "no llm client configured");
            return Ok(Vec::new());
        };
        let themes: Vec<String> = self
            .queries
            .active_themes()?
            .into_iter()
            .map(|t| t.theme)
            .collect();
        if themes.is_empty() {
            info!(strategy = LLM_THEMES, "no active interest themes");
            return Ok(Vec::new());
        }

        let papers: Vec<&Paper> = unread(self.queries.as_ref(), candidates, params)?
            .into_iter()
            .take(MAX_PROMPT_PAPERS)
            .collect();
        if papers.is_empty() {
            return Ok(Vec::new());
        }
        let known: HashSet<i64> = papers.iter().map(|p| p.id).collect();

        let reply = match llm.complete(SYSTEM_PROMPT, &build_prompt(&themes, &papers)).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(strategy = LLM_THEMES, error = %err, "llm call failed");
                return Ok(Vec::new());
            }
        };
        let parsed: Vec<ThemeScore> = match serde_json::from_str(extract_json_array(&reply)) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(strategy = LLM_THEMES, error = %err, "unparsable llm reply");
                debug!(reply = %reply, "raw llm reply");
                return Ok(Vec::new());
            }
        };

        let mut results = sanitize(parsed, &known);
        sort_by_score_desc(&mut results);
        results.truncate(top_k);
        info!(
            strategy = LLM_THEMES,
            themes = themes.len(),
            scored = results.len(),
            "llm themes scored"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, FakeLlm};

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[tokio::test]
    async fn parses_clamps_and_drops_unknown_ids() {
        let fx = fixture();
        let a = fx.paper("retrieval augmented generation");
        let b = fx.paper("sparse attention kernels");
        fx.themes(&["retrieval for LLMs"]);
        let reply = format!(
            "```json\n[{{\"paper_id\": {b}, \"score\": 0.4, \"reason\": \"kernels\"}}, \
             {{\"paper_id\": {a}, \"score\": 1.7, \"reason\": \"RAG\"}}, \
             {{\"paper_id\": 999, \"score\": 0.9}}]\n```"
        );
        let llm = Arc::new(FakeLlm::replying(reply));
        let strategy = LlmThemes::new(fx.queries(), Some(llm.clone() as Arc<dyn LlmClient>));

        let results = strategy
            .recommend(&fx.all_papers(), 10, &StrategyParams::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].paper_id, a);
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[0].reason, "RAG");
        assert_eq!(results[1].paper_id, b);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("- retrieval for LLMs"));
        assert!(prompts[0].contains(&format!("[{a}] retrieval augmented generation")));
    }

    #[tokio::test]
    async fn fails_soft() {
        let fx = fixture();
        fx.paper("retrieval augmented generation");
        let params = StrategyParams::default();

        let no_client = LlmThemes::new(fx.queries(), None);
        assert!(no_client.recommend(&fx.all_papers(), 10, &params).await.unwrap().is_empty());

        let no_themes = LlmThemes::new(fx.queries(), Some(Arc::new(FakeLlm::replying("[]"))));
        assert!(no_themes.recommend(&fx.all_papers(), 10, &params).await.unwrap().is_empty());

        fx.themes(&["retrieval"]);
        let garbage = LlmThemes::new(fx.queries(), Some(Arc::new(FakeLlm::replying("no idea"))));
        assert!(garbage.recommend(&fx.all_papers(), 10, &params).await.unwrap().is_empty());

        let failing = LlmThemes::new(fx.queries(), Some(Arc::new(FakeLlm::failing())));
        assert!(failing.recommend(&fx.all_papers(), 10, &params).await.unwrap().is_empty());
    }
}
