//! Interest theme regeneration from recently liked papers.

use crate::llm::{extract_json_array, LlmClient};
use crate::settings::RecommendationSettings;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use dailypaper_state::{InteractionAction, InterestTheme, PaperQueries, SqliteStore};
use tracing::{debug, info};

/// Papers included in the theme prompt.
const MAX_THEME_PAPERS: usize = 30;
const MAX_ABSTRACT_CHARS: usize = 300;

const SYSTEM_PROMPT: &str = "You summarize a researcher's reading interests. \
Reply with a JSON array of short theme strings (2 to 6 words each) and nothing else.";

/// True when the active themes are missing, stale or outpaced by new likes.
pub fn needs_refresh(
    queries: &dyn PaperQueries,
    settings: &RecommendationSettings,
    now: DateTime<Utc>,
) -> Result<bool> {
    let themes = queries.active_themes()?;
    let Some(newest) = themes.iter().map(|t| t.created_at).max() else {
        debug!("no active themes");
        return Ok(true);
    };
    if now - newest > Duration::days(settings.theme_refresh_days) {
        debug!(newest = %newest, "themes are stale");
        return Ok(true);
    }
    let liked = queries.interactions_by_action(InteractionAction::Interested, Some(newest), None)?;
    Ok(liked.len() >= settings.theme_refresh_papers)
}

/// Ask the LLM for fresh themes and replace the active set.
///
/// Returns the new themes. With no interested papers in the window the
/// current themes are left untouched and an empty list is returned.
pub async fn regenerate_themes(
    store: &SqliteStore,
    llm: &dyn LlmClient,
    settings: &RecommendationSettings,
    now: DateTime<Utc>,
) -> Result<Vec<InterestTheme>> {
    let since = now - Duration::days(settings.theme_refresh_days);
    let liked = store.interactions_by_action(InteractionAction::Interested, Some(since), Some(now))?;
    if liked.is_empty() {
        info!(days = settings.theme_refresh_days, "no interested papers in window, keeping themes");
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = liked.iter().map(|i| i.paper_id).collect();
    let papers = store.papers_by_ids(&ids)?;
    let mut prompt = format!(
        "Extract at most {} research themes from these papers the user liked:\n\n",
        settings.max_themes
    );
    for paper in papers.iter().take(MAX_THEME_PAPERS) {
        prompt.push_str(&format!("- {}", paper.title));
        if let Some(text) = paper.preferred_text() {
            let short: String = text.chars().take(MAX_ABSTRACT_CHARS).collect();
            prompt.push_str(&format!(": {short}"));
        }
        prompt.push('\n');
    }

    let reply = llm
        .complete(SYSTEM_PROMPT, &prompt)
        .await
        .context("theme extraction request failed")?;
    let themes = parse_themes(&reply, settings.max_themes)?;
    if themes.is_empty() {
        anyhow::bail!("LLM returned no usable themes");
    }

    let source_ids: Vec<i64> = papers.iter().map(|p| p.id).collect();
    let rows: Vec<(String, Vec<i64>)> = themes
        .into_iter()
        .map(|theme| (theme, source_ids.clone()))
        .collect();
    let saved = store.replace_themes(&rows, now)?;
    info!(themes = saved.len(), papers = source_ids.len(), "interest themes regenerated");
    Ok(saved)
}

/// Trimmed, case-insensitively unique themes, capped at `max`.
fn parse_themes(reply: &str, max: usize) -> Result<Vec<String>> {
    let raw: Vec<String> = serde_json::from_str(extract_json_array(reply))
        .context("theme reply is not a JSON string array")?;
    let mut seen = std::collections::HashSet::new();
    Ok(raw
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .take(max)
        .collect())
}
