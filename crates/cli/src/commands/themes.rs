//! CLI handler for the `themes` command.

use super::emit;
use crate::app::Services;
use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use chrono::Utc;
use dailypaper_recommend::{needs_refresh, regenerate_themes};
use dailypaper_state::PaperQueries;

/// Handle the `themes` command.
pub(crate) async fn handle_themes_command(
    services: &Services,
    refresh: bool,
    force: bool,
    format: OutputFormat,
) -> Result<()> {
    let settings = &services.recommendation;
    if refresh {
        let now = Utc::now();
        if force || needs_refresh(services.store.as_ref(), settings, now)? {
            let llm = services
                .llm()?
                .context("theme refresh needs an LLM: set DAILYPAPER_LLM_API_KEY or [llm] api_key")?;
            regenerate_themes(&services.store, llm.as_ref(), settings, now).await?;
        } else {
            tracing::info!("themes are fresh, skipping regeneration");
        }
    }

    let themes = services.store.active_themes()?;
    emit(format, &themes, |themes| {
        if themes.is_empty() {
            println!("No active interest themes.");
            return;
        }
        println!("Active interest themes:");
        for theme in themes {
            println!(
                "  - {} (from {} papers, {})",
                theme.theme,
                theme.source_paper_ids.len(),
                theme.created_at.format("%Y-%m-%d")
            );
        }
    })
}
