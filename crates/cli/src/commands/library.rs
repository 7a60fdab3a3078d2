//! CLI handlers for `import` and `mark`.

use super::emit;
use crate::app::Services;
use crate::cli::OutputFormat;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use dailypaper_state::{InteractionAction, NewPaper};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ImportSummary {
    imported: usize,
    paper_ids: Vec<i64>,
    total_papers: usize,
}

/// Handle the `import` command.
pub(crate) fn handle_import_command(
    services: &Services,
    file: &Path,
    format: OutputFormat,
) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let papers: Vec<NewPaper> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of papers", file.display()))?;

    for (idx, paper) in papers.iter().enumerate() {
        if paper.source.trim().is_empty()
            || paper.source_id.trim().is_empty()
            || paper.title.trim().is_empty()
        {
            bail!("paper #{idx} is missing source, source_id or title");
        }
    }

    let paper_ids = papers
        .iter()
        .map(|paper| services.store.insert_paper(paper))
        .collect::<Result<Vec<i64>, _>>()?;
    let summary = ImportSummary {
        imported: paper_ids.len(),
        paper_ids,
        total_papers: services.store.paper_count()?,
    };
    tracing::info!(imported = summary.imported, file = %file.display(), "papers imported");

    emit(format, &summary, |s| {
        println!("Imported {} papers ({} in library)", s.imported, s.total_papers);
    })
}

/// Handle the `mark` command.
pub(crate) fn handle_mark_command(
    services: &Services,
    paper_id: i64,
    action: InteractionAction,
    notes: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let interaction = services
        .store
        .set_interaction(paper_id, action, notes.as_deref(), Utc::now())?;

    emit(format, &interaction, |i| {
        println!("Paper {} marked {}", i.paper_id, i.action);
        if let Some(ref notes) = i.notes {
            println!("Notes: {notes}");
        }
    })
}
