//! Entities read by the recommendation core.
//!
//! Papers and interactions are created and updated elsewhere (downloaders,
//! user action commands). The recommendation core only reads them, and writes
//! back `recommendation_count` / `last_recommended_at` when recording.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Summary kind holding a one-paragraph TL;DR.
pub const SUMMARY_TLDR: &str = "tldr";
/// Summary kind holding a longer content summary.
pub const SUMMARY_CONTENT: &str = "content_summary";

/// An LLM-generated summary attached to a paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperSummary {
    /// Summary type (e.g. `tldr`, `content_summary`, `methods`).
    pub kind: String,
    /// Summary text.
    pub content: String,
}

/// A research paper as seen by the recommendation core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Storage primary key.
    pub id: i64,
    /// Where the paper came from (`arxiv`, `huggingface`, ...).
    pub source: String,
    /// Source-local identifier (e.g. the arXiv id). Unique per source.
    pub source_id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub summaries: Vec<PaperSummary>,
    pub created_at: DateTime<Utc>,
}

impl Paper {
    /// Returns the abstract when it has any non-whitespace content.
    pub fn abstract_content(&self) -> Option<&str> {
        self.abstract_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    /// Returns the first TL;DR or content summary, if any.
    pub fn preferred_summary(&self) -> Option<&str> {
        self.summaries
            .iter()
            .find(|s| {
                (s.kind == SUMMARY_TLDR || s.kind == SUMMARY_CONTENT) && !s.content.trim().is_empty()
            })
            .map(|s| s.content.as_str())
    }

    /// Text representation preferring summaries over the raw abstract.
    ///
    /// `None` means the paper has no usable text and must be skipped by
    /// similarity-based strategies.
    pub fn preferred_text(&self) -> Option<&str> {
        self.preferred_summary().or_else(|| self.abstract_content())
    }

    /// Text representation preferring the abstract, falling back to summaries.
    pub fn embedding_text(&self) -> Option<&str> {
        self.abstract_content().or_else(|| self.preferred_summary())
    }
}

/// Fields required to insert a paper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPaper {
    pub source: String,
    pub source_id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub summaries: Vec<PaperSummary>,
}

/// What the user did with a paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionAction {
    Interested,
    NotInterested,
    NoAction,
}

impl InteractionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interested => "interested",
            Self::NotInterested => "not_interested",
            Self::NoAction => "no_action",
        }
    }

    /// Interested and not-interested papers count as "read".
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Interested | Self::NotInterested)
    }
}

impl fmt::Display for InteractionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interested" => Ok(Self::Interested),
            "not_interested" | "not-interested" => Ok(Self::NotInterested),
            "no_action" | "no-action" | "none" => Ok(Self::NoAction),
            other => Err(format!("unknown interaction action: {other}")),
        }
    }
}

/// Per-paper user signal. At most one per paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperInteraction {
    pub paper_id: i64,
    pub action: InteractionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Incremented every time the paper is surfaced in a recorded recommendation.
    pub recommendation_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_recommended_at: Option<DateTime<Utc>>,
    /// When the user last set the action or notes. `None` for rows that only
    /// exist because the paper was recommended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaperInteraction {
    /// True when the user left non-blank notes.
    pub fn has_notes(&self) -> bool {
        self.notes
            .as_deref()
            .is_some_and(|notes| !notes.trim().is_empty())
    }

    /// Interested or annotated papers are positive signals.
    pub fn is_positive(&self) -> bool {
        self.action == InteractionAction::Interested || self.has_notes()
    }
}

/// The single user profile row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub interested_keywords: Option<String>,
    #[serde(default)]
    pub disinterested_keywords: Option<String>,
    #[serde(default)]
    pub interest_description: Option<String>,
}

/// LLM-derived short interest theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestTheme {
    pub id: i64,
    pub theme: String,
    /// Papers the theme was derived from.
    pub source_paper_ids: Vec<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(abstract_text: Option<&str>, summaries: Vec<PaperSummary>) -> Paper {
        Paper {
            id: 1,
            source: "arxiv".into(),
            source_id: "2401.00001".into(),
            title: "Title".into(),
            authors: vec![],
            abstract_text: abstract_text.map(str::to_string),
            published_at: None,
            url: None,
            summaries,
            created_at: Utc::now(),
        }
    }

    fn summary(kind: &str, content: &str) -> PaperSummary {
        PaperSummary {
            kind: kind.into(),
            content: content.into(),
        }
    }

    #[test]
    fn preferred_text_uses_tldr_before_abstract() {
        let p = paper(
            Some("the abstract"),
            vec![summary("methods", "m"), summary(SUMMARY_TLDR, "short")],
        );
        assert_eq!(p.preferred_text(), Some("short"));
        assert_eq!(p.embedding_text(), Some("the abstract"));
    }

    #[test]
    fn blank_text_is_treated_as_missing() {
        let p = paper(Some("   "), vec![summary(SUMMARY_CONTENT, " ")]);
        assert_eq!(p.preferred_text(), None);
        assert_eq!(p.embedding_text(), None);
    }

    #[test]
    fn embedding_text_falls_back_to_summary() {
        let p = paper(None, vec![summary(SUMMARY_CONTENT, "long summary")]);
        assert_eq!(p.embedding_text(), Some("long summary"));
    }

    #[test]
    fn action_parsing_accepts_both_separators() {
        assert_eq!(
            "not-interested".parse::<InteractionAction>().unwrap(),
            InteractionAction::NotInterested
        );
        assert_eq!(
            "Interested".parse::<InteractionAction>().unwrap(),
            InteractionAction::Interested
        );
        assert!("maybe".parse::<InteractionAction>().is_err());
    }

    #[test]
    fn positive_signal_includes_notes() {
        let now = Utc::now();
        let mut interaction = PaperInteraction {
            paper_id: 1,
            action: InteractionAction::NoAction,
            notes: Some("  ".into()),
            recommendation_count: 0,
            last_recommended_at: None,
            action_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        assert!(!interaction.is_positive());
        interaction.notes = Some("worth a re-read".into());
        assert!(interaction.is_positive());
    }
}
