//! Storage capabilities consumed by the recommendation core.
//!
//! Reads and writes are split into two traits so strategies can be handed a
//! query-only handle while the manager alone holds the recorder.

use crate::models::{InteractionAction, InterestTheme, Paper, PaperInteraction, UserProfile};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

#[derive(thiserror::Error, Debug)]
pub enum StateError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("paper not found: {0}")]
    PaperNotFound(i64),
    #[error("invalid stored value in {column}: {value}")]
    InvalidValue { column: &'static str, value: String },
}

pub type StateResult<T> = Result<T, StateError>;

/// Read-only queries over papers, interactions, profile and themes.
pub trait PaperQueries: Send + Sync {
    /// Papers without an `interested` / `not_interested` interaction.
    fn unread_papers(&self) -> StateResult<Vec<Paper>>;

    /// Papers with the given ids, in ascending id order. Unknown ids are ignored.
    fn papers_by_ids(&self, ids: &[i64]) -> StateResult<Vec<Paper>>;

    /// Papers published strictly before `cutoff`.
    fn papers_published_before(&self, cutoff: DateTime<Utc>) -> StateResult<Vec<Paper>>;

    /// Ids of papers the user has read.
    ///
    /// With `as_of`, only actions taken before that instant count.
    fn read_paper_ids(&self, as_of: Option<DateTime<Utc>>) -> StateResult<HashSet<i64>>;

    /// Interactions with `action`, optionally bounded to `[since, until)` on `action_at`.
    fn interactions_by_action(
        &self,
        action: InteractionAction,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> StateResult<Vec<PaperInteraction>>;

    /// Every interaction the user acted on at or after `since`.
    fn interactions_acted_since(&self, since: DateTime<Utc>) -> StateResult<Vec<PaperInteraction>>;

    /// The interaction row for a paper, if any.
    fn interaction_for_paper(&self, paper_id: i64) -> StateResult<Option<PaperInteraction>>;

    /// Recommendation counts for the given papers. Papers without an
    /// interaction row are absent from the map.
    fn recommendation_counts(&self, paper_ids: &[i64]) -> StateResult<HashMap<i64, u32>>;

    /// Themes currently flagged active, newest first.
    fn active_themes(&self) -> StateResult<Vec<InterestTheme>>;

    /// The single user profile, if one has been saved.
    fn user_profile(&self) -> StateResult<Option<UserProfile>>;
}

/// Write side used when recommendations are surfaced to the user.
pub trait RecommendationRecorder: Send + Sync {
    /// Increment `recommendation_count` and set `last_recommended_at = at` for
    /// every paper, creating `no_action` interactions where none exist.
    ///
    /// The whole batch is applied in one transaction: either every paper is
    /// updated or none is.
    fn record_recommendations(&self, paper_ids: &[i64], at: DateTime<Utc>) -> StateResult<()>;
}
