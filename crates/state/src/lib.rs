//! Storage for the dailypaper pipeline.
//!
//! This crate provides:
//! - The entities the recommendation core reads (papers, interactions,
//!   the single user profile, LLM-derived interest themes).
//! - A read-only query capability (`PaperQueries`) handed to strategies and
//!   a separate write capability (`RecommendationRecorder`) used only when
//!   recording recommendations.
//! - A SQLite implementation of both (`SqliteStore`).
//! - Environment helpers for locating the data directory and database.

pub mod env;
pub mod models;
pub mod sqlite;
pub mod store;

pub use env::{data_dir, database_path, home_dir};
pub use models::{
    InteractionAction, InterestTheme, NewPaper, Paper, PaperInteraction, PaperSummary,
    UserProfile, SUMMARY_CONTENT, SUMMARY_TLDR,
};
pub use sqlite::SqliteStore;
pub use store::{PaperQueries, RecommendationRecorder, StateError, StateResult};
