//! SQLite implementation of the storage capabilities.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so range filters can compare them as text.
//! Authors and theme provenance are stored as JSON arrays.

use crate::models::{
    InteractionAction, InterestTheme, NewPaper, Paper, PaperInteraction, PaperSummary,
    UserProfile,
};
use crate::store::{PaperQueries, RecommendationRecorder, StateError, StateResult};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS papers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    source_id TEXT NOT NULL,
    title TEXT NOT NULL,
    authors TEXT NOT NULL DEFAULT '[]',
    abstract TEXT,
    published_at TEXT,
    url TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (source, source_id)
);
CREATE INDEX IF NOT EXISTS idx_papers_published_at ON papers (published_at);

CREATE TABLE IF NOT EXISTS paper_summaries (
    paper_id INTEGER NOT NULL REFERENCES papers (id) ON DELETE CASCADE,
    summary_type TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (paper_id, summary_type)
);

CREATE TABLE IF NOT EXISTS paper_interactions (
    paper_id INTEGER PRIMARY KEY REFERENCES papers (id) ON DELETE CASCADE,
    action TEXT NOT NULL DEFAULT 'no_action',
    notes TEXT,
    recommendation_count INTEGER NOT NULL DEFAULT 0,
    last_recommended_at TEXT,
    action_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_interactions_action ON paper_interactions (action);

CREATE TABLE IF NOT EXISTS user_profile (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    interested_keywords TEXT,
    disinterested_keywords TEXT,
    interest_description TEXT,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS interest_themes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    theme TEXT NOT NULL,
    source_papers TEXT NOT NULL DEFAULT '[]',
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_themes_active ON interest_themes (is_active);
"#;

const PAPER_COLUMNS: &str =
    "p.id, p.source, p.source_id, p.title, p.authors, p.abstract, p.published_at, p.url, p.created_at";

const INTERACTION_COLUMNS: &str = "paper_id, action, notes, recommendation_count, \
     last_recommended_at, created_at, updated_at, action_at";

/// SQLite stays well below its bound-parameter limit with this chunk size.
const ID_CHUNK: usize = 500;

/// SQLite-backed store for papers, interactions, profile and themes.
///
/// A single connection is shared behind a mutex; every public method holds
/// the lock for the duration of one statement or one transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (and create if needed) a database file.
    pub fn open(path: impl AsRef<Path>) -> StateResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened paper database");
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StateResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StateResult<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        migrate_action_at(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a paper, or refresh its metadata if `(source, source_id)` exists.
    ///
    /// Returns the storage id. Summaries on `paper` are upserted by kind.
    pub fn insert_paper(&self, paper: &NewPaper) -> StateResult<i64> {
        let now = format_ts(&Utc::now());
        let authors = serde_json::to_string(&paper.authors)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let id: i64 = tx.query_row(
            "INSERT INTO papers (source, source_id, title, authors, abstract, published_at, url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (source, source_id) DO UPDATE SET
                title = excluded.title,
                authors = excluded.authors,
                abstract = COALESCE(excluded.abstract, papers.abstract),
                published_at = COALESCE(excluded.published_at, papers.published_at),
                url = COALESCE(excluded.url, papers.url)
             RETURNING id",
            params![
                paper.source,
                paper.source_id,
                paper.title,
                authors,
                paper.abstract_text,
                paper.published_at.as_ref().map(format_ts),
                paper.url,
                now,
            ],
            |row| row.get(0),
        )?;
        for summary in &paper.summaries {
            upsert_summary(&tx, id, &summary.kind, &summary.content, &now)?;
        }
        tx.commit()?;
        Ok(id)
    }

    /// Attach (or replace) a summary of the given kind.
    pub fn add_summary(&self, paper_id: i64, kind: &str, content: &str) -> StateResult<()> {
        let conn = self.conn.lock();
        ensure_paper_exists(&conn, paper_id)?;
        upsert_summary(&conn, paper_id, kind, content, &format_ts(&Utc::now()))
    }

    /// Set the user's action (and optionally notes) on a paper.
    ///
    /// `at` becomes `created_at` for a new interaction and `updated_at` in
    /// all cases. `action_at` moves to `at` only when the action or notes
    /// change (or were never set). Existing notes are kept when `notes` is
    /// `None`.
    pub fn set_interaction(
        &self,
        paper_id: i64,
        action: InteractionAction,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> StateResult<PaperInteraction> {
        let conn = self.conn.lock();
        ensure_paper_exists(&conn, paper_id)?;
        let at = format_ts(&at);
        conn.execute(
            "INSERT INTO paper_interactions
                (paper_id, action, notes, recommendation_count, action_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4, ?4)
             ON CONFLICT (paper_id) DO UPDATE SET
                action = excluded.action,
                notes = COALESCE(excluded.notes, paper_interactions.notes),
                action_at = CASE
                    WHEN paper_interactions.action_at IS NULL
                      OR paper_interactions.action IS NOT excluded.action
                      OR (excluded.notes IS NOT NULL AND excluded.notes IS NOT paper_interactions.notes)
                    THEN excluded.action_at
                    ELSE paper_interactions.action_at
                END,
                updated_at = excluded.updated_at",
            params![paper_id, action.as_str(), notes, at],
        )?;
        query_interaction(&conn, paper_id)?.ok_or(StateError::PaperNotFound(paper_id))
    }

    /// Replace the singleton user profile.
    pub fn save_user_profile(&self, profile: &UserProfile) -> StateResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO user_profile (id, interested_keywords, disinterested_keywords, interest_description, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT (id) DO UPDATE SET
                interested_keywords = excluded.interested_keywords,
                disinterested_keywords = excluded.disinterested_keywords,
                interest_description = excluded.interest_description,
                updated_at = excluded.updated_at",
            params![
                profile.interested_keywords,
                profile.disinterested_keywords,
                profile.interest_description,
                format_ts(&Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Deactivate every active theme and insert `themes` as the new active set.
    pub fn replace_themes(
        &self,
        themes: &[(String, Vec<i64>)],
        at: DateTime<Utc>,
    ) -> StateResult<Vec<InterestTheme>> {
        let at_text = format_ts(&at);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE interest_themes SET is_active = 0 WHERE is_active = 1",
            [],
        )?;
        let mut inserted = Vec::with_capacity(themes.len());
        for (theme, sources) in themes {
            tx.execute(
                "INSERT INTO interest_themes (theme, source_papers, is_active, created_at)
                 VALUES (?1, ?2, 1, ?3)",
                params![theme, serde_json::to_string(sources)?, at_text],
            )?;
            inserted.push(InterestTheme {
                id: tx.last_insert_rowid(),
                theme: theme.clone(),
                source_paper_ids: sources.clone(),
                is_active: true,
                created_at: at,
            });
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Total number of stored papers.
    pub fn paper_count(&self) -> StateResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM papers", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    fn query_papers(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StateResult<Vec<Paper>> {
        let mut stmt = conn.prepare(sql)?;
        let mut papers = stmt
            .query_map(params, paper_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        attach_summaries(conn, &mut papers)?;
        Ok(papers)
    }
}

impl PaperQueries for SqliteStore {
    fn unread_papers(&self) -> StateResult<Vec<Paper>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {PAPER_COLUMNS} FROM papers p
             WHERE NOT EXISTS (
                SELECT 1 FROM paper_interactions i
                WHERE i.paper_id = p.id AND i.action IN ('interested', 'not_interested')
             )
             ORDER BY p.id"
        );
        Self::query_papers(&conn, &sql, [])
    }

    fn papers_by_ids(&self, ids: &[i64]) -> StateResult<Vec<Paper>> {
        let conn = self.conn.lock();
        let mut papers = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!(
                "SELECT {PAPER_COLUMNS} FROM papers p WHERE p.id IN ({})",
                placeholders(chunk.len())
            );
            papers.extend(Self::query_papers(&conn, &sql, params_from_iter(chunk))?);
        }
        papers.sort_by_key(|p| p.id);
        papers.dedup_by_key(|p| p.id);
        Ok(papers)
    }

    fn papers_published_before(&self, cutoff: DateTime<Utc>) -> StateResult<Vec<Paper>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {PAPER_COLUMNS} FROM papers p
             WHERE p.published_at IS NOT NULL AND p.published_at < ?1
             ORDER BY p.id"
        );
        Self::query_papers(&conn, &sql, params![format_ts(&cutoff)])
    }

    fn read_paper_ids(&self, as_of: Option<DateTime<Utc>>) -> StateResult<HashSet<i64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT paper_id FROM paper_interactions
             WHERE action IN ('interested', 'not_interested')
               AND (?1 IS NULL OR action_at < ?1)",
        )?;
        let ids = stmt
            .query_map(params![as_of.as_ref().map(format_ts)], |row| {
                row.get::<_, i64>(0)
            })?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
    }

    fn interactions_by_action(
        &self,
        action: InteractionAction,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> StateResult<Vec<PaperInteraction>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {INTERACTION_COLUMNS} FROM paper_interactions
             WHERE action = ?1
               AND (?2 IS NULL OR action_at >= ?2)
               AND (?3 IS NULL OR action_at < ?3)
             ORDER BY paper_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![
                    action.as_str(),
                    since.as_ref().map(format_ts),
                    until.as_ref().map(format_ts)
                ],
                interaction_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn interactions_acted_since(&self, since: DateTime<Utc>) -> StateResult<Vec<PaperInteraction>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {INTERACTION_COLUMNS} FROM paper_interactions
             WHERE action_at >= ?1
             ORDER BY paper_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![format_ts(&since)], interaction_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn interaction_for_paper(&self, paper_id: i64) -> StateResult<Option<PaperInteraction>> {
        let conn = self.conn.lock();
        query_interaction(&conn, paper_id)
    }

    fn recommendation_counts(&self, paper_ids: &[i64]) -> StateResult<HashMap<i64, u32>> {
        let conn = self.conn.lock();
        let mut counts = HashMap::with_capacity(paper_ids.len());
        for chunk in paper_ids.chunks(ID_CHUNK) {
            let sql = format!(
                "SELECT paper_id, recommendation_count FROM paper_interactions
                 WHERE paper_id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, u32>(1)?))
            })?;
            for row in rows {
                let (id, count) = row?;
                counts.insert(id, count);
            }
        }
        Ok(counts)
    }

    fn active_themes(&self) -> StateResult<Vec<InterestTheme>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, theme, source_papers, is_active, created_at FROM interest_themes
             WHERE is_active = 1
             ORDER BY created_at DESC, id DESC",
        )?;
        let themes = stmt
            .query_map([], |row| {
                let sources: String = row.get(2)?;
                Ok(InterestTheme {
                    id: row.get(0)?,
                    theme: row.get(1)?,
                    source_paper_ids: json_column(&sources, 2)?,
                    is_active: row.get(3)?,
                    created_at: ts_column(row, 4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(themes)
    }

    fn user_profile(&self) -> StateResult<Option<UserProfile>> {
        let conn = self.conn.lock();
        let profile = conn
            .query_row(
                "SELECT interested_keywords, disinterested_keywords, interest_description
                 FROM user_profile WHERE id = 1",
                [],
                |row| {
                    Ok(UserProfile {
                        interested_keywords: row.get(0)?,
                        disinterested_keywords: row.get(1)?,
                        interest_description: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }
}

impl RecommendationRecorder for SqliteStore {
    fn record_recommendations(&self, paper_ids: &[i64], at: DateTime<Utc>) -> StateResult<()> {
        let at = format_ts(&at);
        let mut conn = self.conn.lock();
        // Dropping the transaction without commit rolls back every update.
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO paper_interactions
                    (paper_id, action, recommendation_count, last_recommended_at, created_at, updated_at)
                 VALUES (?1, 'no_action', 1, ?2, ?2, ?2)
                 ON CONFLICT (paper_id) DO UPDATE SET
                    recommendation_count = paper_interactions.recommendation_count + 1,
                    last_recommended_at = excluded.last_recommended_at,
                    updated_at = excluded.updated_at",
            )?;
            for paper_id in paper_ids {
                stmt.execute(params![paper_id, at])?;
            }
        }
        tx.commit()?;
        debug!(count = paper_ids.len(), "recorded recommendations");
        Ok(())
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw, idx)
}

fn opt_ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| parse_ts(&value, idx)).transpose()
}

fn parse_ts(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_column<T: serde::de::DeserializeOwned>(raw: &str, idx: usize) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn paper_from_row(row: &Row<'_>) -> rusqlite::Result<Paper> {
    let authors: String = row.get(4)?;
    Ok(Paper {
        id: row.get(0)?,
        source: row.get(1)?,
        source_id: row.get(2)?,
        title: row.get(3)?,
        authors: json_column(&authors, 4)?,
        abstract_text: row.get(5)?,
        published_at: opt_ts_column(row, 6)?,
        url: row.get(7)?,
        summaries: Vec::new(),
        created_at: ts_column(row, 8)?,
    })
}

fn interaction_from_row(row: &Row<'_>) -> rusqlite::Result<PaperInteraction> {
    let action: String = row.get(1)?;
    let action = action.parse::<InteractionAction>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            Box::new(StateError::InvalidValue {
                column: "action",
                value: action.clone(),
            }),
        )
    })?;
    Ok(PaperInteraction {
        paper_id: row.get(0)?,
        action,
        notes: row.get(2)?,
        recommendation_count: row.get(3)?,
        last_recommended_at: opt_ts_column(row, 4)?,
        created_at: ts_column(row, 5)?,
        updated_at: ts_column(row, 6)?,
        action_at: opt_ts_column(row, 7)?,
    })
}

/// Databases created before `action_at` existed get the column added and
/// backfilled from `updated_at` for rows the user has acted on.
fn migrate_action_at(conn: &Connection) -> StateResult<()> {
    let has_column = conn
        .prepare("SELECT name FROM pragma_table_info('paper_interactions')")?
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?
        .iter()
        .any(|name| name == "action_at");
    if !has_column {
        conn.execute_batch(
            "ALTER TABLE paper_interactions ADD COLUMN action_at TEXT;
             UPDATE paper_interactions SET action_at = updated_at
             WHERE action != 'no_action' OR notes IS NOT NULL;",
        )?;
        debug!("added action_at to paper_interactions");
    }
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_interactions_action_at ON paper_interactions (action_at);",
    )?;
    Ok(())
}

fn query_interaction(conn: &Connection, paper_id: i64) -> StateResult<Option<PaperInteraction>> {
    let sql = format!("SELECT {INTERACTION_COLUMNS} FROM paper_interactions WHERE paper_id = ?1");
    let interaction = conn
        .query_row(&sql, params![paper_id], interaction_from_row)
        .optional()?;
    Ok(interaction)
}

fn ensure_paper_exists(conn: &Connection, paper_id: i64) -> StateResult<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM papers WHERE id = ?1)",
        params![paper_id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(StateError::PaperNotFound(paper_id))
    }
}

fn upsert_summary(
    conn: &Connection,
    paper_id: i64,
    kind: &str,
    content: &str,
    now: &str,
) -> StateResult<()> {
    conn.execute(
        "INSERT INTO paper_summaries (paper_id, summary_type, content, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (paper_id, summary_type) DO UPDATE SET
            content = excluded.content,
            created_at = excluded.created_at",
        params![paper_id, kind, content, now],
    )?;
    Ok(())
}

fn attach_summaries(conn: &Connection, papers: &mut [Paper]) -> StateResult<()> {
    if papers.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = papers.iter().map(|p| p.id).collect();
    let mut by_paper: HashMap<i64, Vec<PaperSummary>> = HashMap::new();
    for chunk in ids.chunks(ID_CHUNK) {
        let sql = format!(
            "SELECT paper_id, summary_type, content FROM paper_summaries
             WHERE paper_id IN ({})
             ORDER BY paper_id, summary_type",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                PaperSummary {
                    kind: row.get(1)?,
                    content: row.get(2)?,
                },
            ))
        })?;
        for row in rows {
            let (paper_id, summary) = row?;
            by_paper.entry(paper_id).or_default().push(summary);
        }
    }
    for paper in papers.iter_mut() {
        if let Some(summaries) = by_paper.remove(&paper.id) {
            paper.summaries = summaries;
        }
    }
    Ok(())
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
