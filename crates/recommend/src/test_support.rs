//! Test utilities for the recommend crate.

use crate::embedding::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use crate::llm::{LlmClient, LlmError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dailypaper_state::{
    InteractionAction, NewPaper, Paper, PaperQueries, RecommendationRecorder, SqliteStore,
    UserProfile,
};
use std::sync::{Arc, Mutex};

const DIM: usize = 256;

/// Bag-of-words embedder: each distinct lower-cased word gets its own axis.
///
/// Deterministic and collision-free for up to `DIM` words, so cosine
/// similarity equals word overlap.
pub(crate) struct FakeEmbedder {
    vocab: Mutex<Vec<String>>,
    fail: bool,
    drop_last: bool,
    calls: Mutex<usize>,
}

impl FakeEmbedder {
    pub(crate) fn new() -> Self {
        Self {
            vocab: Mutex::new(Vec::new()),
            fail: false,
            drop_last: false,
            calls: Mutex::new(0),
        }
    }

    /// Loses the last vector of every multi-text batch.
    pub(crate) fn dropping_last() -> Self {
        Self {
            drop_last: true,
            ..Self::new()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vocab = self.vocab.lock().unwrap();
        let mut v = vec![0.0f32; DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
        {
            let idx = match vocab.iter().position(|w| *w == word) {
                Some(idx) => idx,
                None => {
                    vocab.push(word);
                    vocab.len() - 1
                }
            };
            if idx < DIM {
                v[idx] = 1.0;
            }
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(EmbeddingError::InvalidResponse("embedder offline".into()));
        }
        let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| self.vector(t)).collect();
        if self.drop_last && vectors.len() > 1 {
            vectors.pop();
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        "fake-bow"
    }
}

/// Scripted LLM that records every user prompt.
pub(crate) struct FakeLlm {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub(crate) fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(user.to_string());
        self.reply.clone().ok_or(LlmError::EmptyResponse)
    }
}

/// Midnight UTC of a `YYYY-MM-DD` date.
pub(crate) fn utc_date(date: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// In-memory store plus fake embedder with terse seeding helpers.
pub(crate) struct Fixture {
    pub(crate) store: Arc<SqliteStore>,
    pub(crate) embedder: Arc<FakeEmbedder>,
    next_source_id: Mutex<u32>,
}

pub(crate) fn fixture() -> Fixture {
    Fixture {
        store: Arc::new(SqliteStore::open_in_memory().unwrap()),
        embedder: Arc::new(FakeEmbedder::new()),
        next_source_id: Mutex::new(0),
    }
}

impl Fixture {
    pub(crate) fn queries(&self) -> Arc<dyn PaperQueries> {
        self.store.clone()
    }

    pub(crate) fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        self.embedder.clone()
    }

    /// Paper whose title and abstract are both `text`, published 2024-01-01.
    pub(crate) fn paper(&self, text: &str) -> i64 {
        self.paper_published(text, "2024-01-01")
    }

    pub(crate) fn paper_published(&self, text: &str, published: &str) -> i64 {
        self.insert(text, text, Some(utc_date(published)))
    }

    pub(crate) fn paper_titled(&self, title: &str, abstract_text: &str) -> i64 {
        self.insert(title, abstract_text, Some(utc_date("2024-01-01")))
    }

    fn insert(&self, title: &str, abstract_text: &str, published: Option<DateTime<Utc>>) -> i64 {
        let source_id = {
            let mut next = self.next_source_id.lock().unwrap();
            *next += 1;
            format!("2401.{:05}", *next)
        };
        self.store
            .insert_paper(&NewPaper {
                source: "arxiv".into(),
                source_id,
                title: title.into(),
                authors: vec!["A. Author".into()],
                abstract_text: Some(abstract_text.into()),
                published_at: published,
                url: None,
                summaries: vec![],
            })
            .unwrap()
    }

    pub(crate) fn mark(&self, paper_id: i64, action: InteractionAction, date: &str) {
        self.store
            .set_interaction(paper_id, action, None, utc_date(date))
            .unwrap();
    }

    pub(crate) fn note(&self, paper_id: i64, notes: &str, date: &str) {
        self.store
            .set_interaction(paper_id, InteractionAction::NoAction, Some(notes), utc_date(date))
            .unwrap();
    }

    pub(crate) fn profile(
        &self,
        interested: Option<&str>,
        disinterested: Option<&str>,
        description: Option<&str>,
    ) {
        self.store
            .save_user_profile(&UserProfile {
                interested_keywords: interested.map(str::to_string),
                disinterested_keywords: disinterested.map(str::to_string),
                interest_description: description.map(str::to_string),
            })
            .unwrap();
    }

    pub(crate) fn themes(&self, themes: &[&str]) {
        let themes: Vec<(String, Vec<i64>)> =
            themes.iter().map(|t| (t.to_string(), Vec::new())).collect();
        self.store.replace_themes(&themes, Utc::now()).unwrap();
    }

    pub(crate) fn recommend_times(&self, paper_id: i64, times: u32) {
        for _ in 0..times {
            self.store
                .record_recommendations(&[paper_id], Utc::now())
                .unwrap();
        }
    }

    pub(crate) fn papers(&self, ids: &[i64]) -> Vec<Paper> {
        self.store.papers_by_ids(ids).unwrap()
    }

    pub(crate) fn all_papers(&self) -> Vec<Paper> {
        let count = *self.next_source_id.lock().unwrap();
        let ids: Vec<i64> = (1..=i64::from(count)).collect();
        self.papers(&ids)
    }
}
