//! Configuration file support for dailypaper.
//!
//! Loads settings from `~/.dailypaper/config.toml` with the following
//! precedence: CLI arguments > environment variables > config file.
//!
//! ## Configuration File Format
//!
//! ```toml
//! # ~/.dailypaper/config.toml
//!
//! [recommendation]
//! enabled_strategies = ["keyword_semantic", "interested_semantic", "repetition_filter"]
//! top_k = 10
//! rrf_k = 60.0
//! min_similarity = 0.5
//!
//! [recommendation.strategy_weights]
//! keyword_semantic = 1.5
//!
//! [optimizer]
//! split_date = "2024-06-01"
//! metric = "mrr"
//!
//! [embedding]
//! url = "http://localhost:11434/api/embed"
//! model = "qwen3-embedding:0.6b"
//!
//! [llm]
//! api_key = "sk-..."
//! model = "gpt-4"
//!
//! [database]
//! path = "/data/papers.db"
//! ```

use anyhow::{Context, Result};
use dailypaper_recommend::{OptimizerSettings, RecommendationSettings};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub recommendation: RecommendationSettings,
    #[serde(default)]
    pub optimizer: OptimizerSettings,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Embedding service settings, exported as `DAILYPAPER_EMBEDDING_*`.
#[derive(Debug, Default, Deserialize)]
pub struct EmbeddingConfig {
    pub url: Option<String>,
    pub model: Option<String>,
    pub batch_size: Option<usize>,
    pub timeout_ms: Option<u64>,
}

/// Chat completion settings, exported as `DAILYPAPER_LLM_*`.
#[derive(Debug, Default, Deserialize)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DatabaseConfig {
    /// Exported as `DAILYPAPER_DB`.
    pub path: Option<String>,
}

/// Returns the path to the config file (`~/.dailypaper/config.toml`).
pub fn config_path() -> Result<PathBuf> {
    Ok(dailypaper_state::data_dir()?.join("config.toml"))
}

/// Loads the configuration file if it exists.
///
/// Returns `Ok(None)` if the file doesn't exist and `Err` if it exists but
/// fails to parse.
pub fn load_config() -> Result<Option<Config>> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

    tracing::debug!(
        target: "dailypaper::config",
        path = %path.display(),
        "Loaded configuration file"
    );
    Ok(Some(config))
}

/// Applies collaborator settings from the file to environment variables.
///
/// Only sets variables that are not already set, preserving the precedence
/// CLI > ENV > config file.
pub fn apply_config_to_env(config: &Config) {
    fn set_if_absent(key: &str, value: &str) {
        if std::env::var(key).is_err() {
            std::env::set_var(key, value);
            tracing::trace!(
                target: "dailypaper::config",
                key,
                "Set environment variable from config file"
            );
        }
    }

    let embedding = &config.embedding;
    if let Some(ref url) = embedding.url {
        set_if_absent("DAILYPAPER_EMBEDDING_URL", url);
    }
    if let Some(ref model) = embedding.model {
        set_if_absent("DAILYPAPER_EMBEDDING_MODEL", model);
    }
    if let Some(size) = embedding.batch_size {
        set_if_absent("DAILYPAPER_EMBEDDING_BATCH_SIZE", &size.to_string());
    }
    if let Some(ms) = embedding.timeout_ms {
        set_if_absent("DAILYPAPER_EMBEDDING_TIMEOUT_MS", &ms.to_string());
    }

    let llm = &config.llm;
    if let Some(ref key) = llm.api_key {
        set_if_absent("DAILYPAPER_LLM_API_KEY", key);
    }
    if let Some(ref base) = llm.base_url {
        set_if_absent("DAILYPAPER_LLM_BASE_URL", base);
    }
    if let Some(ref model) = llm.model {
        set_if_absent("DAILYPAPER_LLM_MODEL", model);
    }
    if let Some(ms) = llm.timeout_ms {
        set_if_absent("DAILYPAPER_LLM_TIMEOUT_MS", &ms.to_string());
    }

    if let Some(ref path) = config.database.path {
        set_if_absent("DAILYPAPER_DB", path);
    }
}

/// Effective settings: file values overridden by `DAILYPAPER_*` variables.
pub fn resolve_settings(config: Option<Config>) -> (RecommendationSettings, OptimizerSettings) {
    let config = config.unwrap_or_default();
    let mut recommendation = config.recommendation;
    recommendation.apply_env_overrides();
    let mut optimizer = config.optimizer;
    optimizer.apply_env_overrides();
    (recommendation, optimizer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dailypaper_recommend::OptimizerMetric;
    use dailypaper_test_utils::{env_guard, set_env_var, TestFixture};

    #[test]
    fn parse_minimal_config() {
        let config: Config = toml::from_str("[recommendation]\n").unwrap();
        assert_eq!(config.recommendation, RecommendationSettings::default());
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [recommendation]
            enabled_strategies = ["keyword_semantic", "repetition_filter"]
            top_k = 5
            rrf_k = 30.0
            downweight_factor = 0.25

            [recommendation.strategy_weights]
            keyword_semantic = 1.5

            [optimizer]
            split_date = "2024-06-01"
            metric = "hit_rate"
            max_iterations = 3

            [optimizer.weight_ranges]
            keyword_semantic = [0.5, 1.0]

            [embedding]
            url = "http://embed.local/api/embed"
            batch_size = 8

            [llm]
            api_key = "secret"

            [database]
            path = "/data/papers.db"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.recommendation.top_k, 5);
        assert_eq!(config.recommendation.rrf_k, 30.0);
        assert_eq!(config.recommendation.downweight_factor, 0.25);
        assert_eq!(config.recommendation.min_similarity, 0.5, "unset fields default");
        assert_eq!(config.recommendation.strategy_weights["keyword_semantic"], 1.5);
        assert_eq!(config.optimizer.metric, OptimizerMetric::HitRate);
        assert_eq!(config.optimizer.weight_ranges["keyword_semantic"], vec![0.5, 1.0]);
        assert_eq!(config.embedding.batch_size, Some(8));
        assert_eq!(config.llm.api_key.as_deref(), Some("secret"));
        assert_eq!(config.database.path.as_deref(), Some("/data/papers.db"));
    }

    #[test]
    fn load_nonexistent_config_returns_none() {
        let fixture = TestFixture::new().unwrap();
        assert!(load_config_from(&fixture.config_path()).unwrap().is_none());
    }

    #[test]
    fn invalid_config_is_an_error() {
        let fixture = TestFixture::new().unwrap();
        let path = fixture.write_config("[recommendation]\ntop_k = \"many\"\n").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
    }

    #[test]
    fn env_wins_over_file() {
        let _g = env_guard();
        let _top = set_env_var("DAILYPAPER_TOP_K", Some("3"));
        let _url = set_env_var("DAILYPAPER_EMBEDDING_URL", Some("http://from-env/api/embed"));
        let _model = set_env_var("DAILYPAPER_EMBEDDING_MODEL", None);
        let _split = set_env_var("DAILYPAPER_SPLIT_DATE", None);

        let config: Config = toml::from_str(
            r#"
            [recommendation]
            top_k = 20
            [optimizer]
            split_date = "2024-01-01"
            [embedding]
            url = "http://from-file/api/embed"
            model = "file-model"
            "#,
        )
        .unwrap();
        apply_config_to_env(&config);
        assert_eq!(
            std::env::var("DAILYPAPER_EMBEDDING_URL").unwrap(),
            "http://from-env/api/embed"
        );
        assert_eq!(std::env::var("DAILYPAPER_EMBEDDING_MODEL").unwrap(), "file-model");

        let (recommendation, optimizer) = resolve_settings(Some(config));
        assert_eq!(recommendation.top_k, 3);
        assert_eq!(optimizer.split_date.as_deref(), Some("2024-01-01"));
    }
}
