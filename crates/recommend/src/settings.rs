//! Recommendation and optimizer settings.
//!
//! Values come from the `[recommendation]` and `[optimizer]` tables of
//! `~/.dailypaper/config.toml`; every field has a default. `DAILYPAPER_*`
//! environment variables override file values via `apply_env_overrides`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const KEYWORD_SEMANTIC: &str = "keyword_semantic";
pub const INTERESTED_SEMANTIC: &str = "interested_semantic";
pub const DISINTERESTED_SEMANTIC: &str = "disinterested_semantic";
pub const DISINTERESTED_FILTER: &str = "disinterested_filter";
pub const REPETITION_FILTER: &str = "repetition_filter";
pub const LLM_THEMES: &str = "llm_themes";

/// Tuning knobs for the manager and the built-in strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationSettings {
    /// Registry names run by the manager, in order.
    pub enabled_strategies: Vec<String>,
    pub top_k: usize,
    /// RRF smoothing constant.
    pub rrf_k: f64,
    /// Initial fusion weights. Missing strategies weigh 1.0.
    pub strategy_weights: BTreeMap<String, f64>,
    pub min_similarity: f64,
    pub interested_days: i64,
    /// Disinterested-semantic penalty threshold.
    pub similarity_threshold: f64,
    pub downweight_factor: f64,
    pub max_recommendations: u32,
    pub theme_refresh_days: i64,
    pub theme_refresh_papers: usize,
    pub max_themes: usize,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            enabled_strategies: vec![KEYWORD_SEMANTIC.into(), INTERESTED_SEMANTIC.into()],
            top_k: 10,
            rrf_k: 60.0,
            strategy_weights: BTreeMap::new(),
            min_similarity: 0.5,
            interested_days: 30,
            similarity_threshold: 0.3,
            downweight_factor: 0.5,
            max_recommendations: 3,
            theme_refresh_days: 30,
            theme_refresh_papers: 20,
            max_themes: 5,
        }
    }
}

impl RecommendationSettings {
    /// Apply `DAILYPAPER_STRATEGIES`, `DAILYPAPER_TOP_K`, `DAILYPAPER_RRF_K`,
    /// `DAILYPAPER_MIN_SIMILARITY` and `DAILYPAPER_INTERESTED_DAYS`.
    pub fn apply_env_overrides(&mut self) {
        if let Some(raw) = env_value("DAILYPAPER_STRATEGIES") {
            self.enabled_strategies = parse_name_list(&raw);
        }
        if let Some(v) = env_parse("DAILYPAPER_TOP_K") {
            self.top_k = v;
        }
        if let Some(v) = env_parse("DAILYPAPER_RRF_K") {
            self.rrf_k = v;
        }
        if let Some(v) = env_parse("DAILYPAPER_MIN_SIMILARITY") {
            self.min_similarity = v;
        }
        if let Some(v) = env_parse("DAILYPAPER_INTERESTED_DAYS") {
            self.interested_days = v;
        }
    }
}

/// Objective maximized by grid search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerMetric {
    #[default]
    Mrr,
    HitRate,
    /// Optimized as `1 / mean_rank` so larger is better.
    MeanRank,
}

/// Error returned when parsing an unknown metric name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMetricError(String);

impl fmt::Display for ParseMetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid metric '{}': expected 'mrr', 'hit_rate', or 'mean_rank'",
            self.0
        )
    }
}

impl std::error::Error for ParseMetricError {}

impl FromStr for OptimizerMetric {
    type Err = ParseMetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "mrr" => Ok(Self::Mrr),
            "hit_rate" => Ok(Self::HitRate),
            "mean_rank" => Ok(Self::MeanRank),
            _ => Err(ParseMetricError(s.to_string())),
        }
    }
}

impl fmt::Display for OptimizerMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mrr => "mrr",
            Self::HitRate => "hit_rate",
            Self::MeanRank => "mean_rank",
        })
    }
}

/// Settings for weight evaluation and coordinate-descent search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    /// `YYYY-MM-DD`; interactions on or after this date form the test set.
    pub split_date: Option<String>,
    pub metric: OptimizerMetric,
    pub max_iterations: usize,
    /// Ranking depth used during evaluation.
    pub top_k: usize,
    /// Candidate weights per strategy. Empty means the built-in ranges.
    pub weight_ranges: BTreeMap<String, Vec<f64>>,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            split_date: None,
            metric: OptimizerMetric::Mrr,
            max_iterations: 10,
            top_k: 100,
            weight_ranges: BTreeMap::new(),
        }
    }
}

impl OptimizerSettings {
    /// Apply `DAILYPAPER_SPLIT_DATE`, `DAILYPAPER_OPTIMIZER_METRIC` and
    /// `DAILYPAPER_MAX_ITERATIONS`.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_value("DAILYPAPER_SPLIT_DATE") {
            self.split_date = Some(v);
        }
        if let Some(v) = env_parse("DAILYPAPER_OPTIMIZER_METRIC") {
            self.metric = v;
        }
        if let Some(v) = env_parse("DAILYPAPER_MAX_ITERATIONS") {
            self.max_iterations = v;
        }
    }
}

/// Split a comma/whitespace separated list of strategy names.
pub fn parse_name_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn env_value(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn env_parse<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = env_value(key)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::warn!(key, value = %raw, error = %err, "ignoring invalid env override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dailypaper_test_utils::{env_guard, set_env_var};

    #[test]
    fn empty_table_uses_defaults() {
        let settings: RecommendationSettings = toml::from_str("").unwrap();
        assert_eq!(settings, RecommendationSettings::default());
        assert_eq!(
            settings.enabled_strategies,
            vec!["keyword_semantic", "interested_semantic"]
        );
        assert_eq!(settings.rrf_k, 60.0);
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let settings: OptimizerSettings =
            toml::from_str("metric = \"hit_rate\"\n[weight_ranges]\nllm_themes = [0.0, 2.0]\n")
                .unwrap();
        assert_eq!(settings.metric, OptimizerMetric::HitRate);
        assert_eq!(settings.max_iterations, 10);
        assert_eq!(settings.weight_ranges["llm_themes"], vec![0.0, 2.0]);
    }

    #[test]
    fn metric_parsing() {
        assert_eq!("MRR".parse::<OptimizerMetric>().unwrap(), OptimizerMetric::Mrr);
        assert_eq!(
            "mean-rank".parse::<OptimizerMetric>().unwrap(),
            OptimizerMetric::MeanRank
        );
        let err = "ndcg".parse::<OptimizerMetric>().unwrap_err();
        assert!(err.to_string().contains("expected"));
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let _g = env_guard();
        let _s = set_env_var("DAILYPAPER_STRATEGIES", Some("llm_themes, repetition_filter"));
        let _k = set_env_var("DAILYPAPER_TOP_K", Some("25"));
        let _bad = set_env_var("DAILYPAPER_RRF_K", Some("sixty"));

        let mut settings = RecommendationSettings {
            top_k: 5,
            ..Default::default()
        };
        settings.apply_env_overrides();
        assert_eq!(settings.enabled_strategies, vec!["llm_themes", "repetition_filter"]);
        assert_eq!(settings.top_k, 25);
        assert_eq!(settings.rrf_k, 60.0, "invalid override is ignored");
    }

    #[test]
    fn name_list_splits_on_commas_and_spaces() {
        assert_eq!(parse_name_list(" a,b  c,,"), vec!["a", "b", "c"]);
    }
}
