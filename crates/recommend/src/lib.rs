//! Multi-strategy paper recommendations.
//!
//! This crate provides:
//! - Pluggable scoring and filter strategies (keyword, interest and
//!   disinterest similarity, keyword exclusion, repetition decay, LLM themes)
//! - Weighted reciprocal rank fusion of the scoring lists
//! - A manager that runs enabled strategies, applies filters and records
//!   what was surfaced
//! - Temporal-split evaluation and coordinate-descent weight tuning
//! - HTTP embedding and chat collaborators

pub mod embedding;
pub mod fusion;
pub mod llm;
pub mod manager;
pub mod optimizer;
pub mod registry;
pub mod settings;
pub mod similarity;
pub mod strategies;
pub mod themes;
pub mod types;

#[cfg(test)]
mod test_support;

pub use embedding::{
    embed_all, EmbeddingError, EmbeddingProvider, EmbeddingResult, OllamaConfig, OllamaEmbedding,
};
pub use fusion::{FusionEngine, DEFAULT_RRF_K, FUSION_STRATEGY};
pub use llm::{ChatConfig, LlmClient, LlmError, OpenAiChatClient};
pub use manager::{RecommendError, RecommendRequest, RecommendationManager};
pub use optimizer::{
    default_weight_ranges, objective, parse_split_date, EvaluationError, EvaluationMetrics,
    EvaluationReport, GridSearchResult, GridSearchStep, RecommendationOptimizer,
};
pub use registry::{RegistryError, StrategyContext, StrategyFactory, StrategyRegistry};
pub use settings::{OptimizerMetric, OptimizerSettings, RecommendationSettings};
pub use strategies::RecommendationStrategy;
pub use themes::{needs_refresh, regenerate_themes};
pub use types::{RecommendationResult, StrategyKind, StrategyParams};
