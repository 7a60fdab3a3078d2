//! Name-to-factory registry for recommendation strategies.
//!
//! The registry is an ordinary value built at startup and handed to the
//! manager, so tests can register fakes without touching shared state.

use crate::embedding::EmbeddingProvider;
use crate::llm::LlmClient;
use crate::settings::{
    RecommendationSettings, DISINTERESTED_FILTER, DISINTERESTED_SEMANTIC, INTERESTED_SEMANTIC,
    KEYWORD_SEMANTIC, LLM_THEMES, REPETITION_FILTER,
};
use crate::strategies::{
    DisinterestedKeywordFilter, DisinterestedSemantic, InterestedSemantic, KeywordSemantic,
    LlmThemes, RecommendationStrategy, RepetitionFilter,
};
use dailypaper_state::PaperQueries;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything a factory may need to build a strategy.
#[derive(Clone)]
pub struct StrategyContext {
    /// Read-only store access.
    pub queries: Arc<dyn PaperQueries>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub settings: RecommendationSettings,
}

pub type StrategyFactory =
    Box<dyn Fn(&StrategyContext) -> Box<dyn RecommendationStrategy> + Send + Sync>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("strategy '{0}' is already registered")]
    Duplicate(String),
    #[error("unknown strategy '{name}'; available: {}", .available.join(", "))]
    Unknown { name: String, available: Vec<String> },
}

#[derive(Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.list_strategies())
            .finish()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the six built-in strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults: [(&str, StrategyFactory); 6] = [
            (
                KEYWORD_SEMANTIC,
                Box::new(|ctx: &StrategyContext| -> Box<dyn RecommendationStrategy> {
                    Box::new(KeywordSemantic::new(
                        ctx.queries.clone(),
                        ctx.embedder.clone(),
                        ctx.settings.min_similarity,
                    ))
                }),
            ),
            (
                INTERESTED_SEMANTIC,
                Box::new(|ctx: &StrategyContext| -> Box<dyn RecommendationStrategy> {
                    Box::new(InterestedSemantic::new(
                        ctx.queries.clone(),
                        ctx.embedder.clone(),
                        ctx.settings.interested_days,
                        ctx.settings.min_similarity,
                    ))
                }),
            ),
            (
                DISINTERESTED_SEMANTIC,
                Box::new(|ctx: &StrategyContext| -> Box<dyn RecommendationStrategy> {
                    Box::new(DisinterestedSemantic::new(
                        ctx.queries.clone(),
                        ctx.embedder.clone(),
                        ctx.settings.similarity_threshold,
                    ))
                }),
            ),
            (
                DISINTERESTED_FILTER,
                Box::new(|ctx: &StrategyContext| -> Box<dyn RecommendationStrategy> {
                    Box::new(DisinterestedKeywordFilter::new(ctx.queries.clone()))
                }),
            ),
            (
                REPETITION_FILTER,
                Box::new(|ctx: &StrategyContext| -> Box<dyn RecommendationStrategy> {
                    Box::new(RepetitionFilter::new(
                        ctx.queries.clone(),
                        ctx.settings.downweight_factor,
                        ctx.settings.max_recommendations,
                    ))
                }),
            ),
            (
                LLM_THEMES,
                Box::new(|ctx: &StrategyContext| -> Box<dyn RecommendationStrategy> {
                    Box::new(LlmThemes::new(ctx.queries.clone(), ctx.llm.clone()))
                }),
            ),
        ];
        for (name, factory) in defaults {
            registry.factories.insert(name.to_string(), factory);
        }
        registry
    }

    /// Register a factory under a new name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(&StrategyContext) -> Box<dyn RecommendationStrategy> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    /// Returns true when a strategy was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.factories.remove(name).is_some()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn list_strategies(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.factories.clear();
    }

    pub fn create(
        &self,
        name: &str,
        ctx: &StrategyContext,
    ) -> Result<Box<dyn RecommendationStrategy>, RegistryError> {
        let factory = self.factories.get(name).ok_or_else(|| RegistryError::Unknown {
            name: name.to_string(),
            available: self.list_strategies(),
        })?;
        Ok(factory(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture;
    use crate::types::StrategyKind;

    fn context() -> StrategyContext {
        let fx = fixture();
        StrategyContext {
            queries: fx.queries(),
            embedder: fx.embedder(),
            llm: None,
            settings: RecommendationSettings::default(),
        }
    }

    #[test]
    fn defaults_cover_all_builtins() {
        let registry = StrategyRegistry::with_defaults();
        assert_eq!(
            registry.list_strategies(),
            vec![
                "disinterested_filter",
                "disinterested_semantic",
                "interested_semantic",
                "keyword_semantic",
                "llm_themes",
                "repetition_filter",
            ]
        );
        let ctx = context();
        for name in registry.list_strategies() {
            let strategy = registry.create(&name, &ctx).unwrap();
            assert_eq!(strategy.strategy_name(), name);
        }
        assert_eq!(
            registry.create(REPETITION_FILTER, &ctx).unwrap().kind(),
            StrategyKind::Filter
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = StrategyRegistry::with_defaults();
        let err = registry
            .register(KEYWORD_SEMANTIC, |ctx: &StrategyContext| -> Box<dyn RecommendationStrategy> {
                Box::new(DisinterestedKeywordFilter::new(ctx.queries.clone()))
            })
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate(KEYWORD_SEMANTIC.into()));
    }

    #[test]
    fn unknown_name_lists_available() {
        let mut registry = StrategyRegistry::new();
        registry
            .register("custom", |ctx: &StrategyContext| -> Box<dyn RecommendationStrategy> {
                Box::new(DisinterestedKeywordFilter::new(ctx.queries.clone()))
            })
            .unwrap();
        let err = registry.create("missing", &context()).err().unwrap();
        assert!(err.to_string().contains("available: custom"), "{err}");
    }

    #[test]
    fn unregister_and_clear() {
        let mut registry = StrategyRegistry::with_defaults();
        assert!(registry.unregister(LLM_THEMES));
        assert!(!registry.unregister(LLM_THEMES));
        assert!(!registry.is_registered(LLM_THEMES));
        assert!(registry.is_registered(KEYWORD_SEMANTIC));
        registry.clear();
        assert!(registry.list_strategies().is_empty());
    }
}
