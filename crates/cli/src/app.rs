//! Startup, wiring and command dispatch.

use crate::cli::{Cli, Commands};
use crate::commands::{
    handle_evaluate_command, handle_import_command, handle_mark_command,
    handle_optimize_command, handle_profile_command, handle_recommend_command,
    handle_strategies_command, handle_themes_command,
};
use crate::config::{apply_config_to_env, load_config, resolve_settings};
use anyhow::{Context, Result};
use clap::Parser;
use dailypaper_recommend::{
    ChatConfig, EmbeddingProvider, LlmClient, OllamaConfig, OllamaEmbedding, OpenAiChatClient,
    OptimizerSettings, RecommendationManager, RecommendationSettings, StrategyContext,
    StrategyRegistry,
};
use dailypaper_state::SqliteStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared handles built once per invocation.
pub(crate) struct Services {
    pub(crate) store: Arc<SqliteStore>,
    pub(crate) recommendation: RecommendationSettings,
    pub(crate) optimizer: OptimizerSettings,
}

impl Services {
    fn open(
        db: Option<PathBuf>,
        recommendation: RecommendationSettings,
        optimizer: OptimizerSettings,
    ) -> Result<Self> {
        let path = match db {
            Some(path) => path,
            None => dailypaper_state::database_path()?,
        };
        let store = SqliteStore::open(&path)
            .with_context(|| format!("opening database {}", path.display()))?;
        tracing::debug!(path = %path.display(), "database opened");
        Ok(Self {
            store: Arc::new(store),
            recommendation,
            optimizer,
        })
    }

    fn embedder(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let config = OllamaConfig::from_env().context("embedding configuration")?;
        Ok(Arc::new(OllamaEmbedding::new(config)?))
    }

    /// `None` when no API key is configured.
    pub(crate) fn llm(&self) -> Result<Option<Arc<dyn LlmClient>>> {
        let config = match ChatConfig::from_env() {
            Ok(config) => config,
            Err(err) => {
                tracing::debug!(error = %err, "LLM disabled");
                return Ok(None);
            }
        };
        Ok(Some(Arc::new(OpenAiChatClient::new(config)?)))
    }

    /// Manager over the default registry. Non-empty `strategies` replaces the
    /// enabled list.
    pub(crate) fn manager(&self, strategies: Vec<String>) -> Result<RecommendationManager> {
        let mut settings = self.recommendation.clone();
        if !strategies.is_empty() {
            settings.enabled_strategies = strategies;
        }
        let context = StrategyContext {
            queries: self.store.clone(),
            embedder: self.embedder()?,
            llm: self.llm()?,
            settings,
        };
        Ok(RecommendationManager::new(
            StrategyRegistry::with_defaults(),
            context,
            self.store.clone(),
        ))
    }
}

/// Runs the `dailypaper` command line.
pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config()?;
    if let Some(ref config) = config {
        apply_config_to_env(config);
    }
    let (recommendation, optimizer) = resolve_settings(config);

    let cli = Cli::parse();
    let services = Services::open(cli.db, recommendation, optimizer)?;
    let format = cli.format;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Recommend {
                top_k,
                strategies,
                weights,
                no_record,
            } => handle_recommend_command(&services, top_k, strategies, weights, no_record, format).await,
            Commands::Evaluate {
                split_date,
                top_k,
                strategies,
                weights,
            } => handle_evaluate_command(&services, split_date, top_k, strategies, weights, format).await,
            Commands::Optimize {
                split_date,
                max_iterations,
                metric,
                strategies,
            } => {
                handle_optimize_command(&services, split_date, max_iterations, metric, strategies, format)
                    .await
            }
            Commands::Strategies => handle_strategies_command(&services, format),
            Commands::Import { file } => handle_import_command(&services, &file, format),
            Commands::Mark {
                paper_id,
                action,
                notes,
            } => handle_mark_command(&services, paper_id, action, notes, format),
            Commands::Profile {
                interested,
                disinterested,
                description,
            } => handle_profile_command(&services, interested, disinterested, description, format),
            Commands::Themes { refresh, force } => {
                handle_themes_command(&services, refresh, force, format).await
            }
        }
    })
}
