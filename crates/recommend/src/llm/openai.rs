use super::{LlmClient, LlmError};
use crate::settings::{env_parse, env_value};
use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE: &str = "https://api.openai.com/v1/";
const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: String,
    pub base_url: Url,
    pub model: String,
    pub timeout: Duration,
}

impl ChatConfig {
    /// Reads `DAILYPAPER_LLM_API_KEY` (required) and optional
    /// `DAILYPAPER_LLM_{BASE_URL,MODEL,TIMEOUT_MS}`.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = env_value("DAILYPAPER_LLM_API_KEY").ok_or_else(|| {
            LlmError::Config("DAILYPAPER_LLM_API_KEY must be set for LLM features".into())
        })?;
        let raw_base = env_value("DAILYPAPER_LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE.into());
        let base_url = parse_base_url(&raw_base)?;
        let model = env_value("DAILYPAPER_LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into());
        let timeout_ms = env_parse::<u64>("DAILYPAPER_LLM_TIMEOUT_MS").unwrap_or(DEFAULT_TIMEOUT_MS);
        Ok(Self {
            api_key,
            base_url,
            model,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Parse a base URL, appending `/` so relative joins keep the last segment.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, LlmError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized)
        .map_err(|e| LlmError::Config(format!("invalid DAILYPAPER_LLM_BASE_URL {raw}: {e}")))
}

/// Client for any OpenAI-compatible `chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    config: ChatConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

impl OpenAiChatClient {
    pub fn new(config: ChatConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let url = self
            .config
            .base_url
            .join("chat/completions")
            .map_err(|e| LlmError::Config(e.to_string()))?;
        let body = ChatBody {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };
        debug!(model = %self.config.model, prompt_len = user.len(), "calling chat completion");

        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        let parsed: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if !status.is_success() {
            let message = parsed
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or(text);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        parsed
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string)
            .ok_or(LlmError::EmptyResponse)
    }
}
