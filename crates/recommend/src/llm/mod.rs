//! Text-generation collaborator used by the theme strategy and theme refresh.

mod openai;

pub use openai::{ChatConfig, OpenAiChatClient};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("llm service returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("llm response had no content")]
    EmptyResponse,
    #[error("invalid llm configuration: {0}")]
    Config(String),
}

/// Black-box chat completion.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

/// Returns the JSON payload of a model reply.
///
/// Models often wrap JSON in a fenced code block or add prose around it; this
/// strips the fence, then falls back to the outermost `[`..`]` span.
pub fn extract_json_array(reply: &str) -> &str {
    let reply = reply.trim();
    if let Some(start) = reply.find("```") {
        let after = &reply[start + 3..];
        if let Some(end) = after.find("```") {
            let block = &after[..end];
            let block = match block.find('\n') {
                Some(nl) if !block[..nl].trim_start().starts_with('[') => &block[nl + 1..],
                _ => block,
            };
            return block.trim();
        }
    }
    match (reply.find('['), reply.rfind(']')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply,
    }
}
