use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use feedbridge_core::config::DialogueConfig;

use super::{check_status, BackendError};

/// Keeps replies short enough to read in a chat feed.
const SYSTEM_PROMPT: &str =
    "You are a friendly participant in a public chat room. Reply briefly, in the language you were addressed in, in one or two sentences.";
const MAX_TOKENS: u32 = 256;

#[async_trait]
pub trait Dialogue: Send + Sync {
    async fn respond(&self, text: &str) -> Result<String, BackendError>;
}

/// OpenAI-compatible chat completions endpoint.
pub struct OpenAiDialogue {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiDialogue {
    pub fn new(client: reqwest::Client, config: &DialogueConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl Dialogue for OpenAiDialogue {
    async fn respond(&self, text: &str) -> Result<String, BackendError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
        });

        debug!(model = %self.model, "sending dialogue request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let resp = check_status("dialogue", resp).await?;
        let parsed: ApiResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| BackendError::Parse("response carried no message content".into()))
    }
}
