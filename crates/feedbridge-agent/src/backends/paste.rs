use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use feedbridge_core::config::PasteConfig;

use super::{check_status, BackendError};

#[async_trait]
pub trait Paste: Send + Sync {
    /// Publish `content` under `filename` and return a URL to it.
    async fn publish(&self, filename: &str, content: &str) -> Result<String, BackendError>;
}

/// GitHub gist publisher.
pub struct GistPaste {
    client: reqwest::Client,
    api_url: String,
    token: String,
    public: bool,
}

impl GistPaste {
    pub fn new(client: reqwest::Client, config: &PasteConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            public: config.public,
        }
    }
}

#[derive(Deserialize)]
struct GistResponse {
    html_url: String,
}

#[async_trait]
impl Paste for GistPaste {
    async fn publish(&self, filename: &str, content: &str) -> Result<String, BackendError> {
        let url = format!("{}/gists", self.api_url);
        let mut files = serde_json::Map::new();
        files.insert(
            filename.to_string(),
            serde_json::json!({ "content": content }),
        );
        let body = serde_json::json!({
            "description": "chat log",
            "public": self.public,
            "files": files,
        });

        debug!(filename, bytes = content.len(), "publishing gist");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("accept", "application/vnd.github+json")
            .header("user-agent", concat!("feedbridge/", env!("CARGO_PKG_VERSION")))
            .json(&body)
            .send()
            .await?;
        let resp = check_status("paste", resp).await?;
        let parsed: GistResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        info!(url = %parsed.html_url, "gist published");
        Ok(parsed.html_url)
    }
}
