//! Network collaborators driven by command handlers.
//!
//! Each backend is a small async trait with one reqwest implementation and an
//! [`Unconfigured`] stand-in used when its config section is absent, so the
//! router never needs to special-case a missing backend.

pub mod dialogue;
pub mod paste;
pub mod translate;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use feedbridge_core::config::BackendsConfig;

pub use dialogue::{Dialogue, OpenAiDialogue};
pub use paste::{GistPaste, Paste};
pub use translate::{LibreTranslator, Translator};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{0} backend is not configured")]
    Unavailable(&'static str),
}

/// Check the response status, turning non-2xx into [`BackendError::Api`]
/// with whatever message the service sent back.
pub(crate) async fn check_status(
    backend: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    warn!(backend, status, body = %text, "backend API error");
    Err(BackendError::Api {
        status,
        message: api_message(&text),
    })
}

/// Prefer the `error` / `message` field of a JSON error body; fall back to the raw text.
fn api_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.as_str().or_else(|| e.get("message")?.as_str()))
                .or_else(|| v.get("message")?.as_str())
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Placeholder for any backend whose config section is missing.
pub struct Unconfigured(pub &'static str);

#[async_trait]
impl Translator for Unconfigured {
    async fn translate(&self, _text: &str, _lang: &str) -> Result<String, BackendError> {
        Err(BackendError::Unavailable(self.0))
    }
}

#[async_trait]
impl Dialogue for Unconfigured {
    async fn respond(&self, _text: &str) -> Result<String, BackendError> {
        Err(BackendError::Unavailable(self.0))
    }
}

#[async_trait]
impl Paste for Unconfigured {
    async fn publish(&self, _filename: &str, _content: &str) -> Result<String, BackendError> {
        Err(BackendError::Unavailable(self.0))
    }
}

/// The set of backends handed to command handlers.
#[derive(Clone)]
pub struct Backends {
    pub translator: Arc<dyn Translator>,
    pub dialogue: Arc<dyn Dialogue>,
    pub paste: Arc<dyn Paste>,
}

impl Backends {
    /// Build from config; absent sections become [`Unconfigured`].
    pub fn from_config(config: &BackendsConfig) -> Self {
        let client = reqwest::Client::new();

        let translator: Arc<dyn Translator> = match config.translate {
            Some(ref t) => {
                info!(base_url = %t.base_url, "translation backend configured");
                Arc::new(LibreTranslator::new(client.clone(), t))
            }
            None => Arc::new(Unconfigured("translation")),
        };
        let dialogue: Arc<dyn Dialogue> = match config.dialogue {
            Some(ref d) => {
                info!(base_url = %d.base_url, model = %d.model, "dialogue backend configured");
                Arc::new(OpenAiDialogue::new(client.clone(), d))
            }
            None => Arc::new(Unconfigured("dialogue")),
        };
        let paste: Arc<dyn Paste> = match config.paste {
            Some(ref p) => {
                info!(api_url = %p.api_url, "paste backend configured");
                Arc::new(GistPaste::new(client, p))
            }
            None => Arc::new(Unconfigured("paste")),
        };

        Self {
            translator,
            dialogue,
            paste,
        }
    }

    /// Every backend unconfigured.
    pub fn none() -> Self {
        Self::from_config(&BackendsConfig::default())
    }
}
