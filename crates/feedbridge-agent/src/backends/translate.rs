use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use feedbridge_core::config::TranslateConfig;

use super::{check_status, BackendError};

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `lang` (an ISO 639-1 code such as `"ja"`),
    /// letting the backend detect the source language.
    async fn translate(&self, text: &str, lang: &str) -> Result<String, BackendError>;
}

/// LibreTranslate-compatible `/translate` endpoint.
pub struct LibreTranslator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl LibreTranslator {
    pub fn new(client: reqwest::Client, config: &TranslateConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[async_trait]
impl Translator for LibreTranslator {
    async fn translate(&self, text: &str, lang: &str) -> Result<String, BackendError> {
        let url = format!("{}/translate", self.base_url);
        let mut body = serde_json::json!({
            "q": text,
            "source": "auto",
            "target": lang,
            "format": "text",
        });
        if let Some(ref key) = self.api_key {
            body["api_key"] = serde_json::Value::String(key.clone());
        }

        debug!(target_lang = %lang, chars = text.chars().count(), "sending translation request");

        let resp = self.client.post(&url).json(&body).send().await?;
        let resp = check_status("translate", resp).await?;
        let parsed: TranslateResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        Ok(parsed.translated_text)
    }
}
