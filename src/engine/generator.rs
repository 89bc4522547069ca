//! External text-generation client.
//!
//! The engine only ever talks to the model through [`TextGenerator`], so
//! tests and alternative providers can be injected without touching the
//! scoring pipelines.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::ClassifierConfig;
use crate::engine::errors::{EngineError, EngineResult, TransportError};

/// A model that turns a plain-text prompt into plain-text output.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> EngineResult<String>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    /// Build a client, reading the api key from the env var named in config.
    pub fn from_config(config: &ClassifierConfig) -> EngineResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| TransportError::MissingApiKey(config.api_key_env.clone()))?;

        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &ClassifierConfig, api_key: impl Into<String>) -> EngineResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        )
    }

    fn extract_text(body: &str) -> EngineResult<String> {
        let resp: GenerateResponse = serde_json::from_str(body)
            .map_err(|_| EngineError::parse("a generateContent response", body))?;

        let text: String = resp
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .concat()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(EngineError::parse("generated text", body));
        }

        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> EngineResult<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            log::warn!("gemini: model={} status={status}", self.model);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        Self::extract_text(&text)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
