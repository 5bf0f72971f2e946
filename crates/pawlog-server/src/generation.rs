//! [`Generator`] backed by an HTTP JSON endpoint.
//!
//! The request body is `{"system_prompt", "question", "context"}`. The
//! response may be a bare JSON string or an object with a `text` or
//! `result` field.

use std::time::Duration;

use pawlog_engine::{GenerationError, Generator, RetrievalContext};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `[generation]` config section.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
  pub endpoint:      String,
  #[serde(default)]
  pub api_key:       Option<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs:  u64,
  #[serde(default)]
  pub system_prompt: Option<String>,
}

fn default_timeout_secs() -> u64 { 60 }

#[derive(Serialize)]
struct GenerateRequest<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  system_prompt: Option<&'a str>,
  question:      &'a str,
  context:       &'a RetrievalContext,
}

#[derive(Clone)]
pub struct HttpGenerator {
  client: Client,
  config: GenerationConfig,
}

impl HttpGenerator {
  pub fn new(config: GenerationConfig) -> reqwest::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, config })
  }
}

impl Generator for HttpGenerator {
  async fn generate(
    &self,
    context: &RetrievalContext,
    question: &str,
  ) -> Result<String, GenerationError> {
    let mut req = self.client.post(&self.config.endpoint).json(&GenerateRequest {
      system_prompt: self.config.system_prompt.as_deref(),
      question,
      context,
    });
    if let Some(key) = &self.config.api_key {
      req = req.bearer_auth(key);
    }

    let resp = req
      .send()
      .await
      .map_err(|e| GenerationError::Failed(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
      return Err(GenerationError::Failed(format!("generator returned {status}")));
    }
    let body: Value = resp
      .json()
      .await
      .map_err(|e| GenerationError::Failed(format!("unreadable generator response: {e}")))?;
    extract_text(body)
  }
}

fn extract_text(body: Value) -> Result<String, GenerationError> {
  match body {
    Value::String(text) => Ok(text),
    Value::Object(mut map) => ["text", "result"]
      .iter()
      .find_map(|key| match map.remove(*key) {
        Some(Value::String(text)) => Some(text),
        _ => None,
      })
      .ok_or_else(|| GenerationError::Failed("response has no `text` or `result` field".into())),
    other => Err(GenerationError::Failed(format!("unexpected response: {other}"))),
  }
}
