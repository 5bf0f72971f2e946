//! Async HTTP client wrapping the Pawlog JSON API.

use std::{collections::BTreeMap, time::Duration};

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

/// Connection settings for the Pawlog API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  /// Bearer token; only needed for `chat`.
  pub token:    Option<String>,
}

// ─── Response shapes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct TrendRow {
  pub time:     String,
  pub category: String,
  pub event_id: String,
  pub score:    f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Aggregate {
  pub subject_id:    String,
  pub current_score: f64,
  pub trend:         Vec<TrendRow>,
  #[serde(default)]
  pub unavailable:   Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DietRow {
  pub event_id:       String,
  pub time:           String,
  pub quantity_grams: f64,
  pub brand_name:     Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatReply {
  text: String,
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Async HTTP client for the Pawlog JSON REST API.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(90))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    match &self.config.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }

  /// `GET /api/subjects/<id>/aggregate[?since=..][&until=..]`
  pub async fn aggregate(
    &self,
    subject_id: &str,
    since: Option<&str>,
    until: Option<&str>,
  ) -> Result<(Aggregate, Value)> {
    let mut query = Vec::new();
    if let Some(since) = since {
      query.push(("since", since));
    }
    if let Some(until) = until {
      query.push(("until", until));
    }
    let resp = self
      .client
      .get(self.url(&format!("/subjects/{subject_id}/aggregate")))
      .query(&query)
      .send()
      .await
      .context("GET /aggregate failed")?;
    let raw: Value = decode(resp, "aggregate").await?;
    let parsed = serde_json::from_value(raw.clone()).context("deserialising aggregate")?;
    Ok((parsed, raw))
  }

  /// `GET /api/subjects/<id>/dashboard/diet`
  pub async fn diet(&self, subject_id: &str) -> Result<BTreeMap<String, Vec<DietRow>>> {
    let resp = self
      .client
      .get(self.url(&format!("/subjects/{subject_id}/dashboard/diet")))
      .send()
      .await
      .context("GET /dashboard/diet failed")?;
    decode(resp, "diet dashboard").await
  }

  /// `GET /api/subjects/<id>/events?category=<tag>[&enrich=true]`
  pub async fn events(&self, subject_id: &str, category: &str, enrich: bool) -> Result<Vec<Value>> {
    let resp = self
      .client
      .get(self.url(&format!("/subjects/{subject_id}/events")))
      .query(&[("category", category), ("enrich", if enrich { "true" } else { "false" })])
      .send()
      .await
      .context("GET /events failed")?;
    decode(resp, "events").await
  }

  /// `POST /api/chat`
  pub async fn chat(&self, subject_id: &str, question: &str) -> Result<String> {
    let resp = self
      .auth(self.client.post(self.url("/chat")))
      .json(&json!({ "subject_id": subject_id, "question": question }))
      .send()
      .await
      .context("POST /chat failed")?;
    let reply: ChatReply = decode(resp, "chat reply").await?;
    Ok(reply.text)
  }
}

/// Deserialize a success body, or surface the server's `{"error": ...}`.
async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
  let status = resp.status();
  if !status.is_success() {
    let message = resp
      .json::<Value>()
      .await
      .ok()
      .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_owned))
      .unwrap_or_default();
    return Err(anyhow!("{what} → {status} {message}"));
  }
  resp.json().await.with_context(|| format!("deserialising {what}"))
}
