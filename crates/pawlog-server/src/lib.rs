//! HTTP server wiring for Pawlog.
//!
//! Mounts the [`pawlog_api`] router under `/api` over a SQLite store, the
//! argon2 token verifier and the HTTP generation backend.

pub mod generation;
pub mod identity;

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use pawlog_api::ApiState;
use pawlog_core::store::EntityStore;
use pawlog_engine::{ContextLimits, Generator, IdentityVerifier};
use pawlog_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use generation::{GenerationConfig, HttpGenerator};
use identity::{TokenEntry, TokenVerifier};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `PAWLOG_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  /// JSONL export imported into the store on startup.
  #[serde(default)]
  pub seed_path:  Option<PathBuf>,
  #[serde(default)]
  pub context:    ContextLimits,
  pub generation: GenerationConfig,
  #[serde(default)]
  pub tokens:     Vec<TokenEntry>,
}

// ─── Application state ───────────────────────────────────────────────────────

/// The concrete state the binary serves.
pub type AppState = ApiState<SqliteStore, TokenVerifier, HttpGenerator>;

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the top-level [`Router`]: the API under `/api`, with request
/// tracing.
pub fn router<S, V, G>(state: Arc<ApiState<S, V, G>>) -> Router
where
  S: EntityStore + 'static,
  V: IdentityVerifier + 'static,
  G: Generator + 'static,
{
  Router::new()
    .nest("/api", pawlog_api::api_router(state))
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    Json,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
    routing::post,
  };
  use serde_json::{Value, json};
  use tokio::net::TcpListener;
  use tower::ServiceExt as _;

  const SEED: &str = r#"
{"reference":"dogs/rex","fields":{"name":"Rex","breed":"Beagle","age":4,"userId":{"__ref__":"users/u1"},"dogImageUrl":"https://example.com/rex.png"}}
{"reference":"exerciseEvents/e1","fields":{"dogId":{"__ref__":"dogs/rex"},"userId":{"__ref__":"users/u1"},"activityType":"walk","duration":30,"eventDate":{"_seconds":1704096000,"_nanoseconds":0}}}
{"reference":"dietEvents/d1","fields":{"dogId":{"__ref__":"dogs/rex"},"userId":{"__ref__":"users/u1"},"foodType":"kibble","brandName":"Acme","quantity":"200","eventDate":"2024-01-02T08:00:00Z"}}
{"reference":"wellnessEvents/w1","fields":{"dogId":{"__ref__":"dogs/rex"},"userId":{"__ref__":"users/u1"},"mentalState":"happy","severity":1,"eventDate":"2024-01-03T18:30:00.250Z"}}
"#;

  /// A generation endpoint that echoes how many diet events it was shown.
  async fn upstream() -> String {
    let app = axum::Router::new().route(
      "/generate",
      post(|Json(body): Json<Value>| async move {
        let diet = body["context"]["diet_events"].as_array().map_or(0, Vec::len);
        Json(json!({ "text": format!("{diet} meals logged") }))
      }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}/generate")
  }

  async fn make_state() -> Arc<AppState> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store.import_jsonl(SEED).await.unwrap();

    let verifier = TokenVerifier::new(vec![TokenEntry {
      user_id:    "u1".into(),
      token_hash: identity::hash_token("secret").unwrap(),
    }])
    .unwrap();
    let generator = HttpGenerator::new(GenerationConfig {
      endpoint:      upstream().await,
      api_key:       None,
      timeout_secs:  5,
      system_prompt: None,
    })
    .unwrap();

    Arc::new(ApiState::new(Arc::new(store), verifier, generator, ContextLimits::default()))
  }

  async fn oneshot(state: Arc<AppState>, req: Request<Body>) -> Response {
    router(state).oneshot(req).await.unwrap()
  }

  async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn chat(auth: &str) -> Request<Body> {
    Request::builder()
      .method("POST")
      .uri("/api/chat")
      .header(header::CONTENT_TYPE, "application/json")
      .header(header::AUTHORIZATION, auth)
      .body(Body::from(json!({ "subject_id": "rex", "question": "Eating well?" }).to_string()))
      .unwrap()
  }

  #[tokio::test]
  async fn api_is_mounted_under_prefix() {
    let state = make_state().await;
    let req = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    assert_eq!(oneshot(Arc::clone(&state), req).await.status(), StatusCode::OK);

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    assert_eq!(oneshot(state, req).await.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn seeded_export_aggregates() {
    let req = Request::builder()
      .uri("/api/subjects/rex/aggregate")
      .body(Body::empty())
      .unwrap();
    let resp = oneshot(make_state().await, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    let ids: Vec<_> = json["trend"]
      .as_array()
      .unwrap()
      .iter()
      .map(|p| p["event_id"].as_str().unwrap().to_owned())
      .collect();
    assert_eq!(ids, ["e1", "d1", "w1"]);
    assert_eq!(json["trend"][2]["time"], "2024-01-03T18:30:00.250Z");
    // exercise 50, diet 100, wellness 90.
    assert_eq!(json["current_score"], 80.0);
  }

  #[tokio::test]
  async fn chat_runs_end_to_end() {
    let resp = oneshot(make_state().await, chat("Bearer secret")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["text"], "1 meals logged");
  }

  #[tokio::test]
  async fn chat_with_unknown_token_is_forbidden() {
    let resp = oneshot(make_state().await, chat("Bearer nope")).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  }
}
