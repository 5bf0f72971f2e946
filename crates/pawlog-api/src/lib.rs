//! JSON REST API for Pawlog.
//!
//! Exposes an axum [`Router`] over the aggregation engine, backed by any
//! [`EntityStore`]. TLS and transport concerns are the caller's
//! responsibility; only `/chat` is gated by a bearer token.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", pawlog_api::api_router(state))
//! ```

pub mod chat;
pub mod dashboard;
pub mod error;
pub mod etag;
pub mod events;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use pawlog_core::store::EntityStore;
use pawlog_engine::{Aggregator, ChatService, ContextLimits, Generator, IdentityVerifier};

pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Engine services shared by every handler.
pub struct ApiState<S, V, G> {
  pub aggregator: Aggregator<S>,
  pub chat:       ChatService<S, V, G>,
}

impl<S, V, G> ApiState<S, V, G>
where
  S: EntityStore,
  V: IdentityVerifier,
  G: Generator,
{
  pub fn new(store: Arc<S>, verifier: V, generator: G, limits: ContextLimits) -> Self {
    Self {
      aggregator: Aggregator::new(Arc::clone(&store)),
      chat:       ChatService::new(store, verifier, generator, limits),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, V, G>(state: Arc<ApiState<S, V, G>>) -> Router<()>
where
  S: EntityStore + 'static,
  V: IdentityVerifier + 'static,
  G: Generator + 'static,
{
  Router::new()
    // Dashboards
    .route("/subjects/{id}/aggregate", get(dashboard::aggregate::<S, V, G>))
    .route("/subjects/{id}/dashboard/diet", get(dashboard::diet::<S, V, G>))
    // Event listings
    .route("/subjects/{id}/events", get(events::for_subject::<S, V, G>))
    .route("/owners/{id}/events", get(events::for_owner::<S, V, G>))
    // Assistant
    .route("/chat", post(chat::handler::<S, V, G>))
    .route("/health", get(|| async { "ok" }))
    .with_state(state)
}

// ─── Integration tests ───────────────────────────────────────────────────────
