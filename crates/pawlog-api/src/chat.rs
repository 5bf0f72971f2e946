//! Handler for `POST /chat`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::{HeaderMap, header},
};
use pawlog_core::store::EntityStore;
use pawlog_engine::{ChatReply, Generator, IdentityVerifier};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ChatBody {
  pub subject_id: String,
  pub question:   String,
}

/// `POST /chat` — body: `{"subject_id":"rex","question":"..."}`, with
/// `Authorization: Bearer <token>`.
pub async fn handler<S, V, G>(
  State(state): State<Arc<ApiState<S, V, G>>>,
  headers: HeaderMap,
  body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError>
where
  S: EntityStore,
  V: IdentityVerifier,
  G: Generator,
{
  // A non-ASCII header value cannot carry a bearer token.
  let auth = headers
    .get(header::AUTHORIZATION)
    .map(|v| v.to_str().unwrap_or_default());
  let body = match body {
    Ok(Json(body)) => body,
    Err(rejection) => {
      state.chat.authorize(auth).await?;
      return Err(ApiError::BadRequest(rejection.body_text()));
    }
  };
  let reply = state.chat.ask(auth, &body.subject_id, &body.question).await?;
  Ok(Json(reply))
}
