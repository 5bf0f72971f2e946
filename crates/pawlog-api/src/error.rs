//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use pawlog_engine::{AuthError, ChatError, ContextError, FetchError, GenerationError};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// No credentials were presented.
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  /// Credentials were presented and rejected.
  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("unavailable: {0}")]
  Unavailable(String),

  #[error("upstream error: {0}")]
  BadGateway(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
      ApiError::BadGateway(m) => (StatusCode::BAD_GATEWAY, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if matches!(self, ApiError::Unauthorized(_)) {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    res
  }
}

impl From<AuthError> for ApiError {
  fn from(e: AuthError) -> Self {
    match e {
      AuthError::MissingHeader => Self::Unauthorized(e.to_string()),
      AuthError::MalformedHeader => Self::BadRequest(e.to_string()),
      AuthError::InvalidToken => Self::Forbidden(e.to_string()),
    }
  }
}

impl From<FetchError> for ApiError {
  fn from(e: FetchError) -> Self {
    warn!(category = %e.category, error = %e.source, "fetch failed");
    Self::Unavailable(e.to_string())
  }
}

impl From<ContextError> for ApiError {
  fn from(e: ContextError) -> Self {
    match e {
      ContextError::SubjectNotFound(_) => Self::NotFound(e.to_string()),
      ContextError::FetchFailed(fetch) => fetch.into(),
      ContextError::InvalidSubject(inner) => Self::Store(Box::new(inner)),
      ContextError::Store(inner) => Self::Store(inner),
    }
  }
}

impl From<GenerationError> for ApiError {
  fn from(e: GenerationError) -> Self { Self::BadGateway(e.to_string()) }
}

impl From<ChatError> for ApiError {
  fn from(e: ChatError) -> Self {
    match e {
      ChatError::Auth(auth) => auth.into(),
      ChatError::EmptyQuestion => Self::BadRequest(e.to_string()),
      ChatError::Context(context) => context.into(),
      ChatError::Generation(generation) => generation.into(),
    }
  }
}
