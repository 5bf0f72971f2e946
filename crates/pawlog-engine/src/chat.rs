//! One chat turn: authorize, build the context, generate.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use pawlog_core::store::EntityStore;

use crate::{
  auth::{AuthError, AuthGate, IdentityVerifier, Principal},
  context::{ContextBuilder, ContextError, ContextLimits},
  generate::{GenerationError, GenerationInvoker, Generator},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
  pub text: String,
}

/// A failed chat turn, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum ChatError {
  #[error(transparent)]
  Auth(#[from] AuthError),

  #[error("question must not be empty")]
  EmptyQuestion,

  #[error(transparent)]
  Context(#[from] ContextError),

  #[error(transparent)]
  Generation(#[from] GenerationError),
}

pub struct ChatService<S, V, G> {
  gate:    AuthGate<V>,
  builder: ContextBuilder<S>,
  invoker: GenerationInvoker<G>,
}

impl<S, V, G> ChatService<S, V, G>
where
  S: EntityStore,
  V: IdentityVerifier,
  G: Generator,
{
  pub fn new(store: Arc<S>, verifier: V, generator: G, limits: ContextLimits) -> Self {
    Self {
      gate:    AuthGate::new(verifier),
      builder: ContextBuilder::new(store, limits),
      invoker: GenerationInvoker::new(generator),
    }
  }

  /// Check `auth_header` without reading anything else. Callers that reject
  /// a request for its body use this first, so unauthenticated callers
  /// only ever see an auth failure.
  pub async fn authorize(&self, auth_header: Option<&str>) -> Result<Principal, ChatError> {
    Ok(self.gate.authorize(auth_header).await?)
  }

  /// Answer `question` about `subject_id` for the caller identified by
  /// `auth_header`. Nothing touches the store until the caller is
  /// authorized.
  pub async fn ask(
    &self,
    auth_header: Option<&str>,
    subject_id: &str,
    question: &str,
  ) -> Result<ChatReply, ChatError> {
    let principal = self.authorize(auth_header).await?;
    if question.trim().is_empty() {
      return Err(ChatError::EmptyQuestion);
    }
    let context = self.builder.build(subject_id).await?;
    let text = self.invoker.generate(&context, question).await?;
    info!(user = %principal.user_id, subject = subject_id, "answered chat turn");
    Ok(ChatReply { text })
  }
}
