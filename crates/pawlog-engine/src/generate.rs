//! Answer generation over a pluggable [`Generator`].

use std::future::Future;

use thiserror::Error;
use tracing::{debug, warn};

use crate::context::RetrievalContext;

#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("generation failed: {0}")]
  Failed(String),

  #[error("generator returned an empty answer")]
  Empty,
}

/// Produces an answer from a context and the user's question.
pub trait Generator: Send + Sync {
  fn generate<'a>(
    &'a self,
    context: &'a RetrievalContext,
    question: &'a str,
  ) -> impl Future<Output = Result<String, GenerationError>> + Send + 'a;
}

/// Calls the generator once and rejects blank answers. Nothing is retried.
pub struct GenerationInvoker<G> {
  generator: G,
}

impl<G: Generator> GenerationInvoker<G> {
  pub fn new(generator: G) -> Self { Self { generator } }

  pub async fn generate(
    &self,
    context: &RetrievalContext,
    question: &str,
  ) -> Result<String, GenerationError> {
    let text = self.generator.generate(context, question).await.inspect_err(|error| {
      warn!(subject = %context.subject.id, %error, "generation failed");
    })?;
    if text.trim().is_empty() {
      warn!(subject = %context.subject.id, "generator returned an empty answer");
      return Err(GenerationError::Empty);
    }
    debug!(subject = %context.subject.id, chars = text.chars().count(), "generated answer");
    Ok(text)
  }
}
