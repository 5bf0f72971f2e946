//! Error types for `pawlog-core`.

use thiserror::Error;

use crate::time::InvalidTime;

/// Raised while decoding a stored [`Document`](crate::store::Document) into
/// a typed value.
#[derive(Debug, Error)]
pub enum Error {
  #[error("missing field {0:?}")]
  MissingField(&'static str),

  #[error("field {field:?} is not a {expected}")]
  WrongType {
    field:    &'static str,
    expected: &'static str,
  },

  #[error("invalid reference: {0:?}")]
  InvalidReference(String),

  #[error("severity {0} is outside 1..=10")]
  SeverityOutOfRange(f64),

  #[error("negative duration: {0}")]
  NegativeDuration(f64),

  #[error("unknown mental state: {0:?}")]
  UnknownMentalState(String),

  #[error("invalid feeding times: {0}")]
  InvalidFeedingTimes(String),

  #[error("unknown category: {0:?}")]
  UnknownCategory(String),

  #[error(transparent)]
  InvalidTime(#[from] InvalidTime),
}

impl Error {
  /// Whether this error came from the event time rather than the payload.
  pub fn is_invalid_time(&self) -> bool { matches!(self, Self::InvalidTime(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
