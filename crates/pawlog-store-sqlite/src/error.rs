//! Error type for `pawlog-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A line of a JSONL import did not decode as a document.
  #[error("import line {line}: {source}")]
  Import {
    line:   usize,
    #[source]
    source: serde_json::Error,
  },

  #[error("stored body of {0} is not a JSON object")]
  CorruptBody(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
