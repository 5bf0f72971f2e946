//! ETags for aggregated views.
//!
//! An ETag is a SHA-256 over everything that determines the response body:
//! the window, each trend point, the per-category counters and the
//! unavailable set. Views are built in a deterministic order, so equal
//! inputs always hash equally.

use pawlog_core::event::Category;
use pawlog_engine::AggregatedView;
use sha2::{Digest, Sha256};

/// Compute a quoted strong ETag for `view`.
pub fn compute_etag(view: &AggregatedView, unavailable: &[Category]) -> String {
  let mut hasher = Sha256::new();
  field(&mut hasher, view.subject_id.as_bytes());

  if let Some(window) = view.window {
    for bound in [window.since, window.until] {
      match bound {
        Some(t) => field(&mut hasher, &t.timestamp_millis().to_le_bytes()),
        None => field(&mut hasher, b"-"),
      }
    }
  }

  for point in &view.trend {
    field(&mut hasher, point.category.tag().as_bytes());
    field(&mut hasher, point.event_id.as_bytes());
    field(&mut hasher, &point.time.timestamp_millis().to_le_bytes());
    field(&mut hasher, &point.score.to_bits().to_le_bytes());
  }

  for (category, summary) in &view.categories {
    field(&mut hasher, category.tag().as_bytes());
    field(&mut hasher, &[u8::from(summary.available)]);
    field(&mut hasher, &(summary.invalid_time as u64).to_le_bytes());
    field(&mut hasher, &(summary.malformed as u64).to_le_bytes());
  }

  for category in unavailable {
    field(&mut hasher, category.tag().as_bytes());
  }

  format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// Length-prefixed so adjacent fields cannot run together.
fn field(hasher: &mut Sha256, bytes: &[u8]) {
  hasher.update((bytes.len() as u64).to_le_bytes());
  hasher.update(bytes);
}

/// Whether an `If-None-Match` header value matches `etag`. Accepts `*`,
/// comma-separated lists, weak validators and unquoted tags.
pub fn if_none_match(header: &str, etag: &str) -> bool {
  let etag = strip_etag_quotes(etag);
  header.split(',').map(str::trim).any(|candidate| {
    candidate == "*"
      || strip_etag_quotes(candidate.strip_prefix("W/").unwrap_or(candidate)) == etag
  })
}

fn strip_etag_quotes(s: &str) -> &str { s.trim_matches('"') }
