//! Timestamp normalization.
//!
//! The document store holds event times in two shapes: a structured
//! timestamp (`{"seconds": .., "nanoseconds": ..}`) written by the native
//! client libraries, and ISO-8601 strings written by form handlers and
//! import scripts. This module is the only place that knows about either
//! shape; everything downstream compares [`NormalizedTime`] values.
//!
//! Normalized times are truncated to millisecond precision so that the same
//! instant read from either representation compares equal, and so that
//! [`denormalize`] followed by [`normalize`] is lossless.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Why a raw value could not be turned into a [`NormalizedTime`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTime {
  #[error("time is missing")]
  Missing,

  #[error("unparsable time string {0:?}")]
  Unparsable(String),

  #[error("timestamp out of range")]
  OutOfRange,

  #[error("unsupported time representation: {0}")]
  Unsupported(String),
}

// ─── NormalizedTime ──────────────────────────────────────────────────────────

/// A UTC instant with millisecond precision.
///
/// Totally ordered; serialises as an RFC 3339 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormalizedTime(DateTime<Utc>);

impl NormalizedTime {
  /// Wrap a `DateTime`, discarding anything finer than a millisecond.
  pub fn from_datetime(dt: DateTime<Utc>) -> Self {
    let millis = dt.timestamp_millis();
    // `timestamp_millis` of a valid DateTime always maps back.
    Self(DateTime::from_timestamp_millis(millis).unwrap_or(dt))
  }

  pub fn from_millis(millis: i64) -> Option<Self> {
    DateTime::from_timestamp_millis(millis).map(Self)
  }

  pub fn as_datetime(&self) -> DateTime<Utc> { self.0 }

  pub fn timestamp_millis(&self) -> i64 { self.0.timestamp_millis() }
}

impl From<DateTime<Utc>> for NormalizedTime {
  fn from(dt: DateTime<Utc>) -> Self { Self::from_datetime(dt) }
}

impl fmt::Display for NormalizedTime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&denormalize(*self))
  }
}

impl Serialize for NormalizedTime {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&denormalize(*self))
  }
}

impl<'de> Deserialize<'de> for NormalizedTime {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    normalize(&raw).map_err(serde::de::Error::custom)
  }
}

// ─── Conversion ──────────────────────────────────────────────────────────────

/// Convert any supported stored representation into a [`NormalizedTime`].
///
/// Accepted shapes:
/// - `{"seconds": i64, "nanoseconds": u32}`, also with the underscore-
///   prefixed keys produced by JSON exports (`_seconds`, `_nanoseconds`);
/// - an RFC 3339 string;
/// - an ISO-8601 date-time without offset, or a bare `YYYY-MM-DD` date,
///   both read as UTC.
///
/// `null` is [`InvalidTime::Missing`]; callers that need ordering must not
/// substitute a default.
pub fn normalize(raw: &Value) -> Result<NormalizedTime, InvalidTime> {
  match raw {
    Value::Null => Err(InvalidTime::Missing),
    Value::String(s) => parse_iso(s),
    Value::Object(map) => {
      let seconds = map
        .get("seconds")
        .or_else(|| map.get("_seconds"))
        .ok_or_else(|| InvalidTime::Unsupported("object without seconds".into()))?
        .as_i64()
        .ok_or_else(|| InvalidTime::Unsupported("non-integer seconds".into()))?;

      let nanos = match map.get("nanoseconds").or_else(|| map.get("_nanoseconds")) {
        None | Some(Value::Null) => 0,
        Some(v) => v
          .as_u64()
          .filter(|n| *n < 1_000_000_000)
          .ok_or(InvalidTime::OutOfRange)?,
      };

      DateTime::from_timestamp(seconds, nanos as u32)
        .map(NormalizedTime::from_datetime)
        .ok_or(InvalidTime::OutOfRange)
    }
    Value::Bool(_) => Err(InvalidTime::Unsupported("boolean".into())),
    Value::Number(_) => Err(InvalidTime::Unsupported("bare number".into())),
    Value::Array(_) => Err(InvalidTime::Unsupported("array".into())),
  }
}

fn parse_iso(s: &str) -> Result<NormalizedTime, InvalidTime> {
  let s = s.trim();
  if s.is_empty() {
    return Err(InvalidTime::Missing);
  }

  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(NormalizedTime::from_datetime(dt.with_timezone(&Utc)));
  }
  if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M%:z") {
    return Ok(NormalizedTime::from_datetime(dt.with_timezone(&Utc)));
  }

  // Offset-less forms read as UTC; an explicit `Z` means the same thing.
  let s = s.strip_suffix(['Z', 'z']).unwrap_or(s);
  if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
    return Ok(NormalizedTime::from_datetime(naive.and_utc()));
  }
  if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M") {
    return Ok(NormalizedTime::from_datetime(naive.and_utc()));
  }
  if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
    let midnight = date
      .and_hms_opt(0, 0, 0)
      .ok_or(InvalidTime::OutOfRange)?;
    return Ok(NormalizedTime::from_datetime(midnight.and_utc()));
  }

  Err(InvalidTime::Unparsable(s.to_owned()))
}

/// Render a [`NormalizedTime`] for display: RFC 3339, UTC, milliseconds.
pub fn denormalize(time: NormalizedTime) -> String {
  time.0.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use serde_json::json;

  use super::*;

  #[test]
  fn structured_and_iso_forms_agree() {
    let structured = normalize(&json!({ "seconds": 1_704_448_800, "nanoseconds": 250_000_000 })).unwrap();
    let iso = normalize(&json!("2024-01-05T10:00:00.250Z")).unwrap();
    let offset = normalize(&json!("2024-01-05T12:00:00.250+02:00")).unwrap();
    assert_eq!(structured, iso);
    assert_eq!(iso, offset);

    let minute = normalize(&json!({ "seconds": 1_704_448_800 })).unwrap();
    for raw in [
      "2024-01-05T10:00:00Z",
      "2024-01-05T10:00:00.000Z",
      "2024-01-05T10:00:00",
      "2024-01-05T10:00Z",
      "2024-01-05T10:00",
      "2024-01-05T12:00+02:00",
      "2024-01-05T05:30-04:30",
    ] {
      assert_eq!(normalize(&json!(raw)), Ok(minute), "{raw}");
    }
  }

  #[test]
  fn export_style_keys_are_accepted() {
    let a = normalize(&json!({ "_seconds": 1_704_448_800, "_nanoseconds": 0 })).unwrap();
    let b = normalize(&json!("2024-01-05T10:00:00Z")).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn sub_millisecond_precision_is_dropped() {
    let a = normalize(&json!({ "seconds": 10, "nanoseconds": 1_999_999 })).unwrap();
    let b = normalize(&json!({ "seconds": 10, "nanoseconds": 1_000_000 })).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.timestamp_millis(), 10_001);
  }

  #[test]
  fn date_only_and_naive_strings_read_as_utc() {
    let date = normalize(&json!("2024-03-01")).unwrap();
    let naive = normalize(&json!("2024-03-01T00:00:00")).unwrap();
    let expected = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    assert_eq!(date.as_datetime(), expected);
    assert_eq!(naive, date);
  }

  #[test]
  fn rejects_everything_else() {
    assert_eq!(normalize(&Value::Null), Err(InvalidTime::Missing));
    assert_eq!(normalize(&json!("")), Err(InvalidTime::Missing));
    assert!(matches!(normalize(&json!("yesterday")), Err(InvalidTime::Unparsable(_))));
    assert!(matches!(normalize(&json!(1_704_448_800)), Err(InvalidTime::Unsupported(_))));
    assert!(matches!(normalize(&json!({ "nanoseconds": 5 })), Err(InvalidTime::Unsupported(_))));
    assert_eq!(
      normalize(&json!({ "seconds": 1, "nanoseconds": 1_000_000_000u64 })),
      Err(InvalidTime::OutOfRange)
    );
  }

  #[test]
  fn denormalize_round_trips() {
    let t = normalize(&json!({ "seconds": 1_700_000_000, "nanoseconds": 123_456_789 })).unwrap();
    let rendered = denormalize(t);
    assert_eq!(rendered, "2023-11-14T22:13:20.123Z");
    assert_eq!(normalize(&json!(rendered)).unwrap(), t);
    let structured = json!({ "seconds": t.as_datetime().timestamp(), "nanoseconds": 123_000_000 });
    assert_eq!(normalize(&structured).unwrap(), t);
  }

  #[test]
  fn serde_uses_the_display_form() {
    let t = normalize(&json!("2024-01-05T10:00:00Z")).unwrap();
    let encoded = serde_json::to_value(t).unwrap();
    assert_eq!(encoded, json!("2024-01-05T10:00:00.000Z"));
    let decoded: NormalizedTime = serde_json::from_value(encoded).unwrap();
    assert_eq!(decoded, t);
  }
}
