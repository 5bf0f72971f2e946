//! The `EntityStore` trait and the document model it serves.
//!
//! Storage backends (e.g. `pawlog-store-sqlite`) implement the trait. The
//! aggregation engine depends only on this abstraction: two read operations,
//! "find every document in a collection whose field equals a reference" and
//! "dereference a stored reference".

use std::{fmt, future::Future, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

// ─── Well-known names ────────────────────────────────────────────────────────

/// Collection holding subject (dog) profiles.
pub const SUBJECTS: &str = "dogs";
/// Collection holding user profiles.
pub const OWNERS: &str = "users";

/// Field on every event that references its subject.
pub const SUBJECT_FIELD: &str = "dogId";
/// Field on every event that references the owning user.
pub const OWNER_FIELD: &str = "userId";

/// Key of the single-entry object that encodes a reference inside a
/// document body, e.g. `{"__ref__": "dogs/rex"}`.
pub const REF_KEY: &str = "__ref__";

// ─── DocRef ──────────────────────────────────────────────────────────────────

/// A pointer to a document: `(collection, id)`, written `collection/id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocRef {
  pub collection: String,
  pub id:         String,
}

impl DocRef {
  pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
    Self { collection: collection.into(), id: id.into() }
  }

  /// Reference to a subject document.
  pub fn subject(id: impl Into<String>) -> Self { Self::new(SUBJECTS, id) }

  /// Reference to an owner document.
  pub fn owner(id: impl Into<String>) -> Self { Self::new(OWNERS, id) }

  /// The path string stored under [`REF_KEY`].
  pub fn path(&self) -> String { format!("{}/{}", self.collection, self.id) }

  /// Encode as the in-document reference object.
  pub fn to_value(&self) -> Value {
    let mut map = Map::new();
    map.insert(REF_KEY.to_owned(), Value::String(self.path()));
    Value::Object(map)
  }

  /// Decode the in-document reference object.
  pub fn from_value(value: &Value) -> Result<Self> {
    value
      .as_object()
      .and_then(|m| m.get(REF_KEY))
      .and_then(Value::as_str)
      .ok_or_else(|| Error::InvalidReference(value.to_string()))?
      .parse()
  }
}

impl fmt::Display for DocRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.collection, self.id)
  }
}

impl FromStr for DocRef {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.split_once('/') {
      Some((collection, id))
        if !collection.is_empty() && !id.is_empty() && !id.contains('/') =>
      {
        Ok(Self::new(collection, id))
      }
      _ => Err(Error::InvalidReference(s.to_owned())),
    }
  }
}

impl TryFrom<String> for DocRef {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<DocRef> for String {
  fn from(r: DocRef) -> Self { r.path() }
}

// ─── Document ────────────────────────────────────────────────────────────────

/// A stored document: its own reference plus an untyped field map.
///
/// Typed views (events, subjects) are decoded from documents on read; the
/// accessors below return [`Error`] values that name the offending field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
  pub reference: DocRef,
  #[serde(default)]
  pub fields:    Map<String, Value>,
}

impl Document {
  pub fn new(reference: DocRef, fields: Map<String, Value>) -> Self {
    Self { reference, fields }
  }

  pub fn id(&self) -> &str { &self.reference.id }

  /// The raw value of `field`; JSON `null` counts as absent.
  pub fn get(&self, field: &str) -> Option<&Value> {
    self.fields.get(field).filter(|v| !v.is_null())
  }

  pub fn str_field(&self, field: &'static str) -> Result<&str> {
    self.opt_str(field)?.ok_or(Error::MissingField(field))
  }

  pub fn opt_str(&self, field: &'static str) -> Result<Option<&str>> {
    match self.get(field) {
      None => Ok(None),
      Some(Value::String(s)) => Ok(Some(s.as_str())),
      Some(_) => Err(Error::WrongType { field, expected: "string" }),
    }
  }

  pub fn number(&self, field: &'static str) -> Result<f64> {
    self.opt_number(field)?.ok_or(Error::MissingField(field))
  }

  /// Numbers are accepted either as JSON numbers or numeric strings, since
  /// form handlers have written both.
  pub fn opt_number(&self, field: &'static str) -> Result<Option<f64>> {
    let n = match self.get(field) {
      None => return Ok(None),
      Some(Value::Number(n)) => n.as_f64(),
      Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
      Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
      Some(_) => None,
    };
    n.filter(|n| n.is_finite())
      .map(Some)
      .ok_or(Error::WrongType { field, expected: "number" })
  }

  pub fn reference(&self, field: &'static str) -> Result<DocRef> {
    self.opt_reference(field)?.ok_or(Error::MissingField(field))
  }

  pub fn opt_reference(&self, field: &'static str) -> Result<Option<DocRef>> {
    self.get(field).map(DocRef::from_value).transpose()
  }

  /// An array of references; a single reference is accepted as a
  /// one-element list.
  pub fn references(&self, field: &'static str) -> Result<Vec<DocRef>> {
    match self.get(field) {
      None => Ok(Vec::new()),
      Some(Value::Array(items)) => items.iter().map(DocRef::from_value).collect(),
      Some(single) => Ok(vec![DocRef::from_value(single)?]),
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the document store holding subjects, owners and events.
///
/// The pipeline only ever reads. All methods return `Send` futures so the
/// trait can be used from multi-threaded async runtimes and fanned out with
/// `tokio::join!`.
pub trait EntityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Every document in `collection` whose `field` holds `reference`.
  /// Order is unspecified.
  fn query_by_reference<'a>(
    &'a self,
    collection: &'a str,
    field: &'a str,
    reference: &'a DocRef,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + 'a;

  /// Load the document `reference` points to. Returns `None` if not found.
  fn dereference<'a>(
    &'a self,
    reference: &'a DocRef,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + 'a;
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn doc(fields: Value) -> Document {
    let Value::Object(map) = fields else { panic!("object expected") };
    Document::new(DocRef::new("dietEvents", "d1"), map)
  }

  #[test]
  fn docref_parses_and_displays() {
    let r: DocRef = "dogs/rex".parse().unwrap();
    assert_eq!(r, DocRef::subject("rex"));
    assert_eq!(r.to_string(), "dogs/rex");
    assert!("dogs".parse::<DocRef>().is_err());
    assert!("dogs/".parse::<DocRef>().is_err());
    assert!("dogs/a/b".parse::<DocRef>().is_err());
  }

  #[test]
  fn docref_value_encoding() {
    let r = DocRef::owner("u1");
    assert_eq!(r.to_value(), json!({ "__ref__": "users/u1" }));
    assert_eq!(DocRef::from_value(&r.to_value()).unwrap(), r);
    assert!(DocRef::from_value(&json!("users/u1")).is_err());
  }

  #[test]
  fn field_accessors() {
    let d = doc(json!({
      "foodType": "kibble",
      "quantity": "200",
      "brandName": null,
      "dogId": { "__ref__": "dogs/rex" },
      "owners": [{ "__ref__": "users/a" }, { "__ref__": "users/b" }],
    }));

    assert_eq!(d.str_field("foodType").unwrap(), "kibble");
    assert_eq!(d.number("quantity").unwrap(), 200.0);
    assert_eq!(d.opt_str("brandName").unwrap(), None);
    assert!(matches!(d.str_field("brandName"), Err(Error::MissingField("brandName"))));
    assert!(matches!(d.number("foodType"), Err(Error::WrongType { field: "foodType", .. })));
    assert_eq!(d.reference("dogId").unwrap(), DocRef::subject("rex"));
    assert_eq!(d.references("owners").unwrap().len(), 2);
    assert!(d.references("missing").unwrap().is_empty());
  }
}
