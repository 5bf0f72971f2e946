//! In-memory [`EntityStore`] for engine tests.
//!
//! Counts calls, can be told to fail specific collections, and can delay
//! individual collections so tests control fetch completion order.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use pawlog_core::{
  event::Category,
  store::{DocRef, Document, EntityStore},
};
use serde_json::{Map, Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0} is unavailable")]
pub struct Unavailable(pub String);

#[derive(Default)]
pub struct MemoryStore {
  docs:    Mutex<Vec<Document>>,
  failing: Mutex<HashSet<String>>,
  delays:  Mutex<HashMap<String, Duration>>,
  queries: AtomicUsize,
  lookups: AtomicUsize,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  pub fn put(&self, doc: Document) { self.docs.lock().unwrap().push(doc); }

  pub fn fail(&self, category: Category) {
    self.failing.lock().unwrap().insert(category.collection().to_owned());
  }

  pub fn fail_collection(&self, collection: &str) {
    self.failing.lock().unwrap().insert(collection.to_owned());
  }

  pub fn delay(&self, category: Category, millis: u64) {
    self
      .delays
      .lock()
      .unwrap()
      .insert(category.collection().to_owned(), Duration::from_millis(millis));
  }

  pub fn query_count(&self) -> usize { self.queries.load(Ordering::SeqCst) }

  pub fn lookup_count(&self) -> usize { self.lookups.load(Ordering::SeqCst) }
}

impl EntityStore for MemoryStore {
  type Error = Unavailable;

  async fn query_by_reference(
    &self,
    collection: &str,
    field: &str,
    reference: &DocRef,
  ) -> Result<Vec<Document>, Unavailable> {
    self.queries.fetch_add(1, Ordering::SeqCst);
    let delay = self.delays.lock().unwrap().get(collection).copied();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    if self.failing.lock().unwrap().contains(collection) {
      return Err(Unavailable(collection.to_owned()));
    }
    let docs = self.docs.lock().unwrap();
    Ok(
      docs
        .iter()
        .filter(|d| d.reference.collection == collection)
        .filter(|d| d.fields.get(field).and_then(|v| DocRef::from_value(v).ok()).as_ref() == Some(reference))
        .cloned()
        .collect(),
    )
  }

  async fn dereference(&self, reference: &DocRef) -> Result<Option<Document>, Unavailable> {
    self.lookups.fetch_add(1, Ordering::SeqCst);
    if self.failing.lock().unwrap().contains(&reference.collection) {
      return Err(Unavailable(reference.collection.clone()));
    }
    let docs = self.docs.lock().unwrap();
    Ok(docs.iter().find(|d| &d.reference == reference).cloned())
  }
}

// ─── Document builders ───────────────────────────────────────────────────────

pub fn object(value: Value) -> Map<String, Value> {
  match value {
    Value::Object(map) => map,
    other => panic!("object expected, got {other}"),
  }
}

pub fn dog(id: &str, name: &str) -> Document {
  Document::new(
    DocRef::subject(id),
    object(json!({
      "name": name,
      "breed": "Beagle",
      "age": 4,
      "weight": 22,
      "sex": "male",
      "userId": DocRef::owner("u1").to_value(),
      "email": "owner@example.com",
    })),
  )
}

/// An event document for `dog` in `category`'s collection, with the common
/// envelope fields filled in and `extra` merged on top.
pub fn event(category: Category, id: &str, dog: &str, event_date: Value, extra: Value) -> Document {
  let mut fields = object(json!({
    "dogId": DocRef::subject(dog).to_value(),
    "userId": DocRef::owner("u1").to_value(),
    "eventDate": event_date,
    "createdAt": { "seconds": 1_700_000_000, "nanoseconds": 0 },
  }));
  fields.extend(object(extra));
  Document::new(DocRef::new(category.collection(), id), fields)
}

pub fn exercise(id: &str, dog: &str, at: &str, minutes: f64) -> Document {
  event(Category::Exercise, id, dog, json!(at), json!({
    "activityType": "walk",
    "duration": minutes,
    "source": "manual",
  }))
}

pub fn diet(id: &str, dog: &str, at: &str, food: &str, quantity: f64) -> Document {
  event(Category::Diet, id, dog, json!(at), json!({
    "foodType": food,
    "brandName": "Acme",
    "quantity": quantity,
    "dogImageUrl": "https://example.com/rex.png",
  }))
}

pub fn wellness(id: &str, dog: &str, at: &str, severity: u8) -> Document {
  event(Category::Wellness, id, dog, json!(at), json!({
    "mentalState": "anxious",
    "severity": severity,
    "notes": "paced all evening",
  }))
}

pub fn health(id: &str, dog: &str, at: &str, severity: u8) -> Document {
  event(Category::Health, id, dog, json!(at), json!({
    "eventType": "vomiting",
    "severity": severity,
    "notes": "after dinner",
  }))
}

pub fn behavior(id: &str, dog: &str, at: &str) -> Document {
  event(Category::Behavior, id, dog, json!(at), json!({
    "behaviorType": "barking",
    "severity": 4,
  }))
}
