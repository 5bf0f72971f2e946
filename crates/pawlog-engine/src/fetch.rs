//! Per-category event retrieval.
//!
//! One store query per `(subject, category)`. Documents that fail to decode
//! are skipped and counted, never surfaced as errors: a bad `eventDate`
//! counts as `invalid_time`, anything else as `malformed`.

use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use pawlog_core::{
  event::{Category, Event},
  store::{DocRef, Document, EntityStore, OWNER_FIELD, SUBJECT_FIELD},
  subject::{Subject, UNKNOWN_NAME},
};

use crate::BoxError;

/// A category's store query failed. The other categories are unaffected.
#[derive(Debug, Error)]
#[error("fetching {category} events failed")]
pub struct FetchError {
  pub category: Category,
  #[source]
  pub source:   BoxError,
}

/// The decoded events of one category, ascending by `(time, id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedEvents {
  pub category:     Category,
  pub events:       Vec<Event>,
  /// Documents skipped because their event time could not be normalized.
  pub invalid_time: usize,
  /// Documents skipped for any other decoding failure.
  pub malformed:    usize,
}

/// An event together with the display name of its subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedEvent {
  #[serde(flatten)]
  pub event:        Event,
  pub subject_name: String,
}

pub struct EventFetcher<S> {
  store: Arc<S>,
}

impl<S> Clone for EventFetcher<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: EntityStore> EventFetcher<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Every decodable `category` event recorded for `subject_id`.
  pub async fn fetch(
    &self,
    subject_id: &str,
    category: Category,
  ) -> Result<FetchedEvents, FetchError> {
    let subject = DocRef::subject(subject_id);
    let docs = self
      .store
      .query_by_reference(category.collection(), SUBJECT_FIELD, &subject)
      .await
      .map_err(|e| FetchError { category, source: Box::new(e) })?;

    let mut fetched = decode_all(category, &docs);
    fetched.events.sort_by(|a, b| {
      (a.occurred_at, a.event_id.as_str()).cmp(&(b.occurred_at, b.event_id.as_str()))
    });
    debug!(
      subject = subject_id,
      %category,
      count = fetched.events.len(),
      invalid_time = fetched.invalid_time,
      malformed = fetched.malformed,
      "fetched events"
    );
    Ok(fetched)
  }

  /// Like [`EventFetcher::fetch`], with each event carrying the subject's
  /// name. The subject is dereferenced once; an unknown subject or a failed
  /// lookup yields [`UNKNOWN_NAME`].
  pub async fn fetch_enriched(
    &self,
    subject_id: &str,
    category: Category,
  ) -> Result<Vec<EnrichedEvent>, FetchError> {
    let fetched = self.fetch(subject_id, category).await?;
    if fetched.events.is_empty() {
      return Ok(Vec::new());
    }
    let name = self.subject_name(&DocRef::subject(subject_id)).await;
    Ok(
      fetched
        .events
        .into_iter()
        .map(|event| EnrichedEvent { event, subject_name: name.clone() })
        .collect(),
    )
  }

  /// Every decodable `category` event recorded by `owner_id`, across all of
  /// their subjects, newest first. Each distinct subject is resolved once.
  pub async fn fetch_for_owner(
    &self,
    owner_id: &str,
    category: Category,
  ) -> Result<Vec<EnrichedEvent>, FetchError> {
    let owner = DocRef::owner(owner_id);
    let docs = self
      .store
      .query_by_reference(category.collection(), OWNER_FIELD, &owner)
      .await
      .map_err(|e| FetchError { category, source: Box::new(e) })?;

    let mut fetched = decode_all(category, &docs);
    fetched.events.sort_by(|a, b| {
      (b.occurred_at, b.event_id.as_str()).cmp(&(a.occurred_at, a.event_id.as_str()))
    });

    let mut names: HashMap<DocRef, String> = HashMap::new();
    let mut enriched = Vec::with_capacity(fetched.events.len());
    for event in fetched.events {
      let subject_name = match names.get(&event.subject) {
        Some(name) => name.clone(),
        None => {
          let name = self.subject_name(&event.subject).await;
          names.insert(event.subject.clone(), name.clone());
          name
        }
      };
      enriched.push(EnrichedEvent { event, subject_name });
    }
    debug!(owner = owner_id, %category, count = enriched.len(), "fetched owner events");
    Ok(enriched)
  }

  /// Fetch every aggregated category concurrently. Results come back in
  /// [`Category::AGGREGATED`] order whatever order the queries finish in.
  pub async fn fetch_all(
    &self,
    subject_id: &str,
  ) -> Vec<(Category, Result<FetchedEvents, FetchError>)> {
    let [behavior, diet, exercise, health, wellness] = Category::AGGREGATED;
    let (b, d, e, h, w) = tokio::join!(
      self.fetch(subject_id, behavior),
      self.fetch(subject_id, diet),
      self.fetch(subject_id, exercise),
      self.fetch(subject_id, health),
      self.fetch(subject_id, wellness),
    );
    vec![(behavior, b), (diet, d), (exercise, e), (health, h), (wellness, w)]
  }

  async fn subject_name(&self, reference: &DocRef) -> String {
    match self.store.dereference(reference).await {
      Ok(Some(doc)) => match Subject::from_document(&doc) {
        Ok(subject) => subject.display_name().to_owned(),
        Err(error) => {
          warn!(subject = %reference, %error, "subject profile is malformed");
          UNKNOWN_NAME.to_owned()
        }
      },
      Ok(None) => UNKNOWN_NAME.to_owned(),
      Err(error) => {
        warn!(subject = %reference, %error, "subject lookup failed");
        UNKNOWN_NAME.to_owned()
      }
    }
  }
}

fn decode_all(category: Category, docs: &[Document]) -> FetchedEvents {
  let mut fetched = FetchedEvents {
    category,
    events: Vec::with_capacity(docs.len()),
    invalid_time: 0,
    malformed: 0,
  };
  for doc in docs {
    match Event::from_document(category, doc) {
      Ok(event) => fetched.events.push(event),
      Err(error) if error.is_invalid_time() => {
        debug!(event = %doc.reference, %error, "skipping event with invalid time");
        fetched.invalid_time += 1;
      }
      Err(error) => {
        warn!(event = %doc.reference, %error, "skipping malformed event");
        fetched.malformed += 1;
      }
    }
  }
  fetched
}
