//! Retrieval context for the chat assistant.
//!
//! A [`RetrievalContext`] is a closed projection of one subject and its
//! recent events. Only the fields named by the projection structs below are
//! ever copied in; owner references, audit timestamps, image URLs and any
//! other stored field stay behind.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use pawlog_core::{
  event::{Event, EventPayload, MentalState},
  store::{DocRef, EntityStore},
  subject::Subject,
  time::NormalizedTime,
};

use crate::{
  BoxError,
  fetch::{EventFetcher, FetchError, FetchedEvents},
};

// ─── Limits ──────────────────────────────────────────────────────────────────

/// Bounds applied to every context. Loaded from the `[context]` config
/// section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextLimits {
  /// Most recent events kept per category.
  pub max_events_per_category: usize,
  /// Notes longer than this many characters are cut.
  pub max_note_chars:          usize,
}

impl Default for ContextLimits {
  fn default() -> Self { Self { max_events_per_category: 25, max_note_chars: 280 } }
}

// ─── Projections ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectProjection {
  pub id:     String,
  pub name:   Option<String>,
  pub breed:  Option<String>,
  pub age:    Option<f64>,
  pub sex:    Option<String>,
  pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DietProjection {
  pub food_type:      String,
  pub brand_name:     Option<String>,
  pub quantity_grams: f64,
  pub event_date:     NormalizedTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BehaviorProjection {
  pub behavior_type: String,
  pub severity:      u8,
  pub notes:         Option<String>,
  pub event_date:    NormalizedTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExerciseProjection {
  pub activity_type:    String,
  pub duration_minutes: f64,
  pub distance:         Option<f64>,
  pub source:           Option<String>,
  pub event_date:       NormalizedTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthProjection {
  pub event_type: String,
  pub severity:   u8,
  pub notes:      Option<String>,
  pub event_date: NormalizedTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WellnessProjection {
  pub mental_state: MentalState,
  pub severity:     u8,
  pub notes:        Option<String>,
  pub event_date:   NormalizedTime,
}

/// Everything the assistant sees about a subject. Lists are newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalContext {
  pub subject:         SubjectProjection,
  pub behavior_events: Vec<BehaviorProjection>,
  pub diet_events:     Vec<DietProjection>,
  pub exercise_events: Vec<ExerciseProjection>,
  pub health_events:   Vec<HealthProjection>,
  pub wellness_events: Vec<WellnessProjection>,
  /// Events dropped by [`ContextLimits::max_events_per_category`].
  pub omitted_events:  usize,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ContextError {
  #[error("subject {0:?} not found")]
  SubjectNotFound(String),

  #[error("subject profile is invalid: {0}")]
  InvalidSubject(#[source] pawlog_core::Error),

  #[error(transparent)]
  FetchFailed(#[from] FetchError),

  #[error("subject lookup failed: {0}")]
  Store(#[source] BoxError),
}

// ─── Builder ─────────────────────────────────────────────────────────────────

pub struct ContextBuilder<S> {
  fetcher: EventFetcher<S>,
  limits:  ContextLimits,
}

impl<S: EntityStore> ContextBuilder<S> {
  pub fn new(store: Arc<S>, limits: ContextLimits) -> Self {
    Self { fetcher: EventFetcher::new(store), limits }
  }

  /// Assemble the context for `subject_id`. The subject is resolved before
  /// any event query; if any category fails the whole build fails.
  pub async fn build(&self, subject_id: &str) -> Result<RetrievalContext, ContextError> {
    let doc = self
      .fetcher
      .store()
      .dereference(&DocRef::subject(subject_id))
      .await
      .map_err(|e| ContextError::Store(Box::new(e)))?
      .ok_or_else(|| ContextError::SubjectNotFound(subject_id.to_owned()))?;
    let subject = Subject::from_document(&doc).map_err(ContextError::InvalidSubject)?;

    let mut context = RetrievalContext {
      subject:         SubjectProjection {
        id:     subject.subject_id,
        name:   subject.name,
        breed:  subject.breed,
        age:    subject.age,
        sex:    subject.sex,
        weight: subject.weight,
      },
      behavior_events: Vec::new(),
      diet_events:     Vec::new(),
      exercise_events: Vec::new(),
      health_events:   Vec::new(),
      wellness_events: Vec::new(),
      omitted_events:  0,
    };

    for (_, result) in self.fetcher.fetch_all(subject_id).await {
      let FetchedEvents { events, .. } = result?;
      let kept = self.limits.max_events_per_category;
      context.omitted_events += events.len().saturating_sub(kept);
      // Fetched events are ascending; take the tail, newest first.
      for event in events.into_iter().rev().take(kept) {
        self.project(&mut context, event);
      }
    }

    debug!(
      subject = subject_id,
      behavior = context.behavior_events.len(),
      diet = context.diet_events.len(),
      exercise = context.exercise_events.len(),
      health = context.health_events.len(),
      wellness = context.wellness_events.len(),
      omitted = context.omitted_events,
      "built retrieval context"
    );
    Ok(context)
  }

  fn project(&self, context: &mut RetrievalContext, event: Event) {
    let event_date = event.occurred_at;
    match event.payload {
      EventPayload::Behavior(b) => context.behavior_events.push(BehaviorProjection {
        behavior_type: b.behavior_type,
        severity: b.severity.get(),
        notes: self.note(b.notes),
        event_date,
      }),
      EventPayload::Diet(d) => context.diet_events.push(DietProjection {
        food_type: d.food_type,
        brand_name: d.brand_name,
        quantity_grams: d.quantity_grams,
        event_date,
      }),
      EventPayload::Exercise(e) => context.exercise_events.push(ExerciseProjection {
        activity_type: e.activity_type,
        duration_minutes: e.duration_minutes,
        distance: e.distance,
        source: e.source,
        event_date,
      }),
      EventPayload::Health(h) => context.health_events.push(HealthProjection {
        event_type: h.event_type,
        severity: h.severity.get(),
        notes: self.note(h.notes),
        event_date,
      }),
      EventPayload::Wellness(w) => context.wellness_events.push(WellnessProjection {
        mental_state: w.mental_state,
        severity: w.severity.get(),
        notes: self.note(w.notes),
        event_date,
      }),
      // Schedules are plans, not observations.
      EventPayload::DietSchedule(_) => {}
    }
  }

  fn note(&self, notes: Option<String>) -> Option<String> {
    notes.map(|n| truncate_chars(n, self.limits.max_note_chars))
  }
}

fn truncate_chars(mut s: String, max: usize) -> String {
  if let Some((cut, _)) = s.char_indices().nth(max) {
    s.truncate(cut);
  }
  s
}
