//! Event types — one variant per category, sharing a common envelope.
//!
//! Each category lives in its own collection in the document store. On read,
//! a document is decoded into an [`Event`] whose [`EventPayload`] variant is
//! the category tag: the tag cannot be changed without building a new event,
//! and every consumer dispatches on it with an exhaustive `match`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
  Error, Result,
  store::{DocRef, Document, OWNER_FIELD, SUBJECT_FIELD},
  time::{InvalidTime, NormalizedTime, normalize},
};

// ─── Category ────────────────────────────────────────────────────────────────

/// The event kinds. Variants are declared in tag order, so the derived `Ord`
/// sorts categories alphabetically by their tag.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
  Behavior,
  Diet,
  DietSchedule,
  Exercise,
  Health,
  Wellness,
}

impl Category {
  /// Categories fanned out by dashboards and chat context.
  pub const AGGREGATED: [Category; 5] = [
    Category::Behavior,
    Category::Diet,
    Category::Exercise,
    Category::Health,
    Category::Wellness,
  ];

  /// Name of the collection holding this category's documents.
  pub fn collection(self) -> &'static str {
    match self {
      Self::Behavior => "behaviorEvents",
      Self::Diet => "dietEvents",
      Self::DietSchedule => "dietScheduleEvents",
      Self::Exercise => "exerciseEvents",
      Self::Health => "healthEvents",
      Self::Wellness => "wellnessEvents",
    }
  }

  pub fn tag(self) -> &'static str { self.into() }
}

// ─── Shared value types ──────────────────────────────────────────────────────

/// A reported severity on the 1 (mild) to 10 (severe) scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Severity(u8);

impl Severity {
  pub const MIN: u8 = 1;
  pub const MAX: u8 = 10;

  pub fn new(value: f64) -> Result<Self> {
    if value.fract() == 0.0 && (f64::from(Self::MIN)..=f64::from(Self::MAX)).contains(&value) {
      Ok(Self(value as u8))
    } else {
      Err(Error::SeverityOutOfRange(value))
    }
  }

  pub fn get(self) -> u8 { self.0 }
}

impl TryFrom<u8> for Severity {
  type Error = Error;

  fn try_from(v: u8) -> Result<Self> { Self::new(f64::from(v)) }
}

impl From<Severity> for u8 {
  fn from(s: Severity) -> Self { s.0 }
}

/// The closed set of mental states a wellness entry can record.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MentalState {
  Depressed,
  Anxious,
  Lethargic,
  Happy,
  Loving,
  Nervous,
}

/// A feeding slot of a diet schedule.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum FeedingSlot {
  Morning,
  Evening,
  AllDay,
}

/// A non-empty set of feeding slots in which `AllDay` never co-occurs with
/// another slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FeedingSlot>", into = "Vec<FeedingSlot>")]
pub struct FeedingTimes(BTreeSet<FeedingSlot>);

impl FeedingTimes {
  pub fn new(slots: impl IntoIterator<Item = FeedingSlot>) -> Result<Self> {
    let slots: BTreeSet<_> = slots.into_iter().collect();
    if slots.is_empty() {
      return Err(Error::InvalidFeedingTimes("no feeding time given".into()));
    }
    if slots.contains(&FeedingSlot::AllDay) && slots.len() > 1 {
      return Err(Error::InvalidFeedingTimes(
        "allDay cannot be combined with other feeding times".into(),
      ));
    }
    Ok(Self(slots))
  }
}

impl TryFrom<Vec<FeedingSlot>> for FeedingTimes {
  type Error = Error;

  fn try_from(v: Vec<FeedingSlot>) -> Result<Self> { Self::new(v) }
}

impl From<FeedingTimes> for Vec<FeedingSlot> {
  fn from(t: FeedingTimes) -> Self { t.0.into_iter().collect() }
}

// ─── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
  pub behavior_type: String,
  pub severity:      Severity,
  pub notes:         Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseEvent {
  pub activity_type:    String,
  pub duration_minutes: f64,
  pub distance:         Option<f64>,
  /// Where the activity was recorded from (manual entry, a tracker, ...).
  pub source:           Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietEvent {
  pub food_type:      String,
  pub brand_name:     Option<String>,
  pub quantity_grams: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietScheduleEvent {
  pub schedule_name:  String,
  pub feeding_times:  FeedingTimes,
  pub food_type:      String,
  pub brand_name:     Option<String>,
  pub quantity_grams: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellnessEvent {
  pub mental_state: MentalState,
  pub severity:     Severity,
  pub notes:        Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEvent {
  pub event_type: String,
  pub severity:   Severity,
  pub notes:      Option<String>,
}

/// The typed payload of an event. The variant is the category tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
  Behavior(BehaviorEvent),
  Diet(DietEvent),
  DietSchedule(DietScheduleEvent),
  Exercise(ExerciseEvent),
  Health(HealthEvent),
  Wellness(WellnessEvent),
}

impl EventPayload {
  pub fn category(&self) -> Category {
    match self {
      Self::Behavior(_) => Category::Behavior,
      Self::Diet(_) => Category::Diet,
      Self::DietSchedule(_) => Category::DietSchedule,
      Self::Exercise(_) => Category::Exercise,
      Self::Health(_) => Category::Health,
      Self::Wellness(_) => Category::Wellness,
    }
  }

  /// Decode the category-specific fields of a stored document.
  pub fn from_document(category: Category, doc: &Document) -> Result<Self> {
    Ok(match category {
      Category::Behavior => Self::Behavior(BehaviorEvent {
        behavior_type: doc.str_field("behaviorType")?.to_owned(),
        severity:      severity(doc)?,
        notes:         text(doc, "notes")?,
      }),
      Category::Diet => Self::Diet(DietEvent {
        food_type:      doc.str_field("foodType")?.to_owned(),
        brand_name:     text(doc, "brandName")?,
        quantity_grams: doc.number("quantity")?,
      }),
      Category::DietSchedule => {
        let raw = doc
          .get("feedingTimes")
          .ok_or(Error::MissingField("feedingTimes"))?;
        let slots: Vec<FeedingSlot> = serde_json::from_value(raw.clone())
          .map_err(|e| Error::InvalidFeedingTimes(e.to_string()))?;
        Self::DietSchedule(DietScheduleEvent {
          schedule_name:  doc.str_field("scheduleName")?.to_owned(),
          feeding_times:  FeedingTimes::new(slots)?,
          food_type:      doc.str_field("foodType")?.to_owned(),
          brand_name:     text(doc, "brandName")?,
          quantity_grams: doc.number("quantity")?,
        })
      }
      Category::Exercise => {
        let duration = doc.number("duration")?;
        if duration < 0.0 {
          return Err(Error::NegativeDuration(duration));
        }
        Self::Exercise(ExerciseEvent {
          activity_type:    doc.str_field("activityType")?.to_owned(),
          duration_minutes: duration,
          distance:         doc.opt_number("distance")?,
          source:           text(doc, "source")?,
        })
      }
      Category::Health => Self::Health(HealthEvent {
        event_type: doc.str_field("eventType")?.to_owned(),
        severity:   severity(doc)?,
        notes:      text(doc, "notes")?,
      }),
      Category::Wellness => {
        let state = doc.str_field("mentalState")?;
        Self::Wellness(WellnessEvent {
          mental_state: state
            .trim()
            .parse()
            .map_err(|_| Error::UnknownMentalState(state.to_owned()))?,
          severity:     severity(doc)?,
          notes:        text(doc, "notes")?,
        })
      }
    })
  }
}

/// Older behavior entries store the value under `severityLevel`.
fn severity(doc: &Document) -> Result<Severity> {
  let raw = match doc.opt_number("severity")? {
    Some(v) => v,
    None => doc.number("severityLevel").map_err(|e| match e {
      Error::MissingField(_) => Error::MissingField("severity"),
      other => other,
    })?,
  };
  Severity::new(raw)
}

fn text(doc: &Document, field: &'static str) -> Result<Option<String>> {
  Ok(
    doc
      .opt_str(field)?
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_owned),
  )
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A decoded event: the common envelope plus its typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
  pub event_id:    String,
  pub subject:     DocRef,
  pub owner:       Option<DocRef>,
  /// When the event happened; the ordering key.
  pub occurred_at: NormalizedTime,
  pub created_at:  Option<NormalizedTime>,
  pub updated_at:  Option<NormalizedTime>,
  #[serde(flatten)]
  pub payload:     EventPayload,
}

impl Event {
  pub fn category(&self) -> Category { self.payload.category() }

  /// Decode a document from `category`'s collection.
  ///
  /// The event time is checked first, so a document with an unusable
  /// `eventDate` always fails with [`Error::InvalidTime`] regardless of its
  /// other fields. Unparsable audit timestamps (`createdAt`, `updatedAt`)
  /// are dropped rather than failing the event.
  pub fn from_document(category: Category, doc: &Document) -> Result<Self> {
    let occurred_at = doc
      .get("eventDate")
      .ok_or(InvalidTime::Missing)
      .and_then(normalize)?;

    Ok(Self {
      event_id: doc.id().to_owned(),
      subject: doc.reference(SUBJECT_FIELD)?,
      owner: doc.opt_reference(OWNER_FIELD)?,
      occurred_at,
      created_at: doc.get("createdAt").and_then(|v| normalize(v).ok()),
      updated_at: doc.get("updatedAt").and_then(|v| normalize(v).ok()),
      payload: EventPayload::from_document(category, doc)?,
    })
  }

  /// Total order used wherever events from several categories are merged:
  /// time, then category tag, then event id.
  pub fn merge_key(&self) -> (NormalizedTime, Category, &str) {
    (self.occurred_at, self.category(), self.event_id.as_str())
  }
}
