//! Dashboard aggregation: fan out over the categories, merge, score.

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::Arc,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use pawlog_core::{
  event::{Category, Event, EventPayload},
  score,
  store::EntityStore,
  time::NormalizedTime,
};

use crate::fetch::{EventFetcher, FetchError, FetchedEvents};

// ─── Types ───────────────────────────────────────────────────────────────────

/// Inclusive bounds on event time. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
  pub since: Option<NormalizedTime>,
  pub until: Option<NormalizedTime>,
}

impl TimeWindow {
  pub fn contains(&self, time: NormalizedTime) -> bool {
    self.since.is_none_or(|s| time >= s) && self.until.is_none_or(|u| time <= u)
  }

  pub fn is_unbounded(&self) -> bool { self.since.is_none() && self.until.is_none() }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
  pub time:     NormalizedTime,
  pub category: Category,
  pub event_id: String,
  pub score:    f64,
}

/// Earliest and latest event time actually observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
  pub start: NormalizedTime,
  pub end:   NormalizedTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategorySummary {
  /// `false` when the category could not be fetched.
  pub available:     bool,
  pub count:         usize,
  /// Contribution of the most recent event, if any.
  pub current_score: Option<f64>,
  pub latest_at:     Option<NormalizedTime>,
  pub invalid_time:  usize,
  pub malformed:     usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedView {
  pub subject_id:    String,
  pub window:        Option<TimeWindow>,
  pub range:         Option<TimeRange>,
  pub trend:         Vec<TrendPoint>,
  /// Mean of the composite slots' current scores.
  pub current_score: f64,
  pub categories:    BTreeMap<Category, CategorySummary>,
}

#[derive(Debug, Error)]
pub enum AggregateError {
  /// Some categories could not be fetched. `succeeded` is the view built
  /// from the rest; the failed categories count as empty.
  #[error("{} categories unavailable", failed.len())]
  PartialFailure {
    succeeded: Box<AggregatedView>,
    failed:    BTreeSet<Category>,
  },
}

/// A diet event as shown on the diet dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DietEntry {
  pub event_id:       String,
  pub time:           NormalizedTime,
  pub quantity_grams: f64,
  pub brand_name:     Option<String>,
}

/// Diet entries keyed by food type, each list ascending by time.
pub type DietGroups = BTreeMap<String, Vec<DietEntry>>;

// ─── Aggregator ──────────────────────────────────────────────────────────────

pub struct Aggregator<S> {
  fetcher: EventFetcher<S>,
}

impl<S: EntityStore> Aggregator<S> {
  pub fn new(store: Arc<S>) -> Self { Self { fetcher: EventFetcher::new(store) } }

  pub fn fetcher(&self) -> &EventFetcher<S> { &self.fetcher }

  /// Build the dashboard view of `subject_id`, restricted to `window` when
  /// given.
  pub async fn aggregate(
    &self,
    subject_id: &str,
    window: Option<TimeWindow>,
  ) -> Result<AggregatedView, AggregateError> {
    let mut fetched = Vec::with_capacity(Category::AGGREGATED.len());
    let mut failed = BTreeSet::new();
    for (category, result) in self.fetcher.fetch_all(subject_id).await {
      match result {
        Ok(events) => fetched.push(events),
        Err(error) => {
          warn!(subject = subject_id, %category, error = %error.source, "category unavailable");
          failed.insert(category);
        }
      }
    }

    let view = compose(subject_id, window, &fetched, &failed);
    debug!(
      subject = subject_id,
      points = view.trend.len(),
      score = view.current_score,
      "aggregated"
    );
    if failed.is_empty() {
      Ok(view)
    } else {
      Err(AggregateError::PartialFailure { succeeded: Box::new(view), failed })
    }
  }

  /// Diet events of `subject_id` grouped by food type.
  pub async fn diet_summary(&self, subject_id: &str) -> Result<DietGroups, FetchError> {
    let fetched = self.fetcher.fetch(subject_id, Category::Diet).await?;
    let mut groups = DietGroups::new();
    for event in fetched.events {
      if let EventPayload::Diet(diet) = event.payload {
        groups.entry(diet.food_type).or_default().push(DietEntry {
          event_id:       event.event_id,
          time:           event.occurred_at,
          quantity_grams: diet.quantity_grams,
          brand_name:     diet.brand_name,
        });
      }
    }
    Ok(groups)
  }
}

// ─── Composition ─────────────────────────────────────────────────────────────

/// Merge fetched categories into a view. Pure: the result depends only on
/// the events, never on the order `fetched` lists them in.
pub fn compose(
  subject_id: &str,
  window: Option<TimeWindow>,
  fetched: &[FetchedEvents],
  failed: &BTreeSet<Category>,
) -> AggregatedView {
  let window = window.filter(|w| !w.is_unbounded());
  let in_window = |e: &&Event| window.is_none_or(|w| w.contains(e.occurred_at));

  let mut categories: BTreeMap<Category, CategorySummary> = BTreeMap::new();
  for category in failed {
    categories.insert(*category, CategorySummary::default());
  }

  let mut merged: Vec<&Event> = Vec::new();
  for batch in fetched {
    let summary = categories.entry(batch.category).or_default();
    summary.available = true;
    summary.invalid_time = batch.invalid_time;
    summary.malformed = batch.malformed;
    merged.extend(batch.events.iter().filter(in_window));
  }
  merged.sort_by(|a, b| a.merge_key().cmp(&b.merge_key()));

  let mut trend = Vec::with_capacity(merged.len());
  for event in &merged {
    let points = score::contribution(&event.payload);
    // Ascending order means the last write per category is the latest.
    let summary = categories.entry(event.category()).or_default();
    summary.count += 1;
    summary.current_score = Some(points);
    summary.latest_at = Some(event.occurred_at);
    trend.push(TrendPoint {
      time:     event.occurred_at,
      category: event.category(),
      event_id: event.event_id.clone(),
      score:    points,
    });
  }

  let current: BTreeMap<Category, f64> = categories
    .iter()
    .filter_map(|(c, s)| s.current_score.map(|v| (*c, v)))
    .collect();

  AggregatedView {
    subject_id: subject_id.to_owned(),
    window,
    range: match (merged.first(), merged.last()) {
      (Some(first), Some(last)) => Some(TimeRange {
        start: first.occurred_at,
        end:   last.occurred_at,
      }),
      _ => None,
    },
    trend,
    current_score: score::composite(&current),
    categories,
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::testing::{self, MemoryStore};

  fn aggregator_over(store: MemoryStore) -> (Arc<MemoryStore>, Aggregator<MemoryStore>) {
    let store = Arc::new(store);
    (Arc::clone(&store), Aggregator::new(store))
  }

  fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    store.put(testing::dog("rex", "Rex"));
    store.put(testing::behavior("b1", "rex", "2024-01-01T09:00:00Z"));
    store.put(testing::diet("d1", "rex", "2024-01-01T08:00:00Z", "kibble", 200.0));
    store.put(testing::exercise("e1", "rex", "2024-01-01T08:00:00Z", 30.0));
    store.put(testing::health("h1", "rex", "2024-01-02T10:00:00Z", 6));
    store.put(testing::wellness("w1", "rex", "2024-01-03T20:00:00Z", 3));
    store
  }

  #[tokio::test]
  async fn single_exercise_event() {
    let store = MemoryStore::new();
    store.put(testing::exercise("e1", "rex", "2024-01-05T08:00:00Z", 30.0));
    let (_, aggregator) = aggregator_over(store);

    let view = aggregator.aggregate("rex", None).await.unwrap();
    assert_eq!(view.trend.len(), 1);
    assert_eq!(view.trend[0].score, 50.0);
    assert_eq!(view.trend[0].category, Category::Exercise);
    assert_eq!(view.categories[&Category::Exercise].current_score, Some(50.0));
    // Diet and wellness are neutral, exercise scores 50.
    assert_eq!(view.current_score, 50.0);
  }

  #[tokio::test]
  async fn diet_quantity_drives_the_diet_slot() {
    let store = MemoryStore::new();
    store.put(testing::diet("d1", "rex", "2024-01-01T08:00:00Z", "kibble", 200.0));
    let (_, aggregator) = aggregator_over(store);
    let view = aggregator.aggregate("rex", None).await.unwrap();
    assert_eq!(view.categories[&Category::Diet].current_score, Some(100.0));

    let store = MemoryStore::new();
    store.put(testing::diet("d1", "rex", "2024-01-01T08:00:00Z", "kibble", 0.0));
    let (_, aggregator) = aggregator_over(store);
    let view = aggregator.aggregate("rex", None).await.unwrap();
    assert_eq!(view.categories[&Category::Diet].current_score, Some(0.0));
  }

  #[tokio::test]
  async fn merges_by_time_then_category_then_id() {
    let (_, aggregator) = aggregator_over(seeded());
    let view = aggregator.aggregate("rex", None).await.unwrap();

    let ids: Vec<_> = view.trend.iter().map(|p| p.event_id.as_str()).collect();
    // d1 and e1 share a timestamp; diet sorts before exercise.
    assert_eq!(ids, ["d1", "e1", "b1", "h1", "w1"]);
    let range = view.range.unwrap();
    assert_eq!(range.start.to_string(), "2024-01-01T08:00:00.000Z");
    assert_eq!(range.end.to_string(), "2024-01-03T20:00:00.000Z");
    // diet 100, exercise 50, wellness 70.
    assert!((view.current_score - 220.0 / 3.0).abs() < 1e-9);
  }

  #[tokio::test]
  async fn completion_order_does_not_change_the_view() {
    let (_, fast) = aggregator_over(seeded());
    let baseline = fast.aggregate("rex", None).await.unwrap();

    let slow = seeded();
    slow.delay(Category::Behavior, 30);
    slow.delay(Category::Diet, 5);
    slow.delay(Category::Wellness, 15);
    let (_, slow) = aggregator_over(slow);
    assert_eq!(slow.aggregate("rex", None).await.unwrap(), baseline);

    let reversed: Vec<FetchedEvents> = {
      let mut all = Vec::new();
      for category in Category::AGGREGATED.iter().rev() {
        all.push(fast.fetcher().fetch("rex", *category).await.unwrap());
      }
      all
    };
    assert_eq!(compose("rex", None, &reversed, &BTreeSet::new()), baseline);
  }

  #[tokio::test]
  async fn one_failed_category_yields_partial_view() {
    let store = seeded();
    store.fail(Category::Wellness);
    let (store, aggregator) = aggregator_over(store);

    let err = aggregator.aggregate("rex", None).await.unwrap_err();
    let AggregateError::PartialFailure { succeeded, failed } = err;
    assert_eq!(failed, BTreeSet::from([Category::Wellness]));
    assert_eq!(succeeded.trend.len(), 4);
    assert!(succeeded.trend.iter().all(|p| p.category != Category::Wellness));

    let wellness = &succeeded.categories[&Category::Wellness];
    assert!(!wellness.available);
    assert_eq!(wellness.current_score, None);
    assert!(succeeded.categories[&Category::Diet].available);
    // diet 100, exercise 50, wellness neutral.
    assert!((succeeded.current_score - 200.0 / 3.0).abs() < 1e-9);
    assert_eq!(store.query_count(), 5);
  }

  #[tokio::test]
  async fn window_bounds_are_inclusive() {
    let (_, aggregator) = aggregator_over(seeded());
    let at = |s: &str| pawlog_core::time::normalize(&json!(s)).unwrap();
    let window = TimeWindow {
      since: Some(at("2024-01-01T09:00:00Z")),
      until: Some(at("2024-01-02T10:00:00Z")),
    };

    let view = aggregator.aggregate("rex", Some(window)).await.unwrap();
    let ids: Vec<_> = view.trend.iter().map(|p| p.event_id.as_str()).collect();
    assert_eq!(ids, ["b1", "h1"]);
    assert_eq!(view.window, Some(window));
    assert_eq!(view.categories[&Category::Diet].count, 0);
    assert_eq!(view.current_score, score::NEUTRAL_SCORE);
  }

  #[tokio::test]
  async fn data_quality_counters_are_reported() {
    let store = seeded();
    store.put(testing::event(Category::Health, "h-bad", "rex", json!(null), json!({
      "eventType": "limp",
      "severity": 2,
    })));
    store.put(testing::event(Category::Health, "h-sev", "rex", json!("2024-01-04"), json!({
      "eventType": "limp",
      "severity": 42,
    })));
    let (_, aggregator) = aggregator_over(store);

    let view = aggregator.aggregate("rex", None).await.unwrap();
    let health = &view.categories[&Category::Health];
    assert_eq!(health.count, 1);
    assert_eq!(health.invalid_time, 1);
    assert_eq!(health.malformed, 1);
  }

  #[tokio::test]
  async fn diet_summary_groups_by_food_type() {
    let store = MemoryStore::new();
    store.put(testing::diet("d2", "rex", "2024-01-02T08:00:00Z", "kibble", 150.0));
    store.put(testing::diet("d1", "rex", "2024-01-01T08:00:00Z", "kibble", 100.0));
    store.put(testing::diet("d3", "rex", "2024-01-01T12:00:00Z", "chicken", 80.0));
    let (_, aggregator) = aggregator_over(store);

    let groups = aggregator.diet_summary("rex").await.unwrap();
    assert_eq!(groups.keys().collect::<Vec<_>>(), ["chicken", "kibble"]);
    let kibble: Vec<_> = groups["kibble"].iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(kibble, ["d1", "d2"]);
    assert_eq!(groups["chicken"][0].brand_name.as_deref(), Some("Acme"));
  }
}
