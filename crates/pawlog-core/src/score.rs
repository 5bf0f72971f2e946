//! Health-score functions.
//!
//! Every function here is pure and total: finite inputs of any magnitude map
//! into `[0, 100]`, and there is no I/O or hidden state.

use std::collections::BTreeMap;

use crate::event::{Category, EventPayload};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Score used for informational categories and for composite slots that
/// have no events.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Categories whose most recent event feeds the composite score. Behavior
/// and health are trended but not folded in.
pub const COMPOSITE_SLOTS: [Category; 3] = [Category::Diet, Category::Exercise, Category::Wellness];

/// One hour of activity maps to the maximum score.
pub fn exercise_score(duration_minutes: f64) -> f64 {
  if !duration_minutes.is_finite() || duration_minutes <= 0.0 {
    return MIN_SCORE;
  }
  (duration_minutes / 60.0 * MAX_SCORE).min(MAX_SCORE)
}

/// Binary: any positive quantity scores the maximum.
// TODO: replace with a portion-aware formula once product defines target
// intake per breed and weight.
pub fn diet_score(quantity_grams: f64) -> f64 {
  if quantity_grams > 0.0 { MAX_SCORE } else { MIN_SCORE }
}

/// Each severity point removes ten from the maximum.
pub fn wellness_score(severity: u8) -> f64 {
  (MAX_SCORE - f64::from(severity) * 10.0).clamp(MIN_SCORE, MAX_SCORE)
}

/// The score contribution of a single event.
pub fn contribution(payload: &EventPayload) -> f64 {
  match payload {
    EventPayload::Exercise(e) => exercise_score(e.duration_minutes),
    EventPayload::Diet(d) => diet_score(d.quantity_grams),
    EventPayload::Wellness(w) => wellness_score(w.severity.get()),
    EventPayload::Behavior(_) | EventPayload::Health(_) | EventPayload::DietSchedule(_) => {
      NEUTRAL_SCORE
    }
  }
}

/// Mean over [`COMPOSITE_SLOTS`] of each slot's current score, using
/// [`NEUTRAL_SCORE`] for slots missing from `current`. Entries for other
/// categories are ignored.
pub fn composite(current: &BTreeMap<Category, f64>) -> f64 {
  let total: f64 = COMPOSITE_SLOTS
    .iter()
    .map(|c| current.get(c).copied().unwrap_or(NEUTRAL_SCORE))
    .sum();
  total / COMPOSITE_SLOTS.len() as f64
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::{DietEvent, ExerciseEvent, HealthEvent, Severity};

  #[test]
  fn exercise_is_linear_up_to_an_hour() {
    assert_eq!(exercise_score(0.0), 0.0);
    assert_eq!(exercise_score(30.0), 50.0);
    assert_eq!(exercise_score(60.0), 100.0);
    assert_eq!(exercise_score(240.0), 100.0);
    assert_eq!(exercise_score(-3.0), 0.0);
    assert_eq!(exercise_score(f64::NAN), 0.0);
  }

  #[test]
  fn exercise_is_bounded_for_all_durations() {
    let mut minutes = 0.0;
    while minutes < 10_000.0 {
      let s = exercise_score(minutes);
      assert!((MIN_SCORE..=MAX_SCORE).contains(&s), "{minutes} -> {s}");
      minutes += 7.3;
    }
    assert_eq!(exercise_score(f64::MAX), 100.0);
  }

  #[test]
  fn diet_is_binary() {
    assert_eq!(diet_score(200.0), 100.0);
    assert_eq!(diet_score(0.5), 100.0);
    assert_eq!(diet_score(0.0), 0.0);
    assert_eq!(diet_score(-10.0), 0.0);
  }

  #[test]
  fn wellness_is_bounded_for_every_severity() {
    for severity in 0..=u8::MAX {
      let s = wellness_score(severity);
      assert!((MIN_SCORE..=MAX_SCORE).contains(&s));
    }
    assert_eq!(wellness_score(1), 90.0);
    assert_eq!(wellness_score(10), 0.0);
  }

  #[test]
  fn informational_categories_are_neutral() {
    let health = EventPayload::Health(HealthEvent {
      event_type: "vomiting".into(),
      severity:   Severity::new(9.0).unwrap(),
      notes:      None,
    });
    assert_eq!(contribution(&health), NEUTRAL_SCORE);

    let diet = EventPayload::Diet(DietEvent {
      food_type:      "kibble".into(),
      brand_name:     None,
      quantity_grams: 0.0,
    });
    assert_eq!(contribution(&diet), 0.0);

    let walk = EventPayload::Exercise(ExerciseEvent {
      activity_type:    "walk".into(),
      duration_minutes: 45.0,
      distance:         Some(3.0),
      source:           None,
    });
    assert_eq!(contribution(&walk), 75.0);
  }

  #[test]
  fn composite_uses_neutral_for_absent_slots() {
    assert_eq!(composite(&BTreeMap::new()), NEUTRAL_SCORE);

    let current = BTreeMap::from([(Category::Exercise, 50.0)]);
    assert_eq!(composite(&current), 50.0);

    let current = BTreeMap::from([
      (Category::Exercise, 100.0),
      (Category::Diet, 100.0),
      (Category::Wellness, 70.0),
      (Category::Health, 0.0),
    ]);
    assert_eq!(composite(&current), 90.0);
  }
}
