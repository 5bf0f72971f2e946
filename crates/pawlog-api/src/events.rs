//! Handlers for event listings.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects/:id/events` | `?category=<tag>`, optional `&enrich=true` |
//! | `GET`  | `/owners/:id/events` | `?category=<tag>`; always enriched, newest first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use pawlog_core::{
  Error as CoreError,
  event::{Category, Event},
  store::EntityStore,
};
use pawlog_engine::{Generator, IdentityVerifier, fetch::EnrichedEvent};
use serde::{Deserialize, Serialize};

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct EventParams {
  pub category: Option<String>,
  /// Attach the subject's display name to every event.
  #[serde(default)]
  pub enrich:   bool,
}

impl EventParams {
  fn category(&self) -> Result<Category, ApiError> {
    let raw = self
      .category
      .as_deref()
      .ok_or_else(|| ApiError::BadRequest("`category` is required".into()))?;
    raw
      .parse()
      .map_err(|_| ApiError::BadRequest(CoreError::UnknownCategory(raw.to_owned()).to_string()))
  }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum EventList {
  Plain(Vec<Event>),
  Enriched(Vec<EnrichedEvent>),
}

/// `GET /subjects/:id/events?category=<tag>[&enrich=true]`
pub async fn for_subject<S, V, G>(
  State(state): State<Arc<ApiState<S, V, G>>>,
  Path(id): Path<String>,
  Query(params): Query<EventParams>,
) -> Result<Json<EventList>, ApiError>
where
  S: EntityStore,
  V: IdentityVerifier,
  G: Generator,
{
  let category = params.category()?;
  let fetcher = state.aggregator.fetcher();
  let list = if params.enrich {
    EventList::Enriched(fetcher.fetch_enriched(&id, category).await?)
  } else {
    EventList::Plain(fetcher.fetch(&id, category).await?.events)
  };
  Ok(Json(list))
}

/// `GET /owners/:id/events?category=<tag>`
pub async fn for_owner<S, V, G>(
  State(state): State<Arc<ApiState<S, V, G>>>,
  Path(id): Path<String>,
  Query(params): Query<EventParams>,
) -> Result<Json<Vec<EnrichedEvent>>, ApiError>
where
  S: EntityStore,
  V: IdentityVerifier,
  G: Generator,
{
  let category = params.category()?;
  let events = state.aggregator.fetcher().fetch_for_owner(&id, category).await?;
  Ok(Json(events))
}
