//! Handlers for the dashboard endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects/:id/aggregate` | Optional `?since=&until=`; honours `If-None-Match` |
//! | `GET`  | `/subjects/:id/dashboard/diet` | Diet events grouped by food type |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use pawlog_core::{
  event::Category,
  store::EntityStore,
  time::{NormalizedTime, normalize},
};
use pawlog_engine::{
  AggregateError, AggregatedView, Generator, IdentityVerifier, TimeWindow,
  aggregate::DietGroups,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ApiState, error::ApiError, etag};

// ─── Aggregate ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct WindowParams {
  /// Any timestamp form the store accepts, e.g. `2024-01-01` or RFC 3339.
  pub since: Option<String>,
  pub until: Option<String>,
}

impl WindowParams {
  fn into_window(self) -> Result<Option<TimeWindow>, ApiError> {
    let window = TimeWindow {
      since: parse_bound("since", self.since)?,
      until: parse_bound("until", self.until)?,
    };
    if let (Some(since), Some(until)) = (window.since, window.until)
      && since > until
    {
      return Err(ApiError::BadRequest("`since` is after `until`".into()));
    }
    Ok((!window.is_unbounded()).then_some(window))
  }
}

fn parse_bound(name: &str, raw: Option<String>) -> Result<Option<NormalizedTime>, ApiError> {
  raw
    .map(|s| {
      normalize(&Value::String(s))
        .map_err(|e| ApiError::BadRequest(format!("invalid `{name}`: {e}")))
    })
    .transpose()
}

/// The aggregated view plus the categories that could not be fetched.
#[derive(Debug, Serialize)]
pub struct AggregateResponse {
  #[serde(flatten)]
  pub view:        AggregatedView,
  pub unavailable: Vec<Category>,
}

/// `GET /subjects/:id/aggregate[?since=...][&until=...]`
///
/// Partial failures are still `200`; the failed categories are listed in
/// `unavailable`.
pub async fn aggregate<S, V, G>(
  State(state): State<Arc<ApiState<S, V, G>>>,
  Path(id): Path<String>,
  Query(params): Query<WindowParams>,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: EntityStore,
  V: IdentityVerifier,
  G: Generator,
{
  let window = params.into_window()?;
  let (view, unavailable) = match state.aggregator.aggregate(&id, window).await {
    Ok(view) => (view, Vec::new()),
    Err(AggregateError::PartialFailure { succeeded, failed }) => {
      (*succeeded, failed.into_iter().collect())
    }
  };

  let etag = etag::compute_etag(&view, &unavailable);
  let not_modified = headers
    .get(header::IF_NONE_MATCH)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| etag::if_none_match(v, &etag));
  if not_modified {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
  }

  Ok(
    (
      StatusCode::OK,
      [(header::ETAG, etag)],
      Json(AggregateResponse { view, unavailable }),
    )
      .into_response(),
  )
}

// ─── Diet ────────────────────────────────────────────────────────────────────

/// `GET /subjects/:id/dashboard/diet`
pub async fn diet<S, V, G>(
  State(state): State<Arc<ApiState<S, V, G>>>,
  Path(id): Path<String>,
) -> Result<Json<DietGroups>, ApiError>
where
  S: EntityStore,
  V: IdentityVerifier,
  G: Generator,
{
  Ok(Json(state.aggregator.diet_summary(&id).await?))
}
