//! Handlers for `/crrs` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/crrs/latest` | `?subject_id` required; `ETag` is the input digest; 404 if no score |
//! | `GET`  | `/crrs/history` | `?subject_id` required; optional `from`, `to` (default: last 365 days) |
//! | `POST` | `/crrs/:subject_id/recompute` | Always 200; insufficient data has `crrsValue: null` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use crrs_engine::{Engine, Stores};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, view::ScoreView};

// ─── Latest ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubjectParams {
  pub subject_id: Uuid,
}

/// `GET /crrs/latest?subject_id=<id>`
///
/// Honours `If-None-Match` with a 304.
pub async fn latest<S: Stores>(
  State(engine): State<Arc<Engine<S>>>,
  Query(params): Query<SubjectParams>,
  headers: HeaderMap,
) -> Result<Response, ApiError> {
  let score = engine
    .latest_score(params.subject_id)
    .await?
    .ok_or_else(|| {
      ApiError::NotFound(format!("no score for subject {}", params.subject_id))
    })?;

  let etag = format!("\"{}\"", score.input_digest);
  let fresh = headers
    .get(header::IF_NONE_MATCH)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| v.split(',').any(|t| t.trim() == etag));
  if fresh {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
  }

  Ok(([(header::ETAG, etag)], Json(ScoreView::from(score))).into_response())
}

// ─── History ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  pub subject_id: Uuid,
  pub from:       Option<DateTime<Utc>>,
  /// Defaults to now.
  pub to:         Option<DateTime<Utc>>,
}

/// `GET /crrs/history?subject_id=<id>[&from=...][&to=...]`
pub async fn history<S: Stores>(
  State(engine): State<Arc<Engine<S>>>,
  Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ScoreView>>, ApiError> {
  let to = params.to.unwrap_or_else(Utc::now);
  let from = params.from.unwrap_or(to - Duration::days(365));
  if from > to {
    return Err(ApiError::BadRequest(format!("from {from} is after to {to}")));
  }

  let scores = engine.history(params.subject_id, from, to).await?;
  Ok(Json(scores.into_iter().map(ScoreView::from).collect()))
}

// ─── Recompute ────────────────────────────────────────────────────────────────

/// `POST /crrs/:subject_id/recompute`
pub async fn recompute<S: Stores>(
  State(engine): State<Arc<Engine<S>>>,
  Path(subject_id): Path<Uuid>,
) -> Result<Json<ScoreView>, ApiError> {
  let score = engine.recompute(subject_id).await?;
  Ok(Json(ScoreView::from(score)))
}
