//! Handlers for `/vitals` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/vitals` | Body: [`NewReadingBody`]; returns 201. `?recompute=true` also rescores |
//! | `GET`  | `/vitals` | `?subject_id` required; optional `category`, `as_of`, `lookback_days` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Duration, Utc};
use crrs_core::vital::{NewVitalReading, VitalCategory};
use crrs_engine::{Engine, Stores};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
  error::ApiError,
  view::{NewReadingBody, ReadingView, ScoreView},
};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateParams {
  #[serde(default)]
  pub recompute: bool,
}

#[derive(Debug, Serialize)]
pub struct Created {
  #[serde(flatten)]
  pub reading: ReadingView,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub score:   Option<ScoreView>,
}

/// `POST /vitals[?recompute=true]`
///
/// The reading is kept even if the follow-up recompute fails; the score is
/// then simply left out of the response.
pub async fn create<S: Stores>(
  State(engine): State<Arc<Engine<S>>>,
  Query(params): Query<CreateParams>,
  Json(body): Json<NewReadingBody>,
) -> Result<impl IntoResponse, ApiError> {
  let reading = engine
    .record_reading(NewVitalReading {
      subject_id:          body.subject_id,
      value:               body.value,
      taken_at:            body.taken_at,
      source_encounter_id: body.source_encounter_id,
    })
    .await?;

  let score = if params.recompute {
    match engine.recompute(reading.subject_id).await {
      Ok(score) => Some(ScoreView::from(score)),
      Err(e) => {
        warn!(subject_id = %reading.subject_id, "recompute after ingest failed: {e}");
        None
      }
    }
  } else {
    None
  };

  Ok((StatusCode::CREATED, Json(Created { reading: reading.into(), score })))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub subject_id:    Uuid,
  /// Restrict to one category, e.g. `BLOOD_PRESSURE`.
  pub category:      Option<VitalCategory>,
  /// End of the window. Defaults to now.
  pub as_of:         Option<DateTime<Utc>>,
  #[serde(default = "default_lookback_days")]
  pub lookback_days: i64,
}

fn default_lookback_days() -> i64 { 30 }

/// `GET /vitals?subject_id=<id>[&category=...][&as_of=...][&lookback_days=...]`
///
/// Readings ordered by `taken_at`, implausible ones included.
pub async fn list<S: Stores>(
  State(engine): State<Arc<Engine<S>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ReadingView>>, ApiError> {
  if params.lookback_days <= 0 {
    return Err(ApiError::BadRequest("lookback_days must be positive".into()));
  }
  let as_of = params.as_of.unwrap_or_else(Utc::now);
  let lookback = Duration::days(params.lookback_days);
  let categories = match params.category {
    Some(c) => vec![c],
    None => VitalCategory::ALL.to_vec(),
  };

  let mut readings = Vec::new();
  for category in categories {
    readings.extend(engine.readings(params.subject_id, category, as_of, lookback).await?);
  }
  readings.sort_by_key(|r| (r.taken_at, r.recorded_at));

  Ok(Json(readings.into_iter().map(ReadingView::from).collect()))
}
