//! `GET /thresholds/active`: the config new scores are computed under.

use std::sync::Arc;

use axum::{Json, extract::State};
use crrs_core::thresholds::ThresholdConfig;
use crrs_engine::{Engine, Stores};

use crate::error::ApiError;

pub async fn active<S: Stores>(
  State(engine): State<Arc<Engine<S>>>,
) -> Result<Json<ThresholdConfig>, ApiError> {
  Ok(Json(engine.active_config().await?))
}
