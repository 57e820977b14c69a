//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A collaborator timed out or failed; the caller may retry.
  #[error("unavailable: {0}")]
  Unavailable(String),
}

impl From<crrs_engine::Error> for ApiError {
  fn from(e: crrs_engine::Error) -> Self {
    match e {
      crrs_engine::Error::RejectedReading(reason) => ApiError::BadRequest(reason),
      e @ crrs_engine::Error::UpstreamUnavailable { .. } => {
        ApiError::Unavailable(e.to_string())
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
