//! Error type for `crrs-engine`.
//!
//! Only failures the caller must act on surface here. Implausible readings
//! are dropped inside the extractor and too-sparse data is a
//! [`ScoreOutcome`](crrs_core::score::ScoreOutcome), not an error.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A collaborator store failed or did not answer in time. Nothing was
  /// persisted and the cached latest score was left in place.
  #[error("{collaborator} unavailable: {failure}")]
  UpstreamUnavailable {
    collaborator: &'static str,
    failure:      UpstreamFailure,
  },

  #[error("reading rejected: {0}")]
  RejectedReading(String),
}

#[derive(Debug, Error)]
pub enum UpstreamFailure {
  #[error("timed out after {0:?}")]
  Timeout(Duration),

  #[error("{0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn is_timeout(&self) -> bool {
    matches!(
      self,
      Self::UpstreamUnavailable { failure: UpstreamFailure::Timeout(_), .. }
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
