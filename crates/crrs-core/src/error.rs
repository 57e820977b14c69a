//! Error types for `crrs-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// A reading whose values fall outside physically plausible bounds.
  #[error("invalid reading {reading_id}: {reason}")]
  InvalidReading { reading_id: Uuid, reason: String },

  #[error(
    "insufficient data: {present} categories present, {required} required"
  )]
  InsufficientData { present: usize, required: usize },

  /// A prior score was computed under a threshold version that cannot be
  /// compared with the active one.
  #[error(
    "config version mismatch: expected version >= {expected_from}, found \
     {found}"
  )]
  ConfigVersionMismatch { expected_from: u32, found: u32 },

  #[error("invalid threshold config: {0}")]
  InvalidConfig(String),

  #[error("unknown vital category: {0:?}")]
  UnknownCategory(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
