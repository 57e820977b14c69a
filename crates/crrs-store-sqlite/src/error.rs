//! Error type for `crrs-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] crrs_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A column held a value that does not decode to its domain type.
  #[error("decode error: {0}")]
  Decode(String),

  /// No threshold config has been published yet.
  #[error("no threshold config published")]
  NoActiveConfig,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
