//! Collaborator traits the scoring engine reads from and writes to.
//!
//! The traits are implemented by storage backends (e.g. `crrs-store-sqlite`).
//! The engine and the API layer depend on these abstractions, not on any
//! concrete backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
  score::CrrsScore,
  thresholds::ThresholdConfig,
  vital::{NewVitalReading, VitalCategory, VitalReading},
};

// ─── Vital store ─────────────────────────────────────────────────────────────

/// Chronological vital readings per subject. Writes are append-only.
pub trait VitalStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Record a new reading and return it with its store-assigned id and
  /// `recorded_at`.
  fn record_reading(
    &self,
    input: NewVitalReading,
  ) -> impl Future<Output = Result<VitalReading, Self::Error>> + Send + '_;

  /// Readings of one category with `as_of - lookback <= taken_at <= as_of`,
  /// ordered by `taken_at` ascending.
  fn readings(
    &self,
    subject_id: Uuid,
    category: VitalCategory,
    as_of: DateTime<Utc>,
    lookback: Duration,
  ) -> impl Future<Output = Result<Vec<VitalReading>, Self::Error>> + Send + '_;
}

// ─── Config store ────────────────────────────────────────────────────────────

/// Versioned threshold configurations. Published versions are immutable.
pub trait ConfigStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The newest published config.
  fn active_threshold_config(
    &self,
  ) -> impl Future<Output = Result<ThresholdConfig, Self::Error>> + Send + '_;

  /// Publish `config` as the next version. The store assigns `version`;
  /// the caller's value is ignored. Returns the config as stored.
  fn publish_threshold_config(
    &self,
    config: ThresholdConfig,
  ) -> impl Future<Output = Result<ThresholdConfig, Self::Error>> + Send + '_;
}

// ─── Score store ─────────────────────────────────────────────────────────────

/// Append-only score history per subject.
pub trait ScoreStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a score. The write is all-or-nothing.
  fn append_score<'a>(
    &'a self,
    score: &'a CrrsScore,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// The most recently computed score for a subject, if any.
  fn latest_score(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Option<CrrsScore>, Self::Error>> + Send + '_;

  /// Scores with `from <= computed_at <= to`, ordered by `computed_at`
  /// ascending (ties in insertion order).
  fn scores_between(
    &self,
    subject_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<CrrsScore>, Self::Error>> + Send + '_;
}
