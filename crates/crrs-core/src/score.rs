//! Score records and the enums that describe them.
//!
//! A [`CrrsScore`] is one computation for one subject. Persisted scores form
//! an append-only history per subject: a recomputation appends a new record,
//! it never rewrites an old one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::vital::VitalCategory;

// ─── Severity ────────────────────────────────────────────────────────────────

/// Severity of a single category's normalised score.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
  /// No usable reading in the lookback window; excluded from aggregation.
  Unknown,
  Normal,
  Elevated,
  High,
  Critical,
}

// ─── RiskTier ────────────────────────────────────────────────────────────────

/// Discrete band derived from the composite value.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
  Low,
  Moderate,
  High,
  Critical,
}

impl RiskTier {
  /// `(lower, upper)` bounds of the band. Lower is inclusive; upper is
  /// exclusive except for [`RiskTier::Critical`], which is closed at 100.
  pub const fn bounds(self) -> (f64, f64) {
    match self {
      Self::Low => (0.0, 25.0),
      Self::Moderate => (25.0, 50.0),
      Self::High => (50.0, 75.0),
      Self::Critical => (75.0, 100.0),
    }
  }

  pub const fn label(self) -> &'static str {
    match self {
      Self::Low => "Low Risk",
      Self::Moderate => "Moderate Risk",
      Self::High => "High Risk",
      Self::Critical => "Critical Risk",
    }
  }
}

// ─── Trend ───────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
  Improving,
  Worsening,
  Stable,
  InsufficientData,
}

// ─── Explanation & breakdown ─────────────────────────────────────────────────

/// One named risk driver and its share of the weighted total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
  pub factor:           VitalCategory,
  /// Whole percent, `0..=100`.
  pub contribution_pct: u8,
}

/// A category's normalised result, kept on the record so a score can be
/// explained after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorSnapshot {
  pub category:         VitalCategory,
  pub normalized_score: f64,
  pub severity:         Severity,
  pub weight:           f64,
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// What the calculator produced for a computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScoreOutcome {
  Scored { value: f64, risk_tier: RiskTier },
  /// Too few categories had a usable reading. An expected steady state for
  /// new subjects, not a failure.
  InsufficientData { present: usize, required: usize },
}

impl ScoreOutcome {
  pub fn value(&self) -> Option<f64> {
    match self {
      Self::Scored { value, .. } => Some(*value),
      Self::InsufficientData { .. } => None,
    }
  }

  pub fn risk_tier(&self) -> Option<RiskTier> {
    match self {
      Self::Scored { risk_tier, .. } => Some(*risk_tier),
      Self::InsufficientData { .. } => None,
    }
  }
}

// ─── CrrsScore ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrrsScore {
  pub score_id:       Uuid,
  pub subject_id:     Uuid,
  pub outcome:        ScoreOutcome,
  pub trend:          Trend,
  /// Mean of the prior scores the trend was measured against.
  pub baseline:       Option<f64>,
  /// `value - baseline`, when both exist.
  pub delta:          Option<f64>,
  /// Ordered, most significant driver first; at most three entries.
  pub explanation:    Vec<Contribution>,
  pub breakdown:      Vec<FactorSnapshot>,
  pub config_version: u32,
  /// Hex SHA-256 over the config version and contributing readings.
  pub input_digest:   String,
  pub computed_at:    DateTime<Utc>,
  pub window_start:   DateTime<Utc>,
  pub window_end:     DateTime<Utc>,
}

impl CrrsScore {
  pub fn value(&self) -> Option<f64> { self.outcome.value() }

  pub fn risk_tier(&self) -> Option<RiskTier> { self.outcome.risk_tier() }

  pub fn is_scored(&self) -> bool {
    matches!(self.outcome, ScoreOutcome::Scored { .. })
  }
}
