//! Wire shapes. Field names are camelCase; query parameters stay
//! snake_case.

use chrono::{DateTime, Utc};
use crrs_core::{
  score::{CrrsScore, FactorSnapshot, RiskTier, ScoreOutcome, Severity, Trend},
  vital::{VitalCategory, VitalReading, VitalValue},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Scores ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreView {
  pub score_id:            Uuid,
  pub subject_id:          Uuid,
  /// `null` when there was not enough data to score.
  pub crrs_value:          Option<f64>,
  pub risk_tier:           Option<RiskTier>,
  pub risk_label:          Option<&'static str>,
  pub trend:               Trend,
  pub baseline:            Option<f64>,
  pub delta:               Option<f64>,
  pub explanation:         Vec<ContributionView>,
  pub breakdown:           Vec<FactorView>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub categories_present:  Option<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub categories_required: Option<usize>,
  pub computed_at:         DateTime<Utc>,
  pub window_start:        DateTime<Utc>,
  pub window_end:          DateTime<Utc>,
  pub config_version:      u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionView {
  pub factor:           VitalCategory,
  pub contribution_pct: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorView {
  pub category:         VitalCategory,
  pub normalized_score: f64,
  pub severity:         Severity,
  pub weight:           f64,
}

impl From<&FactorSnapshot> for FactorView {
  fn from(f: &FactorSnapshot) -> Self {
    Self {
      category:         f.category,
      normalized_score: f.normalized_score,
      severity:         f.severity,
      weight:           f.weight,
    }
  }
}

impl From<CrrsScore> for ScoreView {
  fn from(s: CrrsScore) -> Self {
    let (present, required) = match s.outcome {
      ScoreOutcome::InsufficientData { present, required } => {
        (Some(present), Some(required))
      }
      ScoreOutcome::Scored { .. } => (None, None),
    };
    let risk_tier = s.risk_tier();
    Self {
      score_id: s.score_id,
      subject_id: s.subject_id,
      crrs_value: s.value(),
      risk_tier,
      risk_label: risk_tier.map(RiskTier::label),
      trend: s.trend,
      baseline: s.baseline,
      delta: s.delta,
      explanation: s
        .explanation
        .iter()
        .map(|c| ContributionView {
          factor:           c.factor,
          contribution_pct: c.contribution_pct,
        })
        .collect(),
      breakdown: s.breakdown.iter().map(FactorView::from).collect(),
      categories_present: present,
      categories_required: required,
      computed_at: s.computed_at,
      window_start: s.window_start,
      window_end: s.window_end,
      config_version: s.config_version,
    }
  }
}

// ─── Readings ────────────────────────────────────────────────────────────────

/// Body of `POST /vitals`, e.g.
/// `{"subjectId":"…","category":"HEART_RATE","data":{"bpm":72},"takenAt":"…"}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReadingBody {
  pub subject_id:          Uuid,
  #[serde(flatten)]
  pub value:               VitalValue,
  pub taken_at:            DateTime<Utc>,
  pub source_encounter_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingView {
  pub reading_id:          Uuid,
  pub subject_id:          Uuid,
  #[serde(flatten)]
  pub value:               VitalValue,
  pub taken_at:            DateTime<Utc>,
  pub recorded_at:         DateTime<Utc>,
  pub source_encounter_id: Option<Uuid>,
}

impl From<VitalReading> for ReadingView {
  fn from(r: VitalReading) -> Self {
    Self {
      reading_id:          r.reading_id,
      subject_id:          r.subject_id,
      value:               r.value,
      taken_at:            r.taken_at,
      recorded_at:         r.recorded_at,
      source_encounter_id: r.source_encounter_id,
    }
  }
}
