//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as fixed-width RFC 3339 strings. Structured
//! fields (reading payloads, explanations, breakdowns) are stored as compact
//! JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use crrs_core::{
  score::{
    Contribution, CrrsScore, FactorSnapshot, RiskTier, ScoreOutcome, Trend,
  },
  vital::{VitalCategory, VitalReading, VitalValue},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

/// Always microsecond precision with a `Z` suffix, so every encoded value has
/// the same width and string order equals time order.
pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

// ─── Enums ────────────────────────────────────────────────────────────────────

pub fn decode_category(s: &str) -> Result<VitalCategory> {
  Ok(VitalCategory::parse(s)?)
}

pub fn decode_risk_tier(s: &str) -> Result<RiskTier> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown risk tier: {s:?}")))
}

pub fn decode_trend(s: &str) -> Result<Trend> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown trend: {s:?}")))
}

pub const STATUS_SCORED: &str = "scored";
pub const STATUS_INSUFFICIENT: &str = "insufficient_data";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `vital_readings` row.
pub struct RawReading {
  pub reading_id:          String,
  pub subject_id:          String,
  pub category:            String,
  pub value_json:          String,
  pub taken_at:            String,
  pub recorded_at:         String,
  pub source_encounter_id: Option<String>,
}

impl RawReading {
  pub const COLUMNS: &'static str = "reading_id, subject_id, category, \
                                     value_json, taken_at, recorded_at, \
                                     source_encounter_id";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      reading_id:          row.get(0)?,
      subject_id:          row.get(1)?,
      category:            row.get(2)?,
      value_json:          row.get(3)?,
      taken_at:            row.get(4)?,
      recorded_at:         row.get(5)?,
      source_encounter_id: row.get(6)?,
    })
  }

  pub fn into_reading(self) -> Result<VitalReading> {
    let category = decode_category(&self.category)?;
    let data: serde_json::Value = serde_json::from_str(&self.value_json)?;
    Ok(VitalReading {
      reading_id:          decode_uuid(&self.reading_id)?,
      subject_id:          decode_uuid(&self.subject_id)?,
      value:               VitalValue::from_parts(category, data)?,
      taken_at:            decode_dt(&self.taken_at)?,
      recorded_at:         decode_dt(&self.recorded_at)?,
      source_encounter_id: self
        .source_encounter_id
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
    })
  }
}

/// Column values for one `crrs_scores` row, in both directions.
pub struct RawScore {
  pub score_id:         String,
  pub subject_id:       String,
  pub status:           String,
  pub crrs_value:       Option<f64>,
  pub risk_tier:        Option<String>,
  pub present:          Option<i64>,
  pub required:         Option<i64>,
  pub trend:            String,
  pub baseline:         Option<f64>,
  pub delta:            Option<f64>,
  pub explanation_json: String,
  pub breakdown_json:   String,
  pub config_version:   i64,
  pub input_digest:     String,
  pub computed_at:      String,
  pub window_start:     String,
  pub window_end:       String,
}

impl RawScore {
  pub const COLUMNS: &'static str = "score_id, subject_id, status, \
                                     crrs_value, risk_tier, present, \
                                     required, trend, baseline, delta, \
                                     explanation_json, breakdown_json, \
                                     config_version, input_digest, \
                                     computed_at, window_start, window_end";

  pub fn from_score(score: &CrrsScore) -> Result<Self> {
    let (status, crrs_value, risk_tier, present, required) = match score.outcome
    {
      ScoreOutcome::Scored { value, risk_tier } => (
        STATUS_SCORED,
        Some(value),
        Some(risk_tier.to_string()),
        None,
        None,
      ),
      ScoreOutcome::InsufficientData { present, required } => (
        STATUS_INSUFFICIENT,
        None,
        None,
        Some(present as i64),
        Some(required as i64),
      ),
    };
    Ok(Self {
      score_id: encode_uuid(score.score_id),
      subject_id: encode_uuid(score.subject_id),
      status: status.to_owned(),
      crrs_value,
      risk_tier,
      present,
      required,
      trend: score.trend.to_string(),
      baseline: score.baseline,
      delta: score.delta,
      explanation_json: serde_json::to_string(&score.explanation)?,
      breakdown_json: serde_json::to_string(&score.breakdown)?,
      config_version: i64::from(score.config_version),
      input_digest: score.input_digest.clone(),
      computed_at: encode_dt(score.computed_at),
      window_start: encode_dt(score.window_start),
      window_end: encode_dt(score.window_end),
    })
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      score_id:         row.get(0)?,
      subject_id:       row.get(1)?,
      status:           row.get(2)?,
      crrs_value:       row.get(3)?,
      risk_tier:        row.get(4)?,
      present:          row.get(5)?,
      required:         row.get(6)?,
      trend:            row.get(7)?,
      baseline:         row.get(8)?,
      delta:            row.get(9)?,
      explanation_json: row.get(10)?,
      breakdown_json:   row.get(11)?,
      config_version:   row.get(12)?,
      input_digest:     row.get(13)?,
      computed_at:      row.get(14)?,
      window_start:     row.get(15)?,
      window_end:       row.get(16)?,
    })
  }

  pub fn into_score(self) -> Result<CrrsScore> {
    let outcome = match self.status.as_str() {
      STATUS_SCORED => {
        let value = self
          .crrs_value
          .ok_or_else(|| Error::Decode("scored row without crrs_value".into()))?;
        let tier = self
          .risk_tier
          .as_deref()
          .ok_or_else(|| Error::Decode("scored row without risk_tier".into()))?;
        ScoreOutcome::Scored { value, risk_tier: decode_risk_tier(tier)? }
      }
      STATUS_INSUFFICIENT => ScoreOutcome::InsufficientData {
        present:  decode_count(self.present)?,
        required: decode_count(self.required)?,
      },
      other => {
        return Err(Error::Decode(format!("unknown score status: {other:?}")));
      }
    };

    let explanation: Vec<Contribution> =
      serde_json::from_str(&self.explanation_json)?;
    let breakdown: Vec<FactorSnapshot> =
      serde_json::from_str(&self.breakdown_json)?;
    let config_version = u32::try_from(self.config_version).map_err(|_| {
      Error::Decode(format!("bad config_version {}", self.config_version))
    })?;

    Ok(CrrsScore {
      score_id: decode_uuid(&self.score_id)?,
      subject_id: decode_uuid(&self.subject_id)?,
      outcome,
      trend: decode_trend(&self.trend)?,
      baseline: self.baseline,
      delta: self.delta,
      explanation,
      breakdown,
      config_version,
      input_digest: self.input_digest,
      computed_at: decode_dt(&self.computed_at)?,
      window_start: decode_dt(&self.window_start)?,
      window_end: decode_dt(&self.window_end)?,
    })
  }
}

fn decode_count(v: Option<i64>) -> Result<usize> {
  v.and_then(|n| usize::try_from(n).ok())
    .ok_or_else(|| Error::Decode(format!("bad category count {v:?}")))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let a = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let b = a + chrono::Duration::microseconds(1);
    let c = a + chrono::Duration::days(400);
    let (ea, eb, ec) = (encode_dt(a), encode_dt(b), encode_dt(c));
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb && eb < ec);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn unknown_status_is_a_decode_error() {
    let raw = RawScore {
      score_id:         encode_uuid(Uuid::new_v4()),
      subject_id:       encode_uuid(Uuid::new_v4()),
      status:           "pending".into(),
      crrs_value:       None,
      risk_tier:        None,
      present:          None,
      required:         None,
      trend:            "STABLE".into(),
      baseline:         None,
      delta:            None,
      explanation_json: "[]".into(),
      breakdown_json:   "[]".into(),
      config_version:   1,
      input_digest:     String::new(),
      computed_at:      encode_dt(Utc::now()),
      window_start:     encode_dt(Utc::now()),
      window_end:       encode_dt(Utc::now()),
    };
    assert!(matches!(raw.into_score(), Err(Error::Decode(_))));
  }
}
