//! Vital readings, the sole raw input of the scoring pipeline.
//!
//! A reading is an immutable measurement of one vital category for one
//! subject. Readings are never updated; corrections arrive as new readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Category ────────────────────────────────────────────────────────────────

/// The vital sign types that contribute to the composite score.
///
/// The declaration order is the canonical order used whenever categories are
/// iterated or tie-broken.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
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
pub enum VitalCategory {
  BloodPressure,
  Glucose,
  Weight,
  HeartRate,
}

impl VitalCategory {
  pub const ALL: [VitalCategory; 4] = [
    Self::BloodPressure,
    Self::Glucose,
    Self::Weight,
    Self::HeartRate,
  ];

  /// Parse the wire/database form, e.g. `"HEART_RATE"`.
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownCategory(s.to_owned()))
  }
}

// ─── Category payloads ───────────────────────────────────────────────────────

/// When a glucose sample was taken relative to a meal.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GlucoseContext {
  Fasting,
  PostMeal,
  #[default]
  Random,
}

/// Arterial blood pressure in mmHg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BloodPressureValue {
  pub systolic:  f64,
  pub diastolic: f64,
}

/// Blood glucose in mg/dL.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlucoseValue {
  pub mg_dl:   f64,
  #[serde(default)]
  pub context: GlucoseContext,
}

/// Body weight. Height travels with the reading so the weight can be scored
/// as a body-mass index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightValue {
  pub kg:        f64,
  pub height_cm: f64,
}

impl WeightValue {
  pub fn bmi(&self) -> f64 {
    let metres = self.height_cm / 100.0;
    self.kg / (metres * metres)
  }
}

/// Resting heart rate in beats per minute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateValue {
  pub bpm: f64,
}

// ─── VitalValue ──────────────────────────────────────────────────────────────

/// The typed payload of a reading. The variant determines the category, so a
/// reading can never carry fields that do not belong to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(
  tag = "category",
  content = "data",
  rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum VitalValue {
  BloodPressure(BloodPressureValue),
  Glucose(GlucoseValue),
  Weight(WeightValue),
  HeartRate(HeartRateValue),
}

/// Inclusive plausibility bounds; anything outside is a measurement or entry
/// error rather than a clinical finding.
const SYSTOLIC_BOUNDS: (f64, f64) = (50.0, 300.0);
const DIASTOLIC_BOUNDS: (f64, f64) = (20.0, 200.0);
const GLUCOSE_BOUNDS: (f64, f64) = (10.0, 1000.0);
const WEIGHT_BOUNDS: (f64, f64) = (2.0, 400.0);
const HEIGHT_BOUNDS: (f64, f64) = (40.0, 260.0);
const HEART_RATE_BOUNDS: (f64, f64) = (20.0, 300.0);

fn check_bounds(
  name: &str,
  value: f64,
  (lo, hi): (f64, f64),
) -> std::result::Result<(), String> {
  if !value.is_finite() {
    return Err(format!("{name} is not a finite number"));
  }
  if value < lo || value > hi {
    return Err(format!("{name} {value} outside plausible range {lo}..={hi}"));
  }
  Ok(())
}

impl VitalValue {
  pub fn category(&self) -> VitalCategory {
    match self {
      Self::BloodPressure(_) => VitalCategory::BloodPressure,
      Self::Glucose(_) => VitalCategory::Glucose,
      Self::Weight(_) => VitalCategory::Weight,
      Self::HeartRate(_) => VitalCategory::HeartRate,
    }
  }

  /// Describe why the values are physically implausible, if they are.
  pub fn implausibility(&self) -> Option<String> {
    let checked = match self {
      Self::BloodPressure(bp) => {
        check_bounds("systolic", bp.systolic, SYSTOLIC_BOUNDS)
          .and_then(|()| check_bounds("diastolic", bp.diastolic, DIASTOLIC_BOUNDS))
          .and_then(|()| {
            if bp.diastolic >= bp.systolic {
              Err(format!(
                "diastolic {} not below systolic {}",
                bp.diastolic, bp.systolic
              ))
            } else {
              Ok(())
            }
          })
      }
      Self::Glucose(g) => check_bounds("glucose", g.mg_dl, GLUCOSE_BOUNDS),
      Self::Weight(w) => check_bounds("weight", w.kg, WEIGHT_BOUNDS)
        .and_then(|()| check_bounds("height", w.height_cm, HEIGHT_BOUNDS)),
      Self::HeartRate(hr) => {
        check_bounds("heart rate", hr.bpm, HEART_RATE_BOUNDS)
      }
    };
    checked.err()
  }

  /// Serialise the inner payload (without the category tag) for the
  /// `value_json` database column.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Rebuild from the category column and JSON payload stored in the
  /// database.
  pub fn from_parts(
    category: VitalCategory,
    data: serde_json::Value,
  ) -> Result<Self> {
    let wrapped =
      serde_json::json!({ "category": category.as_ref(), "data": data });
    Ok(serde_json::from_value(wrapped)?)
  }
}

// ─── VitalReading ────────────────────────────────────────────────────────────

/// An immutable measurement. Once written, no field is ever updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalReading {
  pub reading_id:          Uuid,
  pub subject_id:          Uuid,
  pub value:               VitalValue,
  /// When the measurement was taken in the real world.
  pub taken_at:            DateTime<Utc>,
  /// Server-assigned timestamp; never changes after creation.
  pub recorded_at:         DateTime<Utc>,
  pub source_encounter_id: Option<Uuid>,
}

impl VitalReading {
  pub fn category(&self) -> VitalCategory { self.value.category() }

  /// Fail with [`Error::InvalidReading`] if the values are implausible.
  pub fn validate(&self) -> Result<()> {
    match self.value.implausibility() {
      Some(reason) => Err(Error::InvalidReading {
        reading_id: self.reading_id,
        reason,
      }),
      None => Ok(()),
    }
  }
}

// ─── NewVitalReading ─────────────────────────────────────────────────────────

/// Input to [`crate::store::VitalStore::record_reading`].
/// `reading_id` and `recorded_at` are always set by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVitalReading {
  pub subject_id:          Uuid,
  pub value:               VitalValue,
  pub taken_at:            DateTime<Utc>,
  #[serde(default)]
  pub source_encounter_id: Option<Uuid>,
}
