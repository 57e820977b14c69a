//! Versioned clinical reference ranges and category weights.
//!
//! A [`ThresholdConfig`] is never mutated once published. Changing a boundary
//! or a weight means publishing a new version; scores already persisted keep
//! the version they were computed under.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
  Error, Result,
  score::Severity,
  vital::{GlucoseContext, VitalCategory},
};

// ─── Boundary tables ─────────────────────────────────────────────────────────

/// How a [`BoundaryTable`] fills the gaps between its anchors.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Interpolation {
  /// Each anchor's score holds until the next anchor.
  #[default]
  Step,
  /// Scores are interpolated linearly between neighbouring anchors.
  Linear,
}

/// A clinical boundary: raw values at or above `at` map to `score`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
  pub at:    f64,
  pub score: f64,
}

const fn anchor(at: f64, score: f64) -> Anchor { Anchor { at, score } }

/// A piecewise mapping from a raw measurement to a `[0, 100]` risk score.
///
/// Anchors must be sorted by strictly increasing `at`. Values below the first
/// anchor take the first anchor's score; values above the last take the
/// last's. Non-monotonic score sequences are allowed, which is how U-shaped
/// risks such as heart rate or glucose are expressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryTable {
  #[serde(default)]
  pub interpolation: Interpolation,
  pub anchors:       Vec<Anchor>,
}

impl BoundaryTable {
  pub fn step(anchors: &[Anchor]) -> Self {
    Self { interpolation: Interpolation::Step, anchors: anchors.to_vec() }
  }

  pub fn linear(anchors: &[Anchor]) -> Self {
    Self { interpolation: Interpolation::Linear, anchors: anchors.to_vec() }
  }

  /// Map a raw value onto `[0, 100]`.
  pub fn score(&self, raw: f64) -> f64 {
    let Some(first) = self.anchors.first() else {
      return 0.0;
    };
    // Index of the last anchor at or below `raw`.
    let idx = match self.anchors.iter().rposition(|a| a.at <= raw) {
      Some(i) => i,
      None => return first.score.clamp(0.0, 100.0),
    };
    let lower = self.anchors[idx];
    let score = match (self.interpolation, self.anchors.get(idx + 1)) {
      (Interpolation::Linear, Some(upper)) => {
        let span = upper.at - lower.at;
        let t = (raw - lower.at) / span;
        lower.score + t * (upper.score - lower.score)
      }
      _ => lower.score,
    };
    score.clamp(0.0, 100.0)
  }

  fn validate(&self, name: &str) -> Result<()> {
    if self.anchors.is_empty() {
      return Err(Error::InvalidConfig(format!("{name}: no anchors")));
    }
    for pair in self.anchors.windows(2) {
      if !(pair[0].at < pair[1].at) {
        return Err(Error::InvalidConfig(format!(
          "{name}: anchors not strictly increasing at {}",
          pair[1].at
        )));
      }
    }
    if let Some(a) = self
      .anchors
      .iter()
      .find(|a| !a.at.is_finite() || !(0.0..=100.0).contains(&a.score))
    {
      return Err(Error::InvalidConfig(format!(
        "{name}: anchor {} has score {} outside 0..=100",
        a.at, a.score
      )));
    }
    Ok(())
  }
}

// ─── Severity cut-offs ───────────────────────────────────────────────────────

/// Lower bounds (inclusive) of each severity band on the normalised score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityCutoffs {
  pub elevated: f64,
  pub high:     f64,
  pub critical: f64,
}

impl Default for SeverityCutoffs {
  fn default() -> Self { Self { elevated: 25.0, high: 60.0, critical: 90.0 } }
}

impl SeverityCutoffs {
  pub fn classify(&self, normalized_score: f64) -> Severity {
    if normalized_score >= self.critical {
      Severity::Critical
    } else if normalized_score >= self.high {
      Severity::High
    } else if normalized_score >= self.elevated {
      Severity::Elevated
    } else {
      Severity::Normal
    }
  }
}

// ─── Trend policy ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPolicy {
  /// How many of the most recent prior scores form the baseline.
  pub baseline_size:  usize,
  pub lookback_days:  i64,
  /// Fewer prior scores than this yields `INSUFFICIENT_DATA`.
  pub min_history:    usize,
  /// Movements of at most this many points are reported as stable.
  pub stability_band: f64,
}

impl Default for TrendPolicy {
  fn default() -> Self {
    Self {
      baseline_size:  5,
      lookback_days:  90,
      min_history:    2,
      stability_band: 3.0,
    }
  }
}

// ─── ThresholdConfig ─────────────────────────────────────────────────────────

/// Everything the extractor, calculator and trend detector need to turn
/// readings into a score. Identified by `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
  pub version:               u32,
  /// Oldest version whose scores remain comparable with this one for trend
  /// baselines. Equal to `version` when the change is not backwards
  /// comparable.
  pub compatible_from:       u32,
  pub weights:               BTreeMap<VitalCategory, f64>,
  pub systolic:              BoundaryTable,
  pub diastolic:             BoundaryTable,
  pub glucose_fasting:       BoundaryTable,
  pub glucose_post_meal:     BoundaryTable,
  pub glucose_random:        BoundaryTable,
  pub bmi:                   BoundaryTable,
  pub heart_rate:            BoundaryTable,
  #[serde(default)]
  pub severity:              SeverityCutoffs,
  pub reading_lookback_days: i64,
  /// Fewer scored categories than this yields `INSUFFICIENT_DATA`.
  pub min_categories:        usize,
  #[serde(default)]
  pub trend:                 TrendPolicy,
}

impl Default for ThresholdConfig {
  fn default() -> Self {
    Self {
      version:               1,
      compatible_from:       1,
      weights:               BTreeMap::from([
        (VitalCategory::BloodPressure, 0.4),
        (VitalCategory::Glucose, 0.3),
        (VitalCategory::Weight, 0.2),
        (VitalCategory::HeartRate, 0.1),
      ]),
      systolic:              BoundaryTable::step(&[
        anchor(0.0, 0.0),
        anchor(120.0, 25.0),
        anchor(140.0, 60.0),
        anchor(160.0, 100.0),
      ]),
      diastolic:             BoundaryTable::step(&[
        anchor(0.0, 0.0),
        anchor(80.0, 25.0),
        anchor(90.0, 60.0),
        anchor(100.0, 100.0),
      ]),
      // Hypoglycaemia is scored as harshly as severe hyperglycaemia.
      glucose_fasting:       BoundaryTable::step(&[
        anchor(0.0, 100.0),
        anchor(54.0, 60.0),
        anchor(70.0, 0.0),
        anchor(100.0, 25.0),
        anchor(126.0, 60.0),
        anchor(200.0, 100.0),
      ]),
      glucose_post_meal:     BoundaryTable::step(&[
        anchor(0.0, 100.0),
        anchor(54.0, 60.0),
        anchor(70.0, 0.0),
        anchor(140.0, 25.0),
        anchor(200.0, 60.0),
        anchor(300.0, 100.0),
      ]),
      glucose_random:        BoundaryTable::step(&[
        anchor(0.0, 100.0),
        anchor(54.0, 60.0),
        anchor(70.0, 0.0),
        anchor(140.0, 25.0),
        anchor(200.0, 60.0),
        anchor(250.0, 100.0),
      ]),
      bmi:                   BoundaryTable::linear(&[
        anchor(16.0, 60.0),
        anchor(18.5, 0.0),
        anchor(25.0, 0.0),
        anchor(30.0, 40.0),
        anchor(35.0, 70.0),
        anchor(40.0, 100.0),
      ]),
      heart_rate:            BoundaryTable::linear(&[
        anchor(40.0, 100.0),
        anchor(50.0, 60.0),
        anchor(60.0, 0.0),
        anchor(100.0, 0.0),
        anchor(120.0, 60.0),
        anchor(140.0, 100.0),
      ]),
      severity:              SeverityCutoffs::default(),
      reading_lookback_days: 30,
      min_categories:        2,
      trend:                 TrendPolicy::default(),
    }
  }
}

impl ThresholdConfig {
  pub fn weight(&self, category: VitalCategory) -> f64 {
    self.weights.get(&category).copied().unwrap_or(0.0)
  }

  pub fn glucose_table(&self, context: GlucoseContext) -> &BoundaryTable {
    match context {
      GlucoseContext::Fasting => &self.glucose_fasting,
      GlucoseContext::PostMeal => &self.glucose_post_meal,
      GlucoseContext::Random => &self.glucose_random,
    }
  }

  /// Whether a score computed under `version` may join a trend baseline
  /// computed under this config.
  pub fn is_comparable_with(&self, version: u32) -> bool {
    version >= self.compatible_from && version <= self.version
  }

  /// Reject configs that would produce scores outside `[0, 100]` or break
  /// the monotonicity of the composite.
  pub fn validate(&self) -> Result<()> {
    if self.compatible_from > self.version {
      return Err(Error::InvalidConfig(format!(
        "compatible_from {} is newer than version {}",
        self.compatible_from, self.version
      )));
    }
    if let Some((c, w)) =
      self.weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0)
    {
      return Err(Error::InvalidConfig(format!(
        "weight for {c} must be a non-negative number, got {w}"
      )));
    }
    for (name, table) in [
      ("systolic", &self.systolic),
      ("diastolic", &self.diastolic),
      ("glucose_fasting", &self.glucose_fasting),
      ("glucose_post_meal", &self.glucose_post_meal),
      ("glucose_random", &self.glucose_random),
      ("bmi", &self.bmi),
      ("heart_rate", &self.heart_rate),
    ] {
      table.validate(name)?;
    }
    let s = self.severity;
    if !(s.elevated <= s.high && s.high <= s.critical) {
      return Err(Error::InvalidConfig(
        "severity cut-offs must be ordered elevated <= high <= critical"
          .into(),
      ));
    }
    if self.reading_lookback_days <= 0 || self.trend.lookback_days <= 0 {
      return Err(Error::InvalidConfig("lookback windows must be positive".into()));
    }
    if self.min_categories == 0 {
      return Err(Error::InvalidConfig("min_categories must be at least 1".into()));
    }
    if self.trend.baseline_size == 0
      || self.trend.min_history > self.trend.baseline_size
    {
      return Err(Error::InvalidConfig(
        "trend min_history must be between 1 and baseline_size".into(),
      ));
    }
    if !(self.trend.stability_band.is_finite() && self.trend.stability_band >= 0.0) {
      return Err(Error::InvalidConfig(
        "trend stability_band must be non-negative".into(),
      ));
    }
    Ok(())
  }
}
