//! Risk factor extraction: readings in, one normalised score per category
//! out.
//!
//! Pure: the result depends only on the readings, the config and `as_of`.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use crrs_core::{
  score::{FactorSnapshot, Severity},
  thresholds::ThresholdConfig,
  vital::{VitalCategory, VitalReading, VitalValue},
};
use tracing::warn;

/// One category's contribution to a scoring pass. Never persisted on its
/// own; see [`FactorSnapshot`] for the form kept on score records.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskFactorScore {
  pub category:             VitalCategory,
  /// `[0, 100]`; zero when the category is unknown.
  pub normalized_score:     f64,
  pub severity:             Severity,
  pub contributing_reading: Option<VitalReading>,
}

impl RiskFactorScore {
  pub fn unknown(category: VitalCategory) -> Self {
    Self {
      category,
      normalized_score: 0.0,
      severity: Severity::Unknown,
      contributing_reading: None,
    }
  }

  /// Whether this factor takes part in aggregation.
  pub fn is_scored(&self) -> bool { self.severity != Severity::Unknown }
}

/// Every category, keyed in canonical order.
pub type FactorScores = BTreeMap<VitalCategory, RiskFactorScore>;

#[derive(Debug)]
pub struct Extraction {
  pub factors:      FactorScores,
  /// `InvalidReading` errors for readings skipped inside the window.
  pub rejected:     Vec<crrs_core::Error>,
  pub window_start: DateTime<Utc>,
  pub window_end:   DateTime<Utc>,
}

impl Extraction {
  pub fn scored(&self) -> impl Iterator<Item = &RiskFactorScore> {
    self.factors.values().filter(|f| f.is_scored())
  }

  /// Snapshot of the scored factors for the persisted record.
  pub fn breakdown(&self, config: &ThresholdConfig) -> Vec<FactorSnapshot> {
    self
      .scored()
      .map(|f| FactorSnapshot {
        category:         f.category,
        normalized_score: f.normalized_score,
        severity:         f.severity,
        weight:           config.weight(f.category),
      })
      .collect()
  }
}

/// Map a raw value to `[0, 100]` against the config's reference tables.
///
/// Blood pressure takes the worse of its systolic and diastolic mappings.
pub fn normalize(value: &VitalValue, config: &ThresholdConfig) -> f64 {
  match value {
    VitalValue::BloodPressure(bp) => config
      .systolic
      .score(bp.systolic)
      .max(config.diastolic.score(bp.diastolic)),
    VitalValue::Glucose(g) => config.glucose_table(g.context).score(g.mg_dl),
    VitalValue::Weight(w) => config.bmi.score(w.bmi()),
    VitalValue::HeartRate(hr) => config.heart_rate.score(hr.bpm),
  }
}

/// For each category, score the most recent valid reading taken within
/// `[as_of - lookback, as_of]`. Categories without one are
/// [`Severity::Unknown`].
pub fn extract(
  readings: &[VitalReading],
  config: &ThresholdConfig,
  as_of: DateTime<Utc>,
) -> Extraction {
  let window_start = as_of - Duration::days(config.reading_lookback_days);
  let mut latest: BTreeMap<VitalCategory, &VitalReading> = BTreeMap::new();
  let mut rejected = Vec::new();

  for reading in readings {
    if reading.taken_at < window_start || reading.taken_at > as_of {
      continue;
    }
    if let Err(e) = reading.validate() {
      warn!(reading_id = %reading.reading_id, "skipping reading: {e}");
      rejected.push(e);
      continue;
    }
    let key = |r: &VitalReading| (r.taken_at, r.recorded_at, r.reading_id);
    latest
      .entry(reading.category())
      .and_modify(|best| {
        if key(reading) > key(best) {
          *best = reading;
        }
      })
      .or_insert(reading);
  }

  let factors = VitalCategory::ALL
    .into_iter()
    .map(|category| {
      let factor = match latest.get(&category) {
        Some(reading) => {
          let normalized_score = normalize(&reading.value, config);
          RiskFactorScore {
            category,
            normalized_score,
            severity: config.severity.classify(normalized_score),
            contributing_reading: Some((*reading).clone()),
          }
        }
        None => RiskFactorScore::unknown(category),
      };
      (category, factor)
    })
    .collect();

  Extraction { factors, rejected, window_start, window_end: as_of }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use crrs_core::vital::{
    BloodPressureValue, GlucoseContext, GlucoseValue, HeartRateValue,
    WeightValue,
  };
  use uuid::Uuid;

  use super::*;

  fn as_of() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap() }

  fn reading(value: VitalValue, days_ago: i64) -> VitalReading {
    let taken_at = as_of() - Duration::days(days_ago);
    VitalReading {
      reading_id: Uuid::new_v4(),
      subject_id: Uuid::nil(),
      value,
      taken_at,
      recorded_at: taken_at,
      source_encounter_id: None,
    }
  }

  fn bp(systolic: f64, diastolic: f64) -> VitalValue {
    VitalValue::BloodPressure(BloodPressureValue { systolic, diastolic })
  }

  fn glucose(mg_dl: f64, context: GlucoseContext) -> VitalValue {
    VitalValue::Glucose(GlucoseValue { mg_dl, context })
  }

  #[test]
  fn most_recent_reading_in_window_wins() {
    let readings = vec![
      reading(bp(165.0, 85.0), 10),
      reading(bp(125.0, 75.0), 2),
      reading(bp(150.0, 70.0), 5),
    ];
    let e = extract(&readings, &ThresholdConfig::default(), as_of());
    let f = &e.factors[&VitalCategory::BloodPressure];
    assert_eq!(f.normalized_score, 25.0);
    assert_eq!(f.severity, Severity::Elevated);
    assert_eq!(f.contributing_reading.as_ref(), Some(&readings[1]));
  }

  #[test]
  fn readings_outside_window_are_ignored() {
    let readings = vec![
      reading(bp(170.0, 95.0), 31),
      reading(VitalValue::HeartRate(HeartRateValue { bpm: 70.0 }), -1),
    ];
    let e = extract(&readings, &ThresholdConfig::default(), as_of());
    assert!(e.factors.values().all(|f| f.severity == Severity::Unknown));
    assert_eq!(e.scored().count(), 0);
  }

  #[test]
  fn missing_categories_are_unknown_not_normal() {
    let readings = vec![reading(bp(118.0, 76.0), 1)];
    let e = extract(&readings, &ThresholdConfig::default(), as_of());
    assert_eq!(e.factors.len(), 4);
    assert_eq!(e.factors[&VitalCategory::BloodPressure].severity, Severity::Normal);
    assert_eq!(e.factors[&VitalCategory::Glucose].severity, Severity::Unknown);
    assert!(!e.factors[&VitalCategory::Weight].is_scored());
  }

  #[test]
  fn blood_pressure_takes_the_worse_component() {
    let config = ThresholdConfig::default();
    // Systolic normal, diastolic stage 2.
    assert_eq!(normalize(&bp(118.0, 102.0), &config), 100.0);
    // Systolic stage 1, diastolic normal.
    assert_eq!(normalize(&bp(145.0, 70.0), &config), 60.0);
  }

  #[test]
  fn glucose_context_selects_the_table() {
    let config = ThresholdConfig::default();
    let fasting = normalize(&glucose(150.0, GlucoseContext::Fasting), &config);
    let post_meal = normalize(&glucose(150.0, GlucoseContext::PostMeal), &config);
    assert_eq!(fasting, 60.0);
    assert_eq!(post_meal, 25.0);
  }

  #[test]
  fn hypoglycaemia_is_high_risk() {
    let config = ThresholdConfig::default();
    assert_eq!(normalize(&glucose(50.0, GlucoseContext::Random), &config), 100.0);
  }

  #[test]
  fn weight_is_scored_by_bmi() {
    let config = ThresholdConfig::default();
    let healthy = VitalValue::Weight(WeightValue { kg: 70.0, height_cm: 175.0 });
    let obese = VitalValue::Weight(WeightValue { kg: 125.0, height_cm: 175.0 });
    assert_eq!(normalize(&healthy, &config), 0.0);
    assert!(normalize(&obese, &config) > 60.0);
  }

  #[test]
  fn invalid_reading_is_skipped_and_older_valid_one_used() {
    let readings = vec![
      reading(VitalValue::Weight(WeightValue { kg: 82.0, height_cm: 180.0 }), 6),
      reading(VitalValue::Weight(WeightValue { kg: -4.0, height_cm: 180.0 }), 1),
    ];
    let e = extract(&readings, &ThresholdConfig::default(), as_of());
    let f = &e.factors[&VitalCategory::Weight];
    assert!(f.is_scored());
    assert_eq!(f.contributing_reading.as_ref(), Some(&readings[0]));
    assert_eq!(e.rejected.len(), 1);
    assert!(matches!(
      e.rejected[0],
      crrs_core::Error::InvalidReading { reading_id, .. } if reading_id == readings[1].reading_id
    ));
  }

  #[test]
  fn only_invalid_readings_leave_the_category_unknown() {
    let readings =
      vec![reading(VitalValue::HeartRate(HeartRateValue { bpm: 900.0 }), 1)];
    let e = extract(&readings, &ThresholdConfig::default(), as_of());
    assert_eq!(e.factors[&VitalCategory::HeartRate].severity, Severity::Unknown);
  }

  #[test]
  fn window_spans_the_configured_lookback() {
    let config = ThresholdConfig { reading_lookback_days: 7, ..Default::default() };
    let e = extract(&[], &config, as_of());
    assert_eq!(e.window_end, as_of());
    assert_eq!(e.window_start, as_of() - Duration::days(7));
  }

  #[test]
  fn breakdown_lists_scored_factors_with_weights() {
    let readings = vec![
      reading(bp(150.0, 85.0), 1),
      reading(glucose(95.0, GlucoseContext::Fasting), 1),
    ];
    let config = ThresholdConfig::default();
    let breakdown = extract(&readings, &config, as_of()).breakdown(&config);
    assert_eq!(breakdown.len(), 2);
    assert_eq!(breakdown[0].category, VitalCategory::BloodPressure);
    assert_eq!(breakdown[0].weight, 0.4);
    assert_eq!(breakdown[1].severity, Severity::Normal);
  }
}
