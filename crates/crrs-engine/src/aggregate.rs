//! Weighted composite of the scored risk factors.

use crrs_core::thresholds::ThresholdConfig;

use crate::extract::FactorScores;

/// Result of aggregation. Too few usable categories is an outcome, not an
/// error, so callers can still report it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Composite {
  /// `[0, 100]`, rounded to one decimal place.
  Value(f64),
  InsufficientData { present: usize, required: usize },
}

/// Round to one decimal place, half away from zero.
pub fn round1(v: f64) -> f64 { (v * 10.0).round() / 10.0 }

/// Weighted mean of the scored factors.
///
/// Weights are renormalised over the categories that are present, so a
/// missing category neither drags the value towards zero nor inflates it.
/// Categories whose configured weight is zero do not count as present.
pub fn aggregate(factors: &FactorScores, config: &ThresholdConfig) -> Composite {
  let (present, weighted, total_weight) = factors
    .values()
    .filter(|f| f.is_scored())
    .map(|f| (f.normalized_score, config.weight(f.category)))
    .filter(|&(_, w)| w > 0.0)
    .fold((0, 0.0, 0.0), |(n, sum, total), (score, w)| {
      (n + 1, sum + score * w, total + w)
    });

  let required = config.min_categories;
  if present < required || present == 0 {
    return Composite::InsufficientData { present, required };
  }

  Composite::Value(round1((weighted / total_weight).clamp(0.0, 100.0)))
}

#[cfg(test)]
mod tests {
  use crrs_core::{score::Severity, vital::VitalCategory};

  use super::*;
  use crate::extract::RiskFactorScore;

  fn factors(scores: &[(VitalCategory, f64)]) -> FactorScores {
    let config = ThresholdConfig::default();
    VitalCategory::ALL
      .into_iter()
      .map(|category| {
        let factor = match scores.iter().find(|(c, _)| *c == category) {
          Some(&(_, s)) => RiskFactorScore {
            category,
            normalized_score: s,
            severity: config.severity.classify(s),
            contributing_reading: None,
          },
          None => RiskFactorScore::unknown(category),
        };
        (category, factor)
      })
      .collect()
  }

  #[test]
  fn single_category_renormalises_to_its_own_score() {
    let config = ThresholdConfig { min_categories: 1, ..Default::default() };
    let f = factors(&[(VitalCategory::Glucose, 80.0)]);
    assert_eq!(aggregate(&f, &config), Composite::Value(80.0));
  }

  #[test]
  fn weights_are_renormalised_over_present_categories() {
    let config = ThresholdConfig::default();
    // (0.4 * 60 + 0.1 * 10) / 0.5 = 50
    let f = factors(&[
      (VitalCategory::BloodPressure, 60.0),
      (VitalCategory::HeartRate, 10.0),
    ]);
    assert_eq!(aggregate(&f, &config), Composite::Value(50.0));
  }

  #[test]
  fn all_categories_use_the_configured_weights() {
    let config = ThresholdConfig::default();
    // 0.4*60 + 0.3*25 + 0.2*40 + 0.1*0 = 39.5
    let f = factors(&[
      (VitalCategory::BloodPressure, 60.0),
      (VitalCategory::Glucose, 25.0),
      (VitalCategory::Weight, 40.0),
      (VitalCategory::HeartRate, 0.0),
    ]);
    assert_eq!(aggregate(&f, &config), Composite::Value(39.5));
  }

  #[test]
  fn fewer_than_min_categories_is_insufficient() {
    let config = ThresholdConfig::default();
    let f = factors(&[(VitalCategory::BloodPressure, 90.0)]);
    assert_eq!(
      aggregate(&f, &config),
      Composite::InsufficientData { present: 1, required: 2 }
    );
    assert_eq!(
      aggregate(&factors(&[]), &config),
      Composite::InsufficientData { present: 0, required: 2 }
    );
  }

  #[test]
  fn zero_weight_categories_do_not_count_as_present() {
    let mut config = ThresholdConfig::default();
    config.weights.insert(VitalCategory::HeartRate, 0.0);
    let f = factors(&[
      (VitalCategory::BloodPressure, 60.0),
      (VitalCategory::HeartRate, 100.0),
    ]);
    assert_eq!(
      aggregate(&f, &config),
      Composite::InsufficientData { present: 1, required: 2 }
    );
  }

  #[test]
  fn unknown_factors_are_not_treated_as_zero() {
    let config = ThresholdConfig::default();
    let mut f = factors(&[
      (VitalCategory::BloodPressure, 60.0),
      (VitalCategory::Glucose, 60.0),
    ]);
    assert_eq!(aggregate(&f, &config), Composite::Value(60.0));
    // An unknown factor carries a zero score; it must still be ignored.
    let weight = f.get_mut(&VitalCategory::Weight).unwrap();
    assert_eq!(weight.severity, Severity::Unknown);
    weight.normalized_score = 0.0;
    assert_eq!(aggregate(&f, &config), Composite::Value(60.0));
  }

  #[test]
  fn value_is_rounded_to_one_decimal() {
    let config = ThresholdConfig::default();
    // (0.4 * 33.33 + 0.3 * 10) / 0.7 = 23.331...
    let f = factors(&[
      (VitalCategory::BloodPressure, 33.33),
      (VitalCategory::Glucose, 10.0),
    ]);
    assert_eq!(aggregate(&f, &config), Composite::Value(23.3));
  }

  #[test]
  fn value_stays_within_bounds() {
    let config = ThresholdConfig::default();
    let all = |s: f64| factors(&VitalCategory::ALL.map(|c| (c, s)));
    assert_eq!(aggregate(&all(0.0), &config), Composite::Value(0.0));
    assert_eq!(aggregate(&all(100.0), &config), Composite::Value(100.0));
  }

  #[test]
  fn raising_any_factor_never_lowers_the_value() {
    let config = ThresholdConfig::default();
    let base = [
      (VitalCategory::BloodPressure, 40.0),
      (VitalCategory::Glucose, 20.0),
      (VitalCategory::Weight, 55.0),
      (VitalCategory::HeartRate, 5.0),
    ];
    let value = |scores: &[(VitalCategory, f64)]| match aggregate(&factors(scores), &config) {
      Composite::Value(v) => v,
      other => panic!("unexpected {other:?}"),
    };
    let before = value(&base);
    for i in 0..base.len() {
      for bump in [0.1, 5.0, 40.0] {
        let mut raised = base;
        raised[i].1 = (raised[i].1 + bump).min(100.0);
        assert!(value(&raised) >= before, "{:?} +{bump}", raised[i].0);
      }
    }
  }
}
