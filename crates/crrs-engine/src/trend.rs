//! Trend detection against a rolling baseline of prior scores.

use chrono::{DateTime, Duration, Utc};
use crrs_core::{
  score::{CrrsScore, Trend},
  thresholds::ThresholdConfig,
};
use tracing::debug;

use crate::aggregate::round1;

#[derive(Debug, Clone, PartialEq)]
pub struct TrendReport {
  pub trend:    Trend,
  /// Mean of the prior scores used, when there were enough of them.
  pub baseline: Option<f64>,
  /// `current - baseline`, rounded to one decimal place.
  pub delta:    Option<f64>,
  /// Prior scores that made it into the baseline.
  pub samples:  usize,
  /// Prior scores skipped because their config version is not comparable.
  pub excluded: usize,
}

impl TrendReport {
  fn insufficient(samples: usize, excluded: usize) -> Self {
    Self { trend: Trend::InsufficientData, baseline: None, delta: None, samples, excluded }
  }
}

/// Compare `current` with the mean of up to `baseline_size` most recent
/// scored entries in `history` computed strictly before `computed_at` and
/// within the lookback.
///
/// A delta exactly on the stability band is [`Trend::Stable`].
pub fn detect_trend(
  history: &[CrrsScore],
  current: f64,
  computed_at: DateTime<Utc>,
  config: &ThresholdConfig,
) -> TrendReport {
  let policy = &config.trend;
  let since = computed_at - Duration::days(policy.lookback_days);

  let mut excluded = 0;
  let mut prior: Vec<(DateTime<Utc>, f64)> = history
    .iter()
    .filter(|s| s.computed_at < computed_at && s.computed_at >= since)
    .filter_map(|s| {
      let value = s.value()?;
      if config.is_comparable_with(s.config_version) {
        Some((s.computed_at, value))
      } else {
        let mismatch = crrs_core::Error::ConfigVersionMismatch {
          expected_from: config.compatible_from,
          found:         s.config_version,
        };
        debug!(score_id = %s.score_id, "excluded from baseline: {mismatch}");
        excluded += 1;
        None
      }
    })
    .collect();

  // Stable sort keeps store order for equal timestamps.
  prior.sort_by_key(|&(at, _)| at);
  let recent = &prior[prior.len().saturating_sub(policy.baseline_size)..];

  if recent.len() < policy.min_history || recent.is_empty() {
    return TrendReport::insufficient(recent.len(), excluded);
  }

  let baseline = recent.iter().map(|&(_, v)| v).sum::<f64>() / recent.len() as f64;
  let delta = round1(current - baseline);
  let band = policy.stability_band;

  let trend = if delta > band {
    Trend::Worsening
  } else if delta < -band {
    Trend::Improving
  } else {
    Trend::Stable
  };

  TrendReport {
    trend,
    baseline: Some(baseline),
    delta: Some(delta),
    samples: recent.len(),
    excluded,
  }
}
