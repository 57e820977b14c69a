//! Human-readable drivers behind a composite value.

use crrs_core::{
  score::{Contribution, Severity},
  thresholds::ThresholdConfig,
  vital::VitalCategory,
};

use crate::extract::FactorScores;

/// At most this many drivers are reported.
pub const MAX_DRIVERS: usize = 3;

/// Rank the non-normal scored factors by their share of the weighted total.
///
/// Shares are taken against the sum over every scored factor (normal ones
/// included), so they need not add up to 100. Ties keep category order.
pub fn explain(factors: &FactorScores, config: &ThresholdConfig) -> Vec<Contribution> {
  let weighted = |score: f64, category: VitalCategory| score * config.weight(category);

  let total: f64 = factors
    .values()
    .filter(|f| f.is_scored())
    .map(|f| weighted(f.normalized_score, f.category))
    .sum();
  if total <= 0.0 {
    return Vec::new();
  }

  let mut drivers: Vec<_> = factors
    .values()
    .filter(|f| f.is_scored() && f.severity != Severity::Normal)
    .map(|f| (f.category, weighted(f.normalized_score, f.category) / total * 100.0))
    .filter(|&(_, share)| share > 0.0)
    .collect();
  drivers.sort_by(|a, b| b.1.total_cmp(&a.1));
  drivers.truncate(MAX_DRIVERS);

  drivers
    .into_iter()
    .map(|(factor, share)| Contribution {
      factor,
      contribution_pct: share.round().clamp(0.0, 100.0) as u8,
    })
    .collect()
}
