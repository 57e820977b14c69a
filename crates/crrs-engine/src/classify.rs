//! Composite value to [`RiskTier`].

use crrs_core::score::RiskTier;

/// Bands are closed below and open above, so a value exactly on a boundary
/// lands in the higher tier.
pub fn classify(value: f64) -> RiskTier {
  if value >= 75.0 {
    RiskTier::Critical
  } else if value >= 50.0 {
    RiskTier::High
  } else if value >= 25.0 {
    RiskTier::Moderate
  } else {
    RiskTier::Low
  }
}
