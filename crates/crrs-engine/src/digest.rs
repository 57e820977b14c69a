//! Fingerprint of the inputs behind a score.
//!
//! Two computations with the same digest selected the same readings under
//! the same config and so produce the same result.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::extract::FactorScores;

/// SHA-256 over the subject, the config version and each contributing
/// reading's id and `taken_at`, in category order. Hex-encoded.
pub fn input_digest(
  subject_id: Uuid,
  config_version: u32,
  factors: &FactorScores,
) -> String {
  let mut hasher = Sha256::new();
  hasher.update(subject_id.as_bytes());
  hasher.update(config_version.to_be_bytes());

  for factor in factors.values() {
    hasher.update(factor.category.as_ref().as_bytes());
    match &factor.contributing_reading {
      Some(reading) => {
        hasher.update([1u8]);
        hasher.update(reading.reading_id.as_bytes());
        hasher.update(micros(reading.taken_at).to_be_bytes());
      }
      None => hasher.update([0u8]),
    }
  }

  hex::encode(hasher.finalize())
}

fn micros(at: DateTime<Utc>) -> i64 { at.timestamp_micros() }
