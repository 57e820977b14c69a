//! In-process cache of the latest scored result per subject.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use crrs_core::score::CrrsScore;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct LatestScoreCache {
  entries: RwLock<HashMap<Uuid, CrrsScore>>,
}

impl LatestScoreCache {
  pub fn new() -> Self { Self::default() }

  pub async fn get(&self, subject_id: Uuid) -> Option<CrrsScore> {
    self.entries.read().await.get(&subject_id).cloned()
  }

  /// Keep `score` unless it is unscored or older than what is cached.
  pub async fn put(&self, score: CrrsScore) {
    if !score.is_scored() {
      return;
    }
    let mut entries = self.entries.write().await;
    match entries.get(&score.subject_id) {
      Some(cached) if cached.computed_at > score.computed_at => {}
      _ => {
        entries.insert(score.subject_id, score);
      }
    }
  }

  /// Evict the subject's entry if a reading taken at `taken_at` falls
  /// inside its scoring window. Returns whether anything was evicted.
  pub async fn note_reading(&self, subject_id: Uuid, taken_at: DateTime<Utc>) -> bool {
    let mut entries = self.entries.write().await;
    match entries.get(&subject_id) {
      Some(cached) if taken_at >= cached.window_start => {
        entries.remove(&subject_id);
        true
      }
      _ => false,
    }
  }

  pub async fn invalidate(&self, subject_id: Uuid) {
    self.entries.write().await.remove(&subject_id);
  }
}
