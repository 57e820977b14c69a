//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, Duration, TimeZone, Utc};
use crrs_core::{
  score::{
    Contribution, CrrsScore, FactorSnapshot, RiskTier, ScoreOutcome, Severity,
    Trend,
  },
  store::{ConfigStore, ScoreStore, VitalStore},
  thresholds::ThresholdConfig,
  vital::{
    BloodPressureValue, GlucoseContext, GlucoseValue, HeartRateValue,
    NewVitalReading, VitalCategory, VitalValue,
  },
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
}

fn bp(subject_id: Uuid, systolic: f64, taken_at: DateTime<Utc>) -> NewVitalReading {
  NewVitalReading {
    subject_id,
    value: VitalValue::BloodPressure(BloodPressureValue {
      systolic,
      diastolic: 80.0,
    }),
    taken_at,
    source_encounter_id: None,
  }
}

fn scored(subject_id: Uuid, value: f64, computed_at: DateTime<Utc>) -> CrrsScore {
  CrrsScore {
    score_id: Uuid::new_v4(),
    subject_id,
    outcome: ScoreOutcome::Scored { value, risk_tier: RiskTier::Moderate },
    trend: Trend::Stable,
    baseline: Some(value - 1.0),
    delta: Some(1.0),
    explanation: vec![Contribution {
      factor:           VitalCategory::BloodPressure,
      contribution_pct: 70,
    }],
    breakdown: vec![FactorSnapshot {
      category:         VitalCategory::BloodPressure,
      normalized_score: 60.0,
      severity:         Severity::High,
      weight:           0.4,
    }],
    config_version: 1,
    input_digest: format!("digest-{value}"),
    computed_at,
    window_start: computed_at - Duration::days(30),
    window_end: computed_at,
  }
}

// ─── Readings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_reading_assigns_id_and_recorded_at() {
  let s = store().await;
  let subject = Uuid::new_v4();
  let encounter = Uuid::new_v4();

  let mut input = bp(subject, 132.0, at(3, 8));
  input.source_encounter_id = Some(encounter);
  let reading = s.record_reading(input).await.unwrap();

  assert_eq!(reading.subject_id, subject);
  assert_eq!(reading.source_encounter_id, Some(encounter));
  assert_ne!(reading.reading_id, Uuid::nil());

  let fetched = s
    .readings(subject, VitalCategory::BloodPressure, at(4, 0), Duration::days(30))
    .await
    .unwrap();
  assert_eq!(fetched, vec![reading]);
}

#[tokio::test]
async fn returned_reading_matches_stored_precision() {
  let s = store().await;
  let subject = Uuid::new_v4();
  let taken_at = at(3, 8) + Duration::nanoseconds(987_654_321);

  let reading = s.record_reading(bp(subject, 128.0, taken_at)).await.unwrap();
  assert_eq!(reading.taken_at, at(3, 8) + Duration::microseconds(987_654));
  assert_eq!(reading.recorded_at.timestamp_subsec_nanos() % 1_000, 0);

  let fetched = s
    .readings(subject, VitalCategory::BloodPressure, at(4, 0), Duration::days(30))
    .await
    .unwrap();
  assert_eq!(fetched, vec![reading]);
}

#[tokio::test]
async fn readings_are_filtered_by_window_category_and_subject() {
  let s = store().await;
  let subject = Uuid::new_v4();
  let other = Uuid::new_v4();

  s.record_reading(bp(subject, 120.0, at(1, 8))).await.unwrap();
  s.record_reading(bp(subject, 130.0, at(10, 8))).await.unwrap();
  s.record_reading(bp(subject, 140.0, at(20, 8))).await.unwrap();
  s.record_reading(bp(other, 150.0, at(10, 9))).await.unwrap();
  s.record_reading(NewVitalReading {
    subject_id:          subject,
    value:               VitalValue::HeartRate(HeartRateValue { bpm: 70.0 }),
    taken_at:            at(10, 10),
    source_encounter_id: None,
  })
  .await
  .unwrap();

  // Window [May 5, May 15].
  let fetched = s
    .readings(subject, VitalCategory::BloodPressure, at(15, 0), Duration::days(10))
    .await
    .unwrap();
  assert_eq!(fetched.len(), 1);
  assert_eq!(
    fetched[0].value,
    VitalValue::BloodPressure(BloodPressureValue {
      systolic:  130.0,
      diastolic: 80.0,
    })
  );
}

#[tokio::test]
async fn readings_are_ordered_by_taken_at() {
  let s = store().await;
  let subject = Uuid::new_v4();

  // Recorded out of order (a backdated entry arrives last).
  s.record_reading(bp(subject, 130.0, at(12, 8))).await.unwrap();
  s.record_reading(bp(subject, 125.0, at(14, 8))).await.unwrap();
  s.record_reading(bp(subject, 140.0, at(2, 8))).await.unwrap();

  let fetched = s
    .readings(subject, VitalCategory::BloodPressure, at(20, 0), Duration::days(30))
    .await
    .unwrap();
  let times: Vec<_> = fetched.iter().map(|r| r.taken_at).collect();
  assert_eq!(times, vec![at(2, 8), at(12, 8), at(14, 8)]);
}

#[tokio::test]
async fn window_bounds_are_inclusive() {
  let s = store().await;
  let subject = Uuid::new_v4();
  s.record_reading(bp(subject, 130.0, at(5, 0))).await.unwrap();
  s.record_reading(bp(subject, 131.0, at(15, 0))).await.unwrap();

  let fetched = s
    .readings(subject, VitalCategory::BloodPressure, at(15, 0), Duration::days(10))
    .await
    .unwrap();
  assert_eq!(fetched.len(), 2);
}

#[tokio::test]
async fn glucose_context_survives_storage() {
  let s = store().await;
  let subject = Uuid::new_v4();
  let value = VitalValue::Glucose(GlucoseValue {
    mg_dl:   165.0,
    context: GlucoseContext::PostMeal,
  });
  s.record_reading(NewVitalReading {
    subject_id: subject,
    value,
    taken_at: at(9, 13),
    source_encounter_id: None,
  })
  .await
  .unwrap();

  let fetched = s
    .readings(subject, VitalCategory::Glucose, at(10, 0), Duration::days(30))
    .await
    .unwrap();
  assert_eq!(fetched[0].value, value);
}

// ─── Threshold configs ───────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_store_serves_default_config() {
  let s = store().await;
  let active = s.active_threshold_config().await.unwrap();
  assert_eq!(active, ThresholdConfig::default());
}

#[tokio::test]
async fn publishing_assigns_next_version_and_becomes_active() {
  let s = store().await;

  let mut next = ThresholdConfig::default();
  next.version = 99; // ignored
  next.compatible_from = 1;
  next.trend.stability_band = 5.0;

  let published = s.publish_threshold_config(next).await.unwrap();
  assert_eq!(published.version, 2);
  assert_eq!(published.compatible_from, 1);

  let active = s.active_threshold_config().await.unwrap();
  assert_eq!(active, published);
  assert_eq!(active.trend.stability_band, 5.0);
}

#[tokio::test]
async fn invalid_config_is_not_published() {
  let s = store().await;
  let mut bad = ThresholdConfig::default();
  bad.min_categories = 0;

  let err = s.publish_threshold_config(bad).await.unwrap_err();
  assert!(matches!(err, Error::Database(_)), "{err:?}");

  let active = s.active_threshold_config().await.unwrap();
  assert_eq!(active.version, 1);
}

// ─── Scores ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn latest_score_missing_returns_none() {
  let s = store().await;
  assert!(s.latest_score(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn appended_score_reads_back_identically() {
  let s = store().await;
  let subject = Uuid::new_v4();
  let score = scored(subject, 42.5, at(6, 12));

  s.append_score(&score).await.unwrap();
  let latest = s.latest_score(subject).await.unwrap().unwrap();
  assert_eq!(latest, score);
}

#[tokio::test]
async fn insufficient_outcome_reads_back() {
  let s = store().await;
  let subject = Uuid::new_v4();
  let mut score = scored(subject, 0.0, at(6, 12));
  score.outcome = ScoreOutcome::InsufficientData { present: 1, required: 2 };
  score.trend = Trend::InsufficientData;
  score.explanation.clear();

  s.append_score(&score).await.unwrap();
  let latest = s.latest_score(subject).await.unwrap().unwrap();
  assert_eq!(latest.outcome, score.outcome);
  assert_eq!(latest.value(), None);
}

#[tokio::test]
async fn history_is_append_only_and_ordered() {
  let s = store().await;
  let subject = Uuid::new_v4();

  let first = scored(subject, 30.0, at(1, 12));
  let second = scored(subject, 35.0, at(8, 12));
  // Same computed_at as `second`: both are kept, in insertion order.
  let third = scored(subject, 36.0, at(8, 12));
  s.append_score(&second).await.unwrap();
  s.append_score(&first).await.unwrap();
  s.append_score(&third).await.unwrap();

  let all = s.scores_between(subject, at(1, 0), at(31, 0)).await.unwrap();
  let values: Vec<_> = all.iter().filter_map(CrrsScore::value).collect();
  assert_eq!(values, vec![30.0, 35.0, 36.0]);

  let latest = s.latest_score(subject).await.unwrap().unwrap();
  assert_eq!(latest.score_id, third.score_id);

  let ranged = s.scores_between(subject, at(2, 0), at(31, 0)).await.unwrap();
  assert_eq!(ranged.len(), 2);
}

#[tokio::test]
async fn duplicate_score_id_is_rejected() {
  let s = store().await;
  let score = scored(Uuid::new_v4(), 50.0, at(3, 3));
  s.append_score(&score).await.unwrap();
  assert!(s.append_score(&score).await.is_err());
}
