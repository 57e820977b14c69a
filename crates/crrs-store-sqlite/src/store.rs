//! [`SqliteStore`]: the SQLite implementation of the collaborator traits.

use std::path::Path;

use chrono::{DateTime, Duration, SubsecRound as _, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crrs_core::{
  score::CrrsScore,
  store::{ConfigStore, ScoreStore, VitalStore},
  thresholds::ThresholdConfig,
  vital::{NewVitalReading, VitalCategory, VitalReading},
};

use crate::{
  encode::{encode_dt, encode_uuid, RawReading, RawScore},
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Readings, threshold configs and score history backed by a single SQLite
/// file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, run schema initialisation and seed
  /// the default threshold config if none has been published.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let default_json = serde_json::to_string(&ThresholdConfig::default())?;
    let now_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute_batch(SCHEMA)?;
        conn.execute(
          "INSERT INTO threshold_configs (version, config_json, published_at)
           SELECT 1, ?1, ?2
           WHERE NOT EXISTS (SELECT 1 FROM threshold_configs)",
          rusqlite::params![default_json, now_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── VitalStore impl ─────────────────────────────────────────────────────────

impl VitalStore for SqliteStore {
  type Error = Error;

  async fn record_reading(&self, input: NewVitalReading) -> Result<VitalReading> {
    // Timestamps are stored at microsecond precision; return what a later
    // read will see.
    let reading = VitalReading {
      reading_id:          Uuid::new_v4(),
      subject_id:          input.subject_id,
      value:               input.value,
      taken_at:            input.taken_at.trunc_subsecs(6),
      recorded_at:         Utc::now().trunc_subsecs(6),
      source_encounter_id: input.source_encounter_id,
    };

    let reading_id_str  = encode_uuid(reading.reading_id);
    let subject_id_str  = encode_uuid(reading.subject_id);
    let category_str    = reading.category().to_string();
    let value_json_str  = reading.value.to_json()?.to_string();
    let taken_at_str    = encode_dt(reading.taken_at);
    let recorded_at_str = encode_dt(reading.recorded_at);
    let encounter_str   = reading.source_encounter_id.map(encode_uuid);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO vital_readings (
             reading_id, subject_id, category, value_json,
             taken_at, recorded_at, source_encounter_id
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            reading_id_str,
            subject_id_str,
            category_str,
            value_json_str,
            taken_at_str,
            recorded_at_str,
            encounter_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(reading)
  }

  async fn readings(
    &self,
    subject_id: Uuid,
    category:   VitalCategory,
    as_of:      DateTime<Utc>,
    lookback:   Duration,
  ) -> Result<Vec<VitalReading>> {
    let subject_id_str = encode_uuid(subject_id);
    let category_str   = category.to_string();
    let from_str       = encode_dt(as_of - lookback);
    let to_str         = encode_dt(as_of);

    let raws: Vec<RawReading> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM vital_readings
           WHERE subject_id = ?1
             AND category = ?2
             AND taken_at >= ?3
             AND taken_at <= ?4
           ORDER BY taken_at ASC, recorded_at ASC",
          RawReading::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![subject_id_str, category_str, from_str, to_str],
            RawReading::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReading::into_reading).collect()
  }
}

// ─── ConfigStore impl ────────────────────────────────────────────────────────

impl ConfigStore for SqliteStore {
  type Error = Error;

  async fn active_threshold_config(&self) -> Result<ThresholdConfig> {
    let json: Option<String> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT config_json FROM threshold_configs
               ORDER BY version DESC LIMIT 1",
              [],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    let json = json.ok_or(Error::NoActiveConfig)?;
    Ok(serde_json::from_str(&json)?)
  }

  async fn publish_threshold_config(
    &self,
    mut config: ThresholdConfig,
  ) -> Result<ThresholdConfig> {
    let now_str = encode_dt(Utc::now());

    // Version assignment and insert share one transaction so concurrent
    // publishers cannot claim the same version.
    let published = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let next: u32 = tx.query_row(
          "SELECT COALESCE(MAX(version), 0) + 1 FROM threshold_configs",
          [],
          |row| row.get(0),
        )?;
        config.version = next;
        config.compatible_from = config.compatible_from.min(next);
        config
          .validate()
          .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
        let json = serde_json::to_string(&config)
          .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
        tx.execute(
          "INSERT INTO threshold_configs (version, config_json, published_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![next, json, now_str],
        )?;
        tx.commit()?;
        Ok(config)
      })
      .await?;

    Ok(published)
  }
}

// ─── ScoreStore impl ─────────────────────────────────────────────────────────

impl ScoreStore for SqliteStore {
  type Error = Error;

  async fn append_score(&self, score: &CrrsScore) -> Result<()> {
    let raw = RawScore::from_score(score)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO crrs_scores ({}) VALUES
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
              ?16, ?17)",
            RawScore::COLUMNS
          ),
          rusqlite::params![
            raw.score_id,
            raw.subject_id,
            raw.status,
            raw.crrs_value,
            raw.risk_tier,
            raw.present,
            raw.required,
            raw.trend,
            raw.baseline,
            raw.delta,
            raw.explanation_json,
            raw.breakdown_json,
            raw.config_version,
            raw.input_digest,
            raw.computed_at,
            raw.window_start,
            raw.window_end,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn latest_score(&self, subject_id: Uuid) -> Result<Option<CrrsScore>> {
    let subject_id_str = encode_uuid(subject_id);

    let raw: Option<RawScore> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM crrs_scores
           WHERE subject_id = ?1
           ORDER BY computed_at DESC, seq DESC
           LIMIT 1",
          RawScore::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![subject_id_str], RawScore::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawScore::into_score).transpose()
  }

  async fn scores_between(
    &self,
    subject_id: Uuid,
    from:       DateTime<Utc>,
    to:         DateTime<Utc>,
  ) -> Result<Vec<CrrsScore>> {
    let subject_id_str = encode_uuid(subject_id);
    let from_str       = encode_dt(from);
    let to_str         = encode_dt(to);

    let raws: Vec<RawScore> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM crrs_scores
           WHERE subject_id = ?1
             AND computed_at >= ?2
             AND computed_at <= ?3
           ORDER BY computed_at ASC, seq ASC",
          RawScore::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![subject_id_str, from_str, to_str],
            RawScore::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawScore::into_score).collect()
  }
}
