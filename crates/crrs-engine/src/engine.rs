//! [`Engine`] runs the scoring pipeline against the collaborator stores.

use std::{future::Future, sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, SubsecRound as _, Utc};
use crrs_core::{
  score::{CrrsScore, ScoreOutcome, Trend},
  store::{ConfigStore, ScoreStore, VitalStore},
  thresholds::ThresholdConfig,
  vital::{NewVitalReading, VitalCategory, VitalReading},
};
use tokio::{sync::RwLock, time::Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
  aggregate::{Composite, aggregate},
  cache::LatestScoreCache,
  classify::classify,
  digest::input_digest,
  error::{Error, Result, UpstreamFailure},
  explain::explain,
  extract::extract,
  lock::SubjectLocks,
  trend::detect_trend,
};

const VITAL_STORE: &str = "vital store";
const CONFIG_STORE: &str = "config store";
const SCORE_STORE: &str = "score store";

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Upper bound on every collaborator read.
  pub read_timeout: StdDuration,
  /// How long the active threshold config is reused before the config
  /// store is asked again.
  pub config_ttl:   StdDuration,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      read_timeout: StdDuration::from_secs(5),
      config_ttl:   StdDuration::from_secs(60),
    }
  }
}

struct CachedConfig {
  config:     ThresholdConfig,
  fetched_at: Instant,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// The store bundle the engine needs.
pub trait Stores: VitalStore + ConfigStore + ScoreStore + Send + Sync + 'static {}

impl<S> Stores for S where S: VitalStore + ConfigStore + ScoreStore + Send + Sync + 'static {}

pub struct Engine<S> {
  store:      Arc<S>,
  config:     EngineConfig,
  cache:      LatestScoreCache,
  locks:      SubjectLocks,
  thresholds: RwLock<Option<CachedConfig>>,
}

impl<S: Stores> Engine<S> {
  pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
    Self {
      store,
      config,
      cache: LatestScoreCache::new(),
      locks: SubjectLocks::new(),
      thresholds: RwLock::new(None),
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Score the subject as of now.
  pub async fn compute_current_score(&self, subject_id: Uuid) -> Result<CrrsScore> {
    self.compute_as_of(subject_id, Utc::now()).await
  }

  /// Force a computation, bypassing the cached latest score. The digest
  /// check still applies, so unchanged inputs return the existing record.
  pub async fn recompute(&self, subject_id: Uuid) -> Result<CrrsScore> {
    self.cache.invalidate(subject_id).await;
    self.compute_current_score(subject_id).await
  }

  /// Score the subject as the data stood at `as_of`.
  ///
  /// Scored results are appended to history unless the latest stored score
  /// was computed from the same inputs, in which case that record is
  /// returned. Insufficient-data results are returned but never stored.
  ///
  /// `as_of` is truncated to microseconds, the precision of the store.
  #[instrument(skip_all, fields(%subject_id, %as_of))]
  pub async fn compute_as_of(
    &self,
    subject_id: Uuid,
    as_of: DateTime<Utc>,
  ) -> Result<CrrsScore> {
    let as_of = as_of.trunc_subsecs(6);
    let _guard = self.locks.acquire(subject_id).await;

    let config = self.active_config().await?;
    let lookback = Duration::days(config.reading_lookback_days);
    let mut readings = Vec::new();
    for category in VitalCategory::ALL {
      let batch = self
        .bounded(VITAL_STORE, self.store.readings(subject_id, category, as_of, lookback))
        .await?;
      readings.extend(batch);
    }

    let extraction = extract(&readings, &config, as_of);
    let digest = input_digest(subject_id, config.version, &extraction.factors);

    if let Some(cached) = self.cache.get(subject_id).await
      && cached.input_digest == digest
    {
      debug!(score_id = %cached.score_id, "inputs unchanged; serving cached score");
      return Ok(cached);
    }

    let value = match aggregate(&extraction.factors, &config) {
      Composite::Value(v) => v,
      Composite::InsufficientData { present, required } => {
        let reason = crrs_core::Error::InsufficientData { present, required };
        info!("not scored: {reason}");
        return Ok(CrrsScore {
          score_id: Uuid::new_v4(),
          subject_id,
          outcome: ScoreOutcome::InsufficientData { present, required },
          trend: Trend::InsufficientData,
          baseline: None,
          delta: None,
          explanation: Vec::new(),
          breakdown: extraction.breakdown(&config),
          config_version: config.version,
          input_digest: digest,
          computed_at: as_of,
          window_start: extraction.window_start,
          window_end: extraction.window_end,
        });
      }
    };

    let latest = self.bounded(SCORE_STORE, self.store.latest_score(subject_id)).await?;
    if let Some(latest) = latest
      && latest.input_digest == digest
    {
      debug!(score_id = %latest.score_id, "inputs unchanged; reusing stored score");
      self.cache.put(latest.clone()).await;
      return Ok(latest);
    }

    let since = as_of - Duration::days(config.trend.lookback_days);
    let history = self
      .bounded(SCORE_STORE, self.store.scores_between(subject_id, since, as_of))
      .await?;
    let trend = detect_trend(&history, value, as_of, &config);
    if trend.excluded > 0 {
      warn!(
        excluded = trend.excluded,
        config_version = config.version,
        "prior scores from incompatible configs left out of baseline"
      );
    }

    let risk_tier = classify(value);
    let score = CrrsScore {
      score_id: Uuid::new_v4(),
      subject_id,
      outcome: ScoreOutcome::Scored { value, risk_tier },
      trend: trend.trend,
      baseline: trend.baseline,
      delta: trend.delta,
      explanation: explain(&extraction.factors, &config),
      breakdown: extraction.breakdown(&config),
      config_version: config.version,
      input_digest: digest,
      computed_at: as_of,
      window_start: extraction.window_start,
      window_end: extraction.window_end,
    };

    // Not bounded: a dropped append may still commit, so it is awaited to
    // completion and only its own failure aborts the computation.
    self.settle(SCORE_STORE, self.store.append_score(&score)).await?;
    info!(
      score_id = %score.score_id,
      value,
      %risk_tier,
      trend = %score.trend,
      "score recorded"
    );
    self.cache.put(score.clone()).await;
    Ok(score)
  }

  /// The subject's current score.
  ///
  /// Served from the cache while it is valid for the active config.
  /// Otherwise the score is recomputed; when that yields no score the
  /// newest stored record is returned instead. A failed recompute is only
  /// masked by a cached or stored record: with neither, the error is
  /// returned so "no score yet" stays distinct from "scoring failed".
  pub async fn latest_score(&self, subject_id: Uuid) -> Result<Option<CrrsScore>> {
    let cached = self.cache.get(subject_id).await;
    let config = match self.active_config().await {
      Ok(config) => config,
      Err(e) => {
        return match cached {
          Some(cached) => {
            warn!(%subject_id, "serving cached score: {e}");
            Ok(Some(cached))
          }
          None => Err(e),
        };
      }
    };
    if let Some(cached) = cached {
      if cached.config_version == config.version {
        return Ok(Some(cached));
      }
      self.cache.invalidate(subject_id).await;
    }

    let failure = match self.compute_current_score(subject_id).await {
      Ok(score) if score.is_scored() => return Ok(Some(score)),
      Ok(_) => None,
      Err(e) => Some(e),
    };
    let stored = self.bounded(SCORE_STORE, self.store.latest_score(subject_id)).await;
    match failure {
      None => stored,
      Some(e) => match stored {
        Ok(Some(score)) => {
          warn!(%subject_id, "recompute failed, serving stored score: {e}");
          Ok(Some(score))
        }
        _ => Err(e),
      },
    }
  }

  /// Stored scores with `computed_at` in `[from, to]`, oldest first.
  pub async fn history(
    &self,
    subject_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> Result<Vec<CrrsScore>> {
    self
      .bounded(SCORE_STORE, self.store.scores_between(subject_id, from, to))
      .await
  }

  /// Stored readings of one category with `as_of - lookback <= taken_at <=
  /// as_of`, implausible ones included.
  pub async fn readings(
    &self,
    subject_id: Uuid,
    category: VitalCategory,
    as_of: DateTime<Utc>,
    lookback: Duration,
  ) -> Result<Vec<VitalReading>> {
    self
      .bounded(VITAL_STORE, self.store.readings(subject_id, category, as_of, lookback))
      .await
  }

  /// Validate and store a reading, then invalidate the cached score if the
  /// reading lands inside its window.
  pub async fn record_reading(&self, input: NewVitalReading) -> Result<VitalReading> {
    if let Some(reason) = input.value.implausibility() {
      return Err(Error::RejectedReading(reason));
    }
    let reading = self
      .settle(VITAL_STORE, self.store.record_reading(input))
      .await?;
    self.note_reading(&reading).await;
    Ok(reading)
  }

  /// Tell the engine a reading was stored by someone else.
  pub async fn note_reading(&self, reading: &VitalReading) {
    if self.cache.note_reading(reading.subject_id, reading.taken_at).await {
      debug!(
        subject_id = %reading.subject_id,
        reading_id = %reading.reading_id,
        "cached score invalidated"
      );
    }
  }

  /// The active threshold config, reused for `config_ttl` after each
  /// fetch.
  pub async fn active_config(&self) -> Result<ThresholdConfig> {
    {
      let slot = self.thresholds.read().await;
      if let Some(cached) = slot.as_ref()
        && cached.fetched_at.elapsed() < self.config.config_ttl
      {
        return Ok(cached.config.clone());
      }
    }
    let config = self
      .bounded(CONFIG_STORE, self.store.active_threshold_config())
      .await?;
    self.remember_config(config.clone()).await;
    Ok(config)
  }

  /// Publish `config` as the next version and make it active for this
  /// engine at once.
  pub async fn publish_config(&self, config: ThresholdConfig) -> Result<ThresholdConfig> {
    let published = self
      .settle(CONFIG_STORE, self.store.publish_threshold_config(config))
      .await?;
    self.remember_config(published.clone()).await;
    Ok(published)
  }

  async fn remember_config(&self, config: ThresholdConfig) {
    let mut slot = self.thresholds.write().await;
    match slot.as_ref() {
      // Versions only move forward.
      Some(cached) if cached.config.version > config.version => return,
      Some(cached) if cached.config.version != config.version => {
        info!(
          from = cached.config.version,
          to = config.version,
          "threshold config changed"
        );
      }
      _ => {}
    }
    *slot = Some(CachedConfig { config, fetched_at: Instant::now() });
  }

  /// Await a collaborator call, mapping its failure. Unbounded; writes use
  /// this directly.
  async fn settle<T, E>(
    &self,
    collaborator: &'static str,
    call: impl Future<Output = std::result::Result<T, E>>,
  ) -> Result<T>
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    call.await.map_err(|e| {
      warn!(collaborator, "collaborator call failed: {e}");
      Error::UpstreamUnavailable {
        collaborator,
        failure: UpstreamFailure::Store(Box::new(e)),
      }
    })
  }

  /// Run a collaborator read under the read timeout.
  async fn bounded<T, E>(
    &self,
    collaborator: &'static str,
    call: impl Future<Output = std::result::Result<T, E>>,
  ) -> Result<T>
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    let limit = self.config.read_timeout;
    match tokio::time::timeout(limit, self.settle(collaborator, call)).await {
      Ok(result) => result,
      Err(_) => {
        warn!(collaborator, ?limit, "collaborator call timed out");
        Err(Error::UpstreamUnavailable {
          collaborator,
          failure: UpstreamFailure::Timeout(limit),
        })
      }
    }
  }
}
