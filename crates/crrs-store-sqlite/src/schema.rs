//! SQL schema for the CRRS SQLite store.
//!
//! Executed on every open; each statement is a no-op once the schema exists.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Timestamps are fixed-width RFC 3339 strings (microseconds, `Z` suffix) so
/// that lexicographic comparison in SQL matches chronological order.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Readings are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS vital_readings (
    reading_id          TEXT PRIMARY KEY,
    subject_id          TEXT NOT NULL,
    category            TEXT NOT NULL,   -- discriminant of VitalValue variant
    value_json          TEXT NOT NULL,   -- JSON payload (inner data only)
    taken_at            TEXT NOT NULL,
    recorded_at         TEXT NOT NULL,   -- server-assigned
    source_encounter_id TEXT
);

-- One row per published ThresholdConfig version; never updated.
CREATE TABLE IF NOT EXISTS threshold_configs (
    version      INTEGER PRIMARY KEY,
    config_json  TEXT NOT NULL,
    published_at TEXT NOT NULL
);

-- Score history, append-only. `seq` preserves insertion order for scores
-- that share a computed_at.
CREATE TABLE IF NOT EXISTS crrs_scores (
    seq              INTEGER PRIMARY KEY AUTOINCREMENT,
    score_id         TEXT NOT NULL UNIQUE,
    subject_id       TEXT NOT NULL,
    status           TEXT NOT NULL,   -- 'scored' | 'insufficient_data'
    crrs_value       REAL,
    risk_tier        TEXT,
    present          INTEGER,
    required         INTEGER,
    trend            TEXT NOT NULL,
    baseline         REAL,
    delta            REAL,
    explanation_json TEXT NOT NULL,
    breakdown_json   TEXT NOT NULL,
    config_version   INTEGER NOT NULL,
    input_digest     TEXT NOT NULL,
    computed_at      TEXT NOT NULL,
    window_start     TEXT NOT NULL,
    window_end       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS readings_subject_idx
    ON vital_readings(subject_id, category, taken_at);
CREATE INDEX IF NOT EXISTS scores_subject_idx
    ON crrs_scores(subject_id, computed_at);

PRAGMA user_version = 1;
";
