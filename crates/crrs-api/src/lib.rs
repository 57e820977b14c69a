//! JSON REST API for the CRRS engine.
//!
//! Exposes an axum [`Router`] backed by an [`Engine`] over any store bundle.
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", crrs_api::api_router(engine.clone()))
//! ```

pub mod error;
pub mod scores;
pub mod thresholds;
pub mod view;
pub mod vitals;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use crrs_engine::{Engine, Stores};

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S: Stores>(engine: Arc<Engine<S>>) -> Router<()> {
  Router::new()
    // Scores
    .route("/crrs/latest", get(scores::latest::<S>))
    .route("/crrs/history", get(scores::history::<S>))
    .route("/crrs/{subject_id}/recompute", post(scores::recompute::<S>))
    // Readings
    .route("/vitals", get(vitals::list::<S>).post(vitals::create::<S>))
    // Config
    .route("/thresholds/active", get(thresholds::active::<S>))
    .with_state(engine)
}

// ─── Integration tests ────────────────────────────────────────────────────────
