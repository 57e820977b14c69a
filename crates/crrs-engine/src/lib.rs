//! Cardio-Renal Risk Score computation.
//!
//! The pipeline is a chain of pure stages (extract, aggregate, classify,
//! trend, explain) driven by [`Engine`], which owns the collaborator I/O,
//! per-subject serialisation and the latest-score cache.

pub mod aggregate;
pub mod cache;
pub mod classify;
pub mod digest;
pub mod engine;
pub mod error;
pub mod explain;
pub mod extract;
pub mod lock;
pub mod trend;

pub use engine::{Engine, EngineConfig, Stores};
pub use error::{Error, Result, UpstreamFailure};
