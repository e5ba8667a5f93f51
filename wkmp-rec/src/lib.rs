//! WKMP Recommendation Service (wkmp-rec)
//!
//! Serves personalized song recommendations from a periodically retrained
//! model while accepting new users, songs and ratings concurrently.
//!
//! - [`service`]: supervisor, slave, dispatcher and serving actors
//! - [`outcome`]: `Outcome` / `AsyncOutcome` result plumbing
//! - [`gateway`]: training-data storage and catalog lookup (SQLite, in-memory)
//! - [`engine`]: model training, loading and persistence
//! - [`api`]: HTTP surface

pub mod api;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod outcome;
pub mod service;
pub mod types;

pub use context::RecContext;
pub use error::RecError;
pub use outcome::{AsyncOutcome, Attempt, Completer, Outcome, OutcomeExt};
pub use service::RecService;
