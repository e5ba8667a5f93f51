//! Error types for wkmp-rec
//!
//! Every worker reports failures as a [`RecError`] value; collaborator faults
//! are wrapped in [`RecError::Underlying`] where they occur.

use std::time::Duration;
use thiserror::Error;

/// Typed failure carried by every [`Outcome`](crate::outcome::Outcome)
#[derive(Error, Debug)]
pub enum RecError {
    /// A referenced user or song does not exist
    #[error("{kind} not found: {id}")]
    EntityNotFound { kind: &'static str, id: i64 },

    /// No model has been loaded or trained yet
    #[error("Model not trained yet")]
    ModelNotTrainedYet,

    /// Request parameters rejected before any work was done
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The worker terminated before (or instead of) replying
    #[error("Worker terminated before replying")]
    WorkerRetired,

    /// A long-lived actor's mailbox is closed
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Caller-imposed timeout elapsed
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Fault raised by a collaborator (storage, training engine, ...)
    #[error("Underlying failure: {0:#}")]
    Underlying(#[from] anyhow::Error),
}

impl RecError {
    pub fn user_not_found(id: i64) -> Self {
        RecError::EntityNotFound { kind: "user", id }
    }

    /// Wrap any collaborator error
    pub fn underlying<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        RecError::Underlying(err.into())
    }
}

impl From<sqlx::Error> for RecError {
    fn from(err: sqlx::Error) -> Self {
        RecError::Underlying(anyhow::Error::new(err).context("database operation failed"))
    }
}

impl From<wkmp_common::Error> for RecError {
    fn from(err: wkmp_common::Error) -> Self {
        RecError::Underlying(err.into())
    }
}
