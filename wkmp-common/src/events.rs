//! Event types for the WKMP recommendation service
//!
//! Events are broadcast via [`EventBus`] and serialize with a `type` tag so they
//! can be forwarded to any observer as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Recommendation service events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum RecEvent {
    /// A freshly loaded or trained model replaced the serving model
    ModelInstalled {
        model_id: Uuid,
        trained_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// A serving worker answered a recommendation request
    RequestServed {
        model_id: Uuid,
        /// Requests served by this model so far, including this one
        served_total: u64,
        timestamp: DateTime<Utc>,
    },
}

impl RecEvent {
    /// Model the event refers to
    pub fn model_id(&self) -> Uuid {
        match self {
            RecEvent::ModelInstalled { model_id, .. }
            | RecEvent::RequestServed { model_id, .. } => *model_id,
        }
    }
}

/// Broadcast bus for [`RecEvent`]s
///
/// Lagging subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RecEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RecEvent> {
        self.tx.subscribe()
    }

    /// Emit an event
    ///
    /// Returns `Err` when nobody is subscribed.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: RecEvent) -> Result<usize, broadcast::error::SendError<RecEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: RecEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
