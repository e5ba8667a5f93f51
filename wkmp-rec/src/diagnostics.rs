//! Serving diagnostics
//!
//! Counts served requests per model and broadcasts [`RecEvent`]s so an
//! operator can see which model answered how many requests.

use crate::engine::ModelSnapshot;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wkmp_common::events::{EventBus, RecEvent};

/// Sink for model and serving observations
pub trait Diagnostics: Send + Sync {
    fn model_installed(&self, model: &ModelSnapshot);

    fn record_served_request(&self, model: &ModelSnapshot);
}

/// Default [`Diagnostics`]: per-model counters plus an event bus
#[derive(Debug)]
pub struct DiagnosticsHub {
    served: Mutex<HashMap<Uuid, u64>>,
    events: EventBus,
}

impl DiagnosticsHub {
    pub fn new(event_capacity: usize) -> Self {
        Self {
            served: Mutex::new(HashMap::new()),
            events: EventBus::new(event_capacity),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecEvent> {
        self.events.subscribe()
    }

    /// Requests served by `model_id` so far
    pub fn served_count(&self, model_id: Uuid) -> u64 {
        match self.served.lock() {
            Ok(served) => served.get(&model_id).copied().unwrap_or(0),
            Err(_) => 0,
        }
    }

    pub fn total_served(&self) -> u64 {
        match self.served.lock() {
            Ok(served) => served.values().sum(),
            Err(_) => 0,
        }
    }
}

impl Default for DiagnosticsHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Diagnostics for DiagnosticsHub {
    fn model_installed(&self, model: &ModelSnapshot) {
        info!(
            model_id = %model.model_id(),
            trained_at = %model.trained_at(),
            "Model installed"
        );

        self.events.emit_lossy(RecEvent::ModelInstalled {
            model_id: model.model_id(),
            trained_at: model.trained_at(),
            timestamp: Utc::now(),
        });
    }

    fn record_served_request(&self, model: &ModelSnapshot) {
        let model_id = model.model_id();

        let served_total = match self.served.lock() {
            Ok(mut served) => {
                let count = served.entry(model_id).or_insert(0);
                *count += 1;
                *count
            }
            Err(_) => {
                warn!(%model_id, "Diagnostics counter lock poisoned, request not counted");
                return;
            }
        };

        debug!(%model_id, served_total, "Request served");

        self.events.emit_lossy(RecEvent::RequestServed {
            model_id,
            served_total,
            timestamp: Utc::now(),
        });
    }
}
