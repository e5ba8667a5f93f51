//! Recommendation dispatcher
//!
//! Mints one serving worker per request, seeded with whatever model the
//! supervisor holds at that moment.

use super::serving::{ServingHandle, ServingWorker};
use super::supervisor::SupervisorHandle;
use crate::context::RecContext;
use crate::error::RecError;
use crate::outcome::{AsyncOutcome, Completer, Outcome};
use crate::types::{RecommendationRequest, RecommendationResult};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub(crate) enum DispatcherMsg {
    NewServingRequest { reply: Completer<ServingHandle> },
}

pub struct RecommendationDispatcher {
    ctx: RecContext,
    supervisor: SupervisorHandle,
    next_worker_id: u64,
}

impl RecommendationDispatcher {
    pub fn spawn(
        ctx: RecContext,
        supervisor: SupervisorHandle,
    ) -> (DispatcherHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = RecommendationDispatcher {
            ctx,
            supervisor,
            next_worker_id: 1,
        };

        let task = tokio::spawn(async move {
            info!("Recommendation dispatcher started");
            while let Some(msg) = rx.recv().await {
                dispatcher.handle(msg);
            }
            info!("Recommendation dispatcher stopped");
        });

        (DispatcherHandle { tx }, task)
    }

    fn handle(&mut self, msg: DispatcherMsg) {
        match msg {
            DispatcherMsg::NewServingRequest { reply } => {
                let worker_id = self.next_worker_id;
                self.next_worker_id += 1;

                // Model lookup happens off the loop so a busy supervisor never stalls dispatch
                let ctx = self.ctx.clone();
                let latest = self.supervisor.latest_model();
                tokio::spawn(async move {
                    let outcome = latest.await.map(|model| {
                        let worker = ServingWorker::spawn(worker_id, ctx);
                        if let Some(model) = model {
                            if let Err(e) = worker.update_context(model) {
                                warn!("Serving worker {} rejected its model: {}", worker_id, e);
                            }
                        } else {
                            debug!("Serving worker {} started without a model", worker_id);
                        }
                        worker
                    });
                    reply.complete(outcome);
                });
            }
        }
    }
}

/// Cloneable address of the [`RecommendationDispatcher`]
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: UnboundedSender<DispatcherMsg>,
}

impl DispatcherHandle {
    /// A fresh serving worker, seeded with the current model if there is one
    pub fn new_serving_worker(&self) -> AsyncOutcome<ServingHandle> {
        let (reply, outcome) = AsyncOutcome::pending();
        match self.send(DispatcherMsg::NewServingRequest { reply }) {
            Ok(()) => outcome,
            Err(e) => AsyncOutcome::failed(e),
        }
    }

    /// New worker, then its one request
    pub fn recommend(&self, request: RecommendationRequest) -> AsyncOutcome<RecommendationResult> {
        self.new_serving_worker()
            .and_then(move |worker| worker.recommend(request))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, msg: DispatcherMsg) -> Outcome<()> {
        self.tx.send(msg).map_err(|_| {
            RecError::ServiceUnavailable("recommendation dispatcher stopped".to_string())
        })
    }
}
