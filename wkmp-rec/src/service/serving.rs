//! Serving worker
//!
//! One worker answers exactly one recommendation request. It starts in
//! `AwaitingContext`, becomes ready once handed a model snapshot, and retires
//! after its first request whether or not that request succeeded.

use super::run_blocking;
use crate::context::RecContext;
use crate::engine::ModelSnapshot;
use crate::error::RecError;
use crate::outcome::{AsyncOutcome, Completer, Outcome};
use crate::types::{RecommendationRequest, RecommendationResult};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info_span, Instrument};

pub(crate) enum ServingMsg {
    UpdateContext(ModelSnapshot),
    GetRecommendations {
        request: RecommendationRequest,
        reply: Completer<RecommendationResult>,
    },
}

pub struct ServingWorker {
    ctx: RecContext,
    model: Option<ModelSnapshot>,
    rx: UnboundedReceiver<ServingMsg>,
}

impl ServingWorker {
    /// Start a worker in `AwaitingContext`
    pub fn spawn(worker_id: u64, ctx: RecContext) -> ServingHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = ServingWorker {
            ctx,
            model: None,
            rx,
        };

        tokio::spawn(worker.run().instrument(info_span!("serving", worker_id)));

        ServingHandle { worker_id, tx }
    }

    async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                ServingMsg::UpdateContext(model) => {
                    debug!("Ready with model {}", model.model_id());
                    self.model = Some(model);
                }
                ServingMsg::GetRecommendations { request, reply } => {
                    // Anything sent from here on is refused with WorkerRetired
                    self.rx.close();

                    let outcome = match &self.model {
                        None => Err(RecError::ModelNotTrainedYet),
                        Some(model) => serve(&self.ctx, model, request).await,
                    };
                    if let Err(e) = &outcome {
                        debug!("Request for user {} failed: {}", request.user_id, e);
                    }

                    reply.complete(outcome);
                    break;
                }
            }
        }
        debug!("Serving worker retired");
    }
}

/// Resolve user, rank, resolve songs, truncate; the first failure wins
async fn serve(
    ctx: &RecContext,
    model: &ModelSnapshot,
    request: RecommendationRequest,
) -> Outcome<RecommendationResult> {
    let request = RecommendationRequest::new(request.user_id, request.count)?;

    let user = ctx
        .catalog
        .resolve_user(request.user_id)
        .await?
        .ok_or_else(|| RecError::user_not_found(request.user_id))?;

    let ranking_model = model.clone();
    let ranked = run_blocking(move || ranking_model.recommend(user.id, request.count)).await?;

    let mut songs = ctx.catalog.resolve_songs(&ranked).await?;
    songs.truncate(request.count);

    ctx.diagnostics.record_served_request(model);

    Ok(RecommendationResult {
        user_id: request.user_id,
        songs,
    })
}

/// Address of a single [`ServingWorker`]
#[derive(Debug, Clone)]
pub struct ServingHandle {
    worker_id: u64,
    tx: UnboundedSender<ServingMsg>,
}

impl ServingHandle {
    pub fn worker_id(&self) -> u64 {
        self.worker_id
    }

    pub fn update_context(&self, model: ModelSnapshot) -> Outcome<()> {
        self.tx
            .send(ServingMsg::UpdateContext(model))
            .map_err(|_| RecError::WorkerRetired)
    }

    /// Ask for recommendations; only the first request is ever answered
    pub fn recommend(&self, request: RecommendationRequest) -> AsyncOutcome<RecommendationResult> {
        let (reply, outcome) = AsyncOutcome::pending();
        match self.tx.send(ServingMsg::GetRecommendations { request, reply }) {
            Ok(()) => outcome,
            Err(_) => AsyncOutcome::failed(RecError::WorkerRetired),
        }
    }

    pub fn is_retired(&self) -> bool {
        self.tx.is_closed()
    }
}
