//! Slave workers
//!
//! A slave performs exactly one task, replies once and exits. Mutations
//! reply straight to the requester; model tasks report back to the
//! supervisor, which retires the worker on receipt.

use super::supervisor::SupervisorMsg;
use super::{panic_message, run_blocking};
use crate::context::RecContext;
use crate::engine::ModelSnapshot;
use crate::error::RecError;
use crate::outcome::{Completer, Outcome};
use crate::types::Mutation;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Model lifecycle work delegated by the supervisor
#[derive(Debug)]
pub(crate) enum ModelTask {
    LoadLatest,
    Train,
    Persist(ModelSnapshot),
}

impl ModelTask {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            ModelTask::LoadLatest => "load_latest",
            ModelTask::Train => "train",
            ModelTask::Persist(_) => "persist",
        }
    }

    /// Load and train change the serving model; persist does not
    pub(crate) fn replaces_model(&self) -> bool {
        !matches!(self, ModelTask::Persist(_))
    }
}

pub(crate) enum SlaveTask {
    Mutate {
        mutation: Mutation,
        reply: Completer<()>,
    },
    Model {
        task: ModelTask,
        supervisor: UnboundedSender<SupervisorMsg>,
    },
}

impl SlaveTask {
    fn name(&self) -> &'static str {
        match self {
            SlaveTask::Mutate { mutation, .. } => mutation.kind(),
            SlaveTask::Model { task, .. } => task.name(),
        }
    }
}

/// Result of a model task, delivered to the supervisor
#[derive(Debug)]
pub(crate) enum ModelReport {
    Loaded(Outcome<ModelSnapshot>),
    Trained(Outcome<ModelSnapshot>),
    Persisted { model_id: Uuid, outcome: Outcome<()> },
}

/// Start a slave for `task`
pub(crate) fn spawn(worker_id: u64, ctx: RecContext, task: SlaveTask) -> JoinHandle<()> {
    let span = info_span!("slave", worker_id, task = task.name());
    tokio::spawn(run(worker_id, ctx, task).instrument(span))
}

async fn run(worker_id: u64, ctx: RecContext, task: SlaveTask) {
    match task {
        SlaveTask::Mutate { mutation, reply } => {
            let kind = mutation.kind();
            let entity_id = mutation.entity_id();

            let outcome = guarded(apply_mutation(&ctx, mutation)).await;
            match &outcome {
                Ok(()) => debug!("Appended {} {}", kind, entity_id),
                Err(e) => warn!("Failed to append {} {}: {}", kind, entity_id, e),
            }

            if !reply.complete(outcome) {
                debug!("Requester went away before the {} append finished", kind);
            }
        }
        SlaveTask::Model { task, supervisor } => {
            let report = match task {
                ModelTask::LoadLatest => ModelReport::Loaded(guarded(load_latest(&ctx)).await),
                ModelTask::Train => ModelReport::Trained(guarded(train(&ctx)).await),
                ModelTask::Persist(model) => {
                    let model_id = model.model_id();
                    ModelReport::Persisted {
                        model_id,
                        outcome: guarded(persist(&ctx, model)).await,
                    }
                }
            };

            if supervisor
                .send(SupervisorMsg::WorkerReport { worker_id, report })
                .is_err()
            {
                debug!("Supervisor stopped before the report could be delivered");
            }
        }
    }
}

async fn apply_mutation(ctx: &RecContext, mutation: Mutation) -> Outcome<()> {
    match mutation {
        Mutation::AddUser(user) => ctx.gateway.append_user(user).await,
        Mutation::AddSong(song) => ctx.gateway.append_song(song).await,
        Mutation::AddRating(rating) => ctx.gateway.append_rating(rating).await,
    }
}

async fn load_latest(ctx: &RecContext) -> Outcome<ModelSnapshot> {
    let engine = ctx.engine.clone();
    run_blocking(move || engine.load_latest()).await
}

async fn train(ctx: &RecContext) -> Outcome<ModelSnapshot> {
    let ratings = ctx.gateway.read_ratings_for_training().await?;
    info!("Training model from {} ratings", ratings.len());

    let engine = ctx.engine.clone();
    run_blocking(move || engine.train(&ratings)).await
}

async fn persist(ctx: &RecContext, model: ModelSnapshot) -> Outcome<()> {
    let engine = ctx.engine.clone();
    run_blocking(move || engine.persist(&model)).await
}

/// Convert a panic anywhere in `work` into a typed failure
async fn guarded<T, F>(work: F) -> Outcome<T>
where
    F: Future<Output = Outcome<T>>,
{
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(RecError::underlying(anyhow::anyhow!(
            "worker panicked: {}",
            panic_message(&*panic)
        ))),
    }
}
