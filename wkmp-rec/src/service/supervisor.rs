//! Model supervisor
//!
//! The one long-lived owner of the serving model. It never performs blocking
//! work itself: every load, train, persist and append is handed to a fresh
//! slave worker, and the loop only reacts to their reports.
//!
//! State machine:
//!
//! | State      | RetrainTrigger        | Load ok / Train ok        | Load failed        |
//! |------------|-----------------------|---------------------------|--------------------|
//! | `NoModel`  | spawn load-latest     | install (+ persist)       | spawn train        |
//! | `HasModel` | spawn train           | replace (+ persist)       | n/a                |
//!
//! A failed train keeps whatever model is installed.

use super::slave::{self, ModelReport, ModelTask, SlaveTask};
use crate::context::RecContext;
use crate::engine::ModelSnapshot;
use crate::error::RecError;
use crate::outcome::{AsyncOutcome, Completer, Outcome};
use crate::types::{Mutation, Rating, Song, User};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::mpsc::{self, UnboundedSender, WeakUnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub(crate) enum SupervisorMsg {
    RetrainTrigger,
    GetLatestModel {
        reply: Completer<Option<ModelSnapshot>>,
    },
    Mutate {
        mutation: Mutation,
        reply: Completer<()>,
    },
    Status {
        reply: Completer<SupervisorStatus>,
    },
    WorkerReport {
        worker_id: u64,
        report: ModelReport,
    },
}

#[derive(Debug, Clone)]
pub enum ModelState {
    NoModel,
    HasModel(ModelSnapshot),
}

impl ModelState {
    pub fn name(&self) -> &'static str {
        match self {
            ModelState::NoModel => "no_model",
            ModelState::HasModel(_) => "has_model",
        }
    }

    pub fn snapshot(&self) -> Option<ModelSnapshot> {
        match self {
            ModelState::NoModel => None,
            ModelState::HasModel(model) => Some(model.clone()),
        }
    }
}

/// Point-in-time view of the supervisor, for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStatus {
    pub state: &'static str,
    pub model_id: Option<Uuid>,
    pub trained_at: Option<DateTime<Utc>>,
    /// Model-task slaves spawned and not yet retired
    pub workers_in_flight: usize,
    /// A load or train is running; further triggers are coalesced
    pub model_task_in_flight: bool,
}

impl SupervisorStatus {
    /// Status reported when the supervisor is not reachable
    pub fn unavailable() -> Self {
        Self {
            state: "unavailable",
            model_id: None,
            trained_at: None,
            workers_in_flight: 0,
            model_task_in_flight: false,
        }
    }
}

pub struct ModelSupervisor {
    ctx: RecContext,
    state: ModelState,
    /// Model-task slaves by worker id
    workers: HashMap<u64, JoinHandle<()>>,
    next_worker_id: u64,
    /// Worker id of the in-flight load/train, if any
    model_task: Option<u64>,
    mailbox: WeakUnboundedSender<SupervisorMsg>,
}

impl ModelSupervisor {
    /// Start the supervisor loop in state `NoModel`
    ///
    /// The loop runs until every [`SupervisorHandle`] has been dropped.
    pub fn spawn(ctx: RecContext) -> (SupervisorHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut supervisor = ModelSupervisor {
            ctx,
            state: ModelState::NoModel,
            workers: HashMap::new(),
            next_worker_id: 1,
            model_task: None,
            mailbox: tx.downgrade(),
        };

        let task = tokio::spawn(async move {
            info!("Model supervisor started");
            while let Some(msg) = rx.recv().await {
                supervisor.handle(msg);
            }
            supervisor.stop();
            info!("Model supervisor stopped");
        });

        (SupervisorHandle { tx }, task)
    }

    fn handle(&mut self, msg: SupervisorMsg) {
        match msg {
            SupervisorMsg::RetrainTrigger => self.on_retrain_trigger(),
            SupervisorMsg::GetLatestModel { reply } => {
                reply.complete(Ok(self.state.snapshot()));
            }
            SupervisorMsg::Mutate { mutation, reply } => {
                let worker_id = self.next_id();
                // Mutation slaves reply to the requester directly and are not tracked
                slave::spawn(worker_id, self.ctx.clone(), SlaveTask::Mutate { mutation, reply });
            }
            SupervisorMsg::Status { reply } => {
                reply.complete(Ok(self.status()));
            }
            SupervisorMsg::WorkerReport { worker_id, report } => {
                self.retire(worker_id);
                self.on_report(report);
            }
        }
    }

    fn on_retrain_trigger(&mut self) {
        if let Some(worker_id) = self.model_task {
            debug!("Retrain trigger coalesced, worker {} still running", worker_id);
            return;
        }

        let task = match self.state {
            ModelState::NoModel => ModelTask::LoadLatest,
            ModelState::HasModel(_) => ModelTask::Train,
        };
        info!("Retrain trigger in state {}: spawning {}", self.state.name(), task.name());
        self.spawn_model_task(task);
    }

    fn on_report(&mut self, report: ModelReport) {
        match report {
            ModelReport::Loaded(Ok(model)) => {
                info!("Loaded persisted model {}", model.model_id());
                self.install(model);
            }
            ModelReport::Loaded(Err(e)) => {
                // A corrupt store and an empty store look the same from here
                warn!("No usable persisted model ({}), training from scratch", e);
                self.spawn_model_task(ModelTask::Train);
            }
            ModelReport::Trained(Ok(model)) => {
                info!("Trained model {}", model.model_id());
                self.install(model.clone());
                self.spawn_model_task(ModelTask::Persist(model));
            }
            ModelReport::Trained(Err(e)) => {
                error!("Model training failed, keeping state {}: {}", self.state.name(), e);
            }
            ModelReport::Persisted {
                model_id,
                outcome: Ok(()),
            } => {
                debug!("Persisted model {}", model_id);
            }
            ModelReport::Persisted {
                model_id,
                outcome: Err(e),
            } => {
                warn!("Failed to persist model {}: {}", model_id, e);
            }
        }
    }

    fn install(&mut self, model: ModelSnapshot) {
        self.ctx.diagnostics.model_installed(&model);
        self.state = ModelState::HasModel(model);
    }

    fn spawn_model_task(&mut self, task: ModelTask) {
        let Some(supervisor) = self.mailbox.upgrade() else {
            debug!("Supervisor shutting down, {} not started", task.name());
            return;
        };

        let worker_id = self.next_id();
        let replaces_model = task.replaces_model();

        let handle = slave::spawn(
            worker_id,
            self.ctx.clone(),
            SlaveTask::Model { task, supervisor },
        );
        self.workers.insert(worker_id, handle);

        if replaces_model {
            self.model_task = Some(worker_id);
        }
    }

    /// Forget a reporting worker; it is never reused
    fn retire(&mut self, worker_id: u64) {
        if let Some(handle) = self.workers.remove(&worker_id) {
            handle.abort();
        }
        if self.model_task == Some(worker_id) {
            self.model_task = None;
        }
    }

    fn status(&self) -> SupervisorStatus {
        let model = self.state.snapshot();
        SupervisorStatus {
            state: self.state.name(),
            model_id: model.as_ref().map(ModelSnapshot::model_id),
            trained_at: model.as_ref().map(ModelSnapshot::trained_at),
            workers_in_flight: self.workers.len(),
            model_task_in_flight: self.model_task.is_some(),
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_worker_id;
        self.next_worker_id += 1;
        id
    }

    fn stop(&mut self) {
        for (worker_id, handle) in self.workers.drain() {
            debug!("Aborting worker {} on shutdown", worker_id);
            handle.abort();
        }
    }
}

/// Cloneable address of the [`ModelSupervisor`]
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: UnboundedSender<SupervisorMsg>,
}

impl SupervisorHandle {
    /// Ask for a load (no model) or retrain (has model)
    pub fn retrain(&self) -> Outcome<()> {
        self.send(SupervisorMsg::RetrainTrigger)
    }

    /// Snapshot of the current model, `None` before the first install
    pub fn latest_model(&self) -> AsyncOutcome<Option<ModelSnapshot>> {
        self.request(|reply| SupervisorMsg::GetLatestModel { reply })
    }

    pub fn mutate(&self, mutation: Mutation) -> AsyncOutcome<()> {
        self.request(|reply| SupervisorMsg::Mutate { mutation, reply })
    }

    pub fn add_user(&self, user: User) -> AsyncOutcome<()> {
        self.mutate(Mutation::AddUser(user))
    }

    pub fn add_song(&self, song: Song) -> AsyncOutcome<()> {
        self.mutate(Mutation::AddSong(song))
    }

    pub fn add_rating(&self, rating: Rating) -> AsyncOutcome<()> {
        self.mutate(Mutation::AddRating(rating))
    }

    pub fn status(&self) -> AsyncOutcome<SupervisorStatus> {
        self.request(|reply| SupervisorMsg::Status { reply })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn request<T, F>(&self, make: F) -> AsyncOutcome<T>
    where
        T: Send + 'static,
        F: FnOnce(Completer<T>) -> SupervisorMsg,
    {
        let (reply, outcome) = AsyncOutcome::pending();
        match self.send(make(reply)) {
            Ok(()) => outcome,
            Err(e) => AsyncOutcome::failed(e),
        }
    }

    fn send(&self, msg: SupervisorMsg) -> Outcome<()> {
        self.tx
            .send(msg)
            .map_err(|_| RecError::ServiceUnavailable("model supervisor stopped".to_string()))
    }
}
