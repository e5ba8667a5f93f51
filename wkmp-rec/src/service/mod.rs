//! Actors of the recommendation service
//!
//! - [`ModelSupervisor`]: owns the model, delegates blocking work to slaves
//! - [`RecommendationDispatcher`]: one [`ServingWorker`] per request
//! - retrain ticker: periodic `RetrainTrigger`
//!
//! Every actor is a tokio task draining an unbounded mailbox; callers talk to
//! it through a cloneable handle.

pub mod dispatcher;
pub mod serving;
mod slave;
pub mod supervisor;
pub mod ticker;

pub use dispatcher::{DispatcherHandle, RecommendationDispatcher};
pub use serving::{ServingHandle, ServingWorker};
pub use supervisor::{ModelState, ModelSupervisor, SupervisorHandle, SupervisorStatus};
pub use ticker::spawn_retrain_ticker;

use crate::context::RecContext;
use crate::error::RecError;
use crate::outcome::Outcome;
use std::any::Any;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Running actor set
pub struct RecService {
    supervisor: SupervisorHandle,
    dispatcher: DispatcherHandle,
    tasks: Vec<JoinHandle<()>>,
}

impl RecService {
    /// Start supervisor and dispatcher, plus the retrain ticker when
    /// `retrain_interval` is set
    pub fn start(ctx: RecContext, retrain_interval: Option<Duration>) -> Self {
        let (supervisor, supervisor_task) = ModelSupervisor::spawn(ctx.clone());
        let (dispatcher, dispatcher_task) =
            RecommendationDispatcher::spawn(ctx, supervisor.clone());

        let mut tasks = vec![supervisor_task, dispatcher_task];
        if let Some(period) = retrain_interval {
            tasks.push(spawn_retrain_ticker(supervisor.clone(), period));
        }

        info!("Recommendation service started");

        Self {
            supervisor,
            dispatcher,
            tasks,
        }
    }

    pub fn supervisor(&self) -> &SupervisorHandle {
        &self.supervisor
    }

    pub fn dispatcher(&self) -> &DispatcherHandle {
        &self.dispatcher
    }

    /// Stop all long-lived actors; in-flight slaves are abandoned
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!("Recommendation service stopped");
    }
}

/// Run blocking collaborator work on the blocking pool
pub(crate) async fn run_blocking<T, F>(work: F) -> Outcome<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(RecError::Underlying),
        Err(e) if e.is_panic() => {
            let panic = e.into_panic();
            Err(RecError::underlying(anyhow::anyhow!(
                "worker panicked: {}",
                panic_message(&*panic)
            )))
        }
        Err(e) => Err(RecError::underlying(anyhow::anyhow!("blocking task cancelled: {}", e))),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
