//! Periodic retrain trigger

use super::supervisor::SupervisorHandle;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Shortest accepted retrain period
pub const MIN_RETRAIN_PERIOD: Duration = Duration::from_secs(1);

/// Send `RetrainTrigger` every `period`, starting immediately
///
/// Stops once the supervisor is gone.
pub fn spawn_retrain_ticker(supervisor: SupervisorHandle, period: Duration) -> JoinHandle<()> {
    let period = period.max(MIN_RETRAIN_PERIOD);

    tokio::spawn(async move {
        info!("Retrain ticker started (every {:?})", period);

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if supervisor.retrain().is_err() {
                debug!("Supervisor stopped, retrain ticker exiting");
                break;
            }
            debug!("Retrain trigger sent");
        }
    })
}
