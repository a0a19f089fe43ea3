//! Interval scheduler for the evaluation pass.
//!
//! Exactly one pass is in flight at a time: the pass runs inline in the
//! timer task, so overlap is impossible by construction, and restarting the
//! timer waits for the running pass to finish before the new cadence takes
//! over.

use std::sync::Arc;
use std::time::Duration;

use culler_policy::PolicyEvaluator;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Grace delay before the first pass, giving the host time to finish
/// loading its item collection after boot.
const STARTUP_GRACE: Duration = Duration::from_secs(5);
/// Cadence applied when the configured interval is unusable.
const DEFAULT_INTERVAL_HOURS: f64 = 0.5;

/// Owns the single background evaluation task.
#[derive(Debug, Default)]
pub struct Scheduler {
    handle: Option<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
}

impl Scheduler {
    /// Whether the timer task is currently running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Start (or restart) the timer with the given cadence in hours.
    pub async fn start(&mut self, evaluator: Arc<PolicyEvaluator>, interval_hours: f64) {
        self.stop().await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let period = pass_period(interval_hours);
        info!(period_secs = period.as_secs(), "evaluation timer starting");
        self.handle = Some(spawn_timer(evaluator, period, shutdown_rx));
        self.shutdown = Some(shutdown_tx);
    }

    /// Stop the timer, letting an in-flight pass finish first.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                error!(error = %err, "evaluation timer task panicked");
            }
            info!("evaluation timer stopped");
        }
    }
}

fn spawn_timer(
    evaluator: Arc<PolicyEvaluator>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(STARTUP_GRACE) => {}
            _ = shutdown.changed() => return,
        }

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = evaluator.run_pass().await {
                        error!(error = %err, "evaluation pass failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}

/// Convert the configured cadence into a timer period, falling back to the
/// default on non-finite or non-positive values.
fn pass_period(interval_hours: f64) -> Duration {
    let hours = if interval_hours.is_finite() && interval_hours > 0.0 {
        interval_hours
    } else {
        DEFAULT_INTERVAL_HOURS
    };
    Duration::from_secs_f64(hours * 3_600.0)
}
