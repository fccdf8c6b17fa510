//! Periodic driver for the reconciliation and expiry passes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{JobError, JobResult};
use crate::reconciler::EscrowReconciler;
use crate::sweeper::ExpirySweeper;

fn default_reconcile_interval_secs() -> u64 {
    10
}

fn default_sweep_interval_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: default_reconcile_interval_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Runs both passes on their own intervals until shut down.
///
/// The reconciler and sweeper are expected to share one
/// [`GlobalOrdersLock`](crate::GlobalOrdersLock); a tick that finds it held
/// is skipped.
pub struct JobRunner {
    reconciler: Arc<EscrowReconciler>,
    sweeper: Arc<ExpirySweeper>,
    config: SchedulerConfig,
    shutdown_token: CancellationToken,
}

impl JobRunner {
    pub fn new(
        reconciler: Arc<EscrowReconciler>,
        sweeper: Arc<ExpirySweeper>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            reconciler,
            sweeper,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn shutdown(&self) {
        info!("JobRunner shutdown requested");
        self.shutdown_token.cancel();
    }

    pub async fn run(&self) -> JobResult<()> {
        if self.config.reconcile_interval_secs == 0 || self.config.sweep_interval_secs == 0 {
            return Err(JobError::Config("job intervals must be positive".into()));
        }
        info!(
            reconcile_interval_secs = self.config.reconcile_interval_secs,
            sweep_interval_secs = self.config.sweep_interval_secs,
            "JobRunner started"
        );

        let reconcile = {
            let reconciler = self.reconciler.clone();
            let token = self.shutdown_token.clone();
            let period = Duration::from_secs(self.config.reconcile_interval_secs);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        biased;
                        () = token.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                    if let Err(e) = reconciler.run_reconciliation().await {
                        error!(error = %e, "Reconciliation pass failed");
                    }
                }
            })
        };

        let sweep = {
            let sweeper = self.sweeper.clone();
            let token = self.shutdown_token.clone();
            let period = Duration::from_secs(self.config.sweep_interval_secs);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        biased;
                        () = token.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                    if let Err(e) = sweeper.run_expiry_sweep(Utc::now()).await {
                        error!(error = %e, "Expiry sweep failed");
                    }
                }
            })
        };

        for (name, handle) in [("reconcile", reconcile), ("sweep", sweep)] {
            if let Err(e) = handle.await {
                error!(job = name, error = %e, "Job task terminated abnormally");
            }
        }
        info!("JobRunner stopped");
        Ok(())
    }
}
