//! Application wiring and run loop.

use std::sync::Arc;

use p2px_gateway::memory::StaticCommunities;
use p2px_gateway::{EscrowLedger, HttpPriceOracle, LogNotifier, PriceOracle, RpcEscrowLedger};
use p2px_jobs::{EscrowReconciler, ExpirySweeper, GlobalOrdersLock, JobRunner};
use p2px_lifecycle::{LifecycleContext, OrderStateMachine};
use p2px_store::MemoryStore;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Main application.
pub struct Application {
    config: AppConfig,
    store: Arc<MemoryStore>,
    machine: Arc<OrderStateMachine>,
    runner: Arc<JobRunner>,
}

impl Application {
    /// Build the application with the HTTP oracle, JSON-RPC ledger and a
    /// log-backed notifier.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let oracle = Arc::new(HttpPriceOracle::new(&config.oracle, config.token_registry())?);
        let ledger = Arc::new(RpcEscrowLedger::new(&config.escrow)?);
        Ok(Self::with_collaborators(config, oracle, ledger))
    }

    /// Build with caller-supplied oracle and ledger. Orders are kept in
    /// memory and every notification goes to the log.
    pub fn with_collaborators(
        config: AppConfig,
        oracle: Arc<dyn PriceOracle>,
        ledger: Arc<dyn EscrowLedger>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let ctx = LifecycleContext::new(
            store.clone(),
            oracle,
            Arc::new(LogNotifier),
            Arc::new(StaticCommunities::new()),
            config.token_registry(),
            config.fees,
        );

        let lock = Arc::new(GlobalOrdersLock::new());
        let reconciler = Arc::new(EscrowReconciler::new(ctx.clone(), ledger, lock.clone()));
        let sweeper = Arc::new(ExpirySweeper::new(ctx.clone(), config.expiry.clone(), lock));
        let runner = Arc::new(JobRunner::new(
            reconciler,
            sweeper,
            config.scheduler.clone(),
        ));

        Self {
            config,
            store,
            machine: Arc::new(OrderStateMachine::new(ctx)),
            runner,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Entry point for command front-ends.
    pub fn machine(&self) -> Arc<OrderStateMachine> {
        self.machine.clone()
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }

    pub fn runner(&self) -> Arc<JobRunner> {
        self.runner.clone()
    }

    /// Run the background jobs until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        info!(
            tokens = self.config.tokens.len(),
            escrow_contract = %self.config.escrow.contract_address,
            "Starting application"
        );

        let runner = self.runner.clone();
        let jobs = tokio::spawn(async move { runner.run().await });

        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
        }
        self.runner.shutdown();

        match jobs.await {
            Ok(result) => result?,
            Err(e) => error!(error = %e, "Job runner task failed"),
        }
        info!(orders = self.store.order_count(), "Application stopped");
        Ok(())
    }
}
