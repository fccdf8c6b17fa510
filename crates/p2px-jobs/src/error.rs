//! Error types for background jobs.

use p2px_core::CoreError;
use p2px_gateway::GatewayError;
use p2px_lifecycle::LifecycleError;
use p2px_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type JobResult<T> = Result<T, JobError>;
