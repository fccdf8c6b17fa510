//! Background jobs for the p2px escrow engine.
//!
//! # Key Components
//!
//! - [`EscrowReconciler`]: promotes and settles orders from on-chain escrow state
//! - [`ExpirySweeper`]: payment-window republish and trade-window operator alerts
//! - [`GlobalOrdersLock`]: keeps the two passes from interleaving
//! - [`JobRunner`]: interval scheduler with graceful shutdown

pub mod error;
pub mod lock;
pub mod reconciler;
pub mod scheduler;
pub mod sweeper;

pub use error::{JobError, JobResult};
pub use lock::{GlobalOrdersLock, OrdersLockGuard};
pub use reconciler::{EscrowReconciler, ReconcileReport};
pub use scheduler::{JobRunner, SchedulerConfig};
pub use sweeper::{ExpiryConfig, ExpirySweeper, SweepReport};
