//! p2px escrow engine daemon.
//!
//! Wires the order store, escrow ledger client, price oracle and notifier
//! into the lifecycle state machine and runs the background jobs:
//! - Escrow reconciliation (activation, resolution, unlock flagging)
//! - Payment-window and trade-window expiry sweeps

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
