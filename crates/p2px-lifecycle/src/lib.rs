//! Order lifecycle for the p2px escrow engine.
//!
//! Validates and applies user-triggered transitions and provides the
//! building blocks the background jobs reuse.
//!
//! # Key Components
//!
//! - [`OrderStateMachine`]: create, take, continue, cancel, fiat-sent, release/refund requests, disputes
//! - [`CooperativeCancelProtocol`]: two-party cancel handshake for funded orders
//! - [`republish`]: returns a taken listing to the book after a cancel or expiry
//! - [`RangeOrderSplitter`]: child listing for the unfilled part of a range order
//! - [`ReputationAccumulator`]: trade counters and per-token volume
//! - [`FeePolicy`]: escrow fee computation
//! - [`LifecycleContext`]: shared handles to stores and collaborators

pub mod context;
pub mod cooperative;
pub mod error;
pub mod fees;
pub mod machine;
pub mod pricing;
pub mod range;
pub mod republish;
pub mod reputation;
pub mod secrets;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use context::LifecycleContext;
pub use cooperative::{CoopOutcome, CooperativeCancelProtocol};
pub use error::{LifecycleError, LifecycleResult, Rejection};
pub use fees::FeePolicy;
pub use machine::{CancelOutcome, NewOrder, OrderStateMachine};
pub use range::RangeOrderSplitter;
pub use republish::{republish, ExitCause, Republished};
pub use reputation::ReputationAccumulator;
pub use secrets::mint_escrow_keys;
