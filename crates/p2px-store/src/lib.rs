//! Persistence contracts for the p2px engine.
//!
//! Stores expose CRUD plus optimistic concurrency: every record carries a
//! `version`, and a save whose version no longer matches the stored copy is
//! rejected with [`StoreError::VersionConflict`].
//!
//! # Key Components
//!
//! - [`OrderStore`]: find/insert/save orders
//! - [`DisputeStore`]: dispute records keyed by order
//! - [`UserStatsStore`]: per-user reputation counters
//! - [`OrderFilter`]: query predicate used by background passes
//! - [`MemoryStore`]: in-process backend implementing all three

pub mod error;
pub mod filter;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use filter::OrderFilter;
pub use memory::MemoryStore;
pub use traits::{DisputeStore, OrderStore, UserStatsStore};
