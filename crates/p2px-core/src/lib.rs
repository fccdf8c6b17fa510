//! Core domain types for the p2px escrow trading engine.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - `OrderId`, `UserId`, `CommunityId`: identifiers
//! - `TokenAmount`, `FiatValue`: precision-safe numeric types
//! - `Order`, `OrderStatus`, `FiatAmount`: the listing and its lifecycle
//! - `Dispute`, `DisputeStatus`: dispute records
//! - `EscrowRecord`: the on-chain custody view and its exact-field matcher
//! - `TokenRegistry`: token contract metadata

pub mod amount;
pub mod dispute;
pub mod error;
pub mod escrow;
pub mod order;
pub mod stats;
pub mod token;

pub use amount::{FiatValue, TokenAmount};
pub use dispute::{Dispute, DisputeId, DisputeStatus};
pub use error::{CoreError, Result};
pub use escrow::{normalize_hex, EscrowRecord, EscrowStatus};
pub use order::{
    CommunityId, EscrowKeys, FiatAmount, Order, OrderId, OrderKind, OrderStatus, Role, UserId,
};
pub use stats::UserStats;
pub use token::{TokenRegistry, TokenSpec};
