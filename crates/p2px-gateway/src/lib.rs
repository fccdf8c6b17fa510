//! Adapters for everything outside the order lifecycle core.
//!
//! # Key Components
//!
//! - [`EscrowLedger`]: read-only view of the on-chain escrow contract
//! - [`RpcEscrowLedger`]: JSON-RPC `eth_call` implementation
//! - [`PriceOracle`]: market rate lookup used at amount finalization
//! - [`HttpPriceOracle`]: fiat-rate HTTP API combined with configured token prices
//! - [`Notifier`]: fire-and-forget user/operator messages
//! - [`LogNotifier`]: notifier that writes every message to the log
//! - [`CommunityDirectory`]: bans and community fee shares
//! - [`memory`]: in-memory doubles for tests and local runs

pub mod error;
pub mod ledger;
pub mod memory;
pub mod notify;
pub mod oracle;
pub mod traits;

pub use error::{GatewayError, GatewayResult};
pub use ledger::{RpcEscrowLedger, RpcLedgerConfig};
pub use notify::{LogNotifier, Template};
pub use oracle::{HttpPriceOracle, OracleConfig};
pub use traits::{CommunityDirectory, EscrowLedger, Notifier, PriceOracle};
