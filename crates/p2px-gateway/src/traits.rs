//! Collaborator traits.

use async_trait::async_trait;
use p2px_core::{CommunityId, EscrowRecord, OrderId, UserId};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::GatewayResult;
use crate::notify::Template;

/// Read-only view of the escrow contract. This engine never writes to it.
#[async_trait]
pub trait EscrowLedger: Send + Sync {
    /// `Ok(None)` when the contract holds nothing for this order yet.
    async fn get_escrow_record(&self, order_id: &OrderId) -> GatewayResult<Option<EscrowRecord>>;
}

#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Token base units per one unit of `fiat_code`.
    async fn fetch_market_rate(&self, fiat_code: &str, token_code: &str) -> GatewayResult<Decimal>;
}

/// Outbound messages. Callers log failures and never retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user: &UserId, template: Template, params: &Value) -> GatewayResult<()>;

    async fn notify_admins(&self, template: Template, params: &Value) -> GatewayResult<()>;
}

#[async_trait]
pub trait CommunityDirectory: Send + Sync {
    async fn is_banned(&self, community: &CommunityId, user: &UserId) -> GatewayResult<bool>;

    /// Share of the fee, in percent, that goes to the community.
    async fn fee_percent(&self, community: &CommunityId) -> GatewayResult<Option<Decimal>>;
}
