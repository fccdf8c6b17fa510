//! Dispute records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::order::{CommunityId, Order, OrderId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisputeId(Uuid);

impl DisputeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DisputeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DisputeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    WaitingForSolver,
    InProgress,
    AdminReleased,
    AdminRefunded,
    SellerReleased,
}

impl DisputeStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::WaitingForSolver | Self::InProgress)
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::WaitingForSolver => "WAITING_FOR_SOLVER",
            Self::InProgress => "IN_PROGRESS",
            Self::AdminReleased => "ADMIN_RELEASED",
            Self::AdminRefunded => "ADMIN_REFUNDED",
            Self::SellerReleased => "SELLER_RELEASED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub order_id: OrderId,
    pub initiator: UserId,
    pub buyer_id: Option<UserId>,
    pub seller_id: Option<UserId>,
    pub status: DisputeStatus,
    pub solver_id: Option<UserId>,
    pub community_id: Option<CommunityId>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl Dispute {
    /// Open a dispute on `order`, raised by `initiator`.
    pub fn open(order: &Order, initiator: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: DisputeId::new(),
            order_id: order.id,
            initiator,
            buyer_id: order.buyer_id.clone(),
            seller_id: order.seller_id.clone(),
            status: DisputeStatus::WaitingForSolver,
            solver_id: None,
            community_id: order.community_id.clone(),
            created_at: now,
            version: 0,
        }
    }

    /// Close with a final status. Returns false if already closed.
    pub fn close(&mut self, status: DisputeStatus) -> bool {
        if !self.status.is_open() || status.is_open() {
            return false;
        }
        self.status = status;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::FiatValue;
    use crate::order::{FiatAmount, OrderKind};
    use rust_decimal_macros::dec;

    #[test]
    fn test_close_only_once() {
        let order = Order::new(
            OrderKind::Buy,
            UserId::new("bob"),
            "USDT",
            "USD",
            FiatAmount::fixed(FiatValue::new(dec!(20))).unwrap(),
            "cash",
            Utc::now(),
        );
        let mut dispute = Dispute::open(&order, UserId::new("bob"), Utc::now());
        assert_eq!(dispute.status, DisputeStatus::WaitingForSolver);
        assert!(dispute.close(DisputeStatus::SellerReleased));
        assert!(!dispute.close(DisputeStatus::AdminRefunded));
        assert_eq!(dispute.status, DisputeStatus::SellerReleased);
    }
}
