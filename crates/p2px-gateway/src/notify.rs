//! Message templates and the log-backed notifier.

use async_trait::async_trait;
use p2px_core::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::info;

use crate::error::GatewayResult;
use crate::traits::Notifier;

/// Template keys understood by the message front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    OrderPublished,
    OrderTaken,
    AlreadyTaken,
    PayEscrow,
    WaitingSellerToPay,
    EnterBuyerAddress,
    BuyerAddressReceived,
    TokensLockedBuyer,
    TokensLockedSeller,
    FiatSent,
    SellerAlreadyReleased,
    WaitingForBuyer,
    ReleaseInstructions,
    RefundInstructions,
    OrderReleasedBuyer,
    OrderReleasedSeller,
    CooperativeCancelRequested,
    CooperativeCancelWaiting,
    CooperativeCancelBuyer,
    CooperativeCancelSeller,
    OrderClosed,
    OrderRepublished,
    CancelConfirmed,
    PaymentWindowExpired,
    TradeWindowExpired,
    TradeWindowAlert,
    DisputeOpened,
    DisputeAlert,
    CanceledByAdmin,
    CompletedByAdmin,
    NewRangeOrder,
    BadStatus,
}

impl Template {
    pub fn key(&self) -> &'static str {
        match self {
            Self::OrderPublished => "order_published",
            Self::OrderTaken => "order_taken",
            Self::AlreadyTaken => "already_taken",
            Self::PayEscrow => "pay_escrow",
            Self::WaitingSellerToPay => "waiting_seller_to_pay",
            Self::EnterBuyerAddress => "enter_buyer_address",
            Self::BuyerAddressReceived => "buyer_address_received",
            Self::TokensLockedBuyer => "tokens_locked_buyer",
            Self::TokensLockedSeller => "tokens_locked_seller",
            Self::FiatSent => "fiat_sent",
            Self::SellerAlreadyReleased => "seller_already_released",
            Self::WaitingForBuyer => "waiting_for_buyer",
            Self::ReleaseInstructions => "release_instructions",
            Self::RefundInstructions => "refund_instructions",
            Self::OrderReleasedBuyer => "order_released_buyer",
            Self::OrderReleasedSeller => "order_released_seller",
            Self::CooperativeCancelRequested => "cooperative_cancel_requested",
            Self::CooperativeCancelWaiting => "cooperative_cancel_waiting",
            Self::CooperativeCancelBuyer => "cooperative_cancel_buyer",
            Self::CooperativeCancelSeller => "cooperative_cancel_seller",
            Self::OrderClosed => "order_closed",
            Self::OrderRepublished => "order_republished",
            Self::CancelConfirmed => "cancel_confirmed",
            Self::PaymentWindowExpired => "payment_window_expired",
            Self::TradeWindowExpired => "trade_window_expired",
            Self::TradeWindowAlert => "trade_window_alert",
            Self::DisputeOpened => "dispute_opened",
            Self::DisputeAlert => "dispute_alert",
            Self::CanceledByAdmin => "canceled_by_admin",
            Self::CompletedByAdmin => "completed_by_admin",
            Self::NewRangeOrder => "new_range_order",
            Self::BadStatus => "bad_status",
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Writes every message to the log instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user: &UserId, template: Template, params: &Value) -> GatewayResult<()> {
        info!(user = %user, template = %template, params = %params, "Notify user");
        Ok(())
    }

    async fn notify_admins(&self, template: Template, params: &Value) -> GatewayResult<()> {
        info!(template = %template, params = %params, "Notify admins");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_matches_serde_name() {
        for t in [Template::PayEscrow, Template::CooperativeCancelSeller, Template::BadStatus] {
            let json = serde_json::to_value(t).unwrap();
            assert_eq!(json.as_str().unwrap(), t.key());
        }
    }
}
