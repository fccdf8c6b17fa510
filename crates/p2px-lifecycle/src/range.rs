//! Child listings for the unfilled part of a range order.

use chrono::{DateTime, Utc};
use p2px_core::{FiatAmount, Order};
use p2px_gateway::Template;
use p2px_telemetry::Metrics;
use tracing::{info, warn};

use crate::context::{order_params, LifecycleContext};
use crate::error::LifecycleResult;

pub struct RangeOrderSplitter<'a> {
    ctx: &'a LifecycleContext,
}

impl<'a> RangeOrderSplitter<'a> {
    pub fn new(ctx: &'a LifecycleContext) -> Self {
        Self { ctx }
    }

    /// Child listing for `max - filled`, or `None` when that is below `min`.
    pub fn remainder_listing(parent: &Order, now: DateTime<Utc>) -> Option<Order> {
        let FiatAmount::Range { min, max } = parent.fiat_amount else {
            return None;
        };
        let filled = parent.range_fill?;
        let remainder = max - filled;
        if remainder < min {
            return None;
        }
        let fiat_amount = if remainder == min {
            FiatAmount::Fixed { value: min }
        } else {
            FiatAmount::Range {
                min,
                max: remainder,
            }
        };

        let mut child = Order::new(
            parent.kind,
            parent.creator_id.clone(),
            parent.token_code.clone(),
            parent.fiat_code.clone(),
            fiat_amount,
            parent.payment_method.clone(),
            now,
        );
        child.price_from_api = true;
        child.price_margin = parent.price_margin;
        child.community_id = parent.community_id.clone();
        child.range_parent_id = Some(parent.id);
        if parent.kind == p2px_core::OrderKind::Buy {
            child.buyer_address = parent.buyer_address.clone();
        }
        Some(child)
    }

    /// Store and announce the child listing of a settled range order.
    pub async fn split(&self, parent: &Order, now: DateTime<Utc>) -> LifecycleResult<Option<Order>> {
        if parent.fiat_amount.is_range() && parent.range_fill.is_none() {
            warn!(order_id = %parent.id, "Range order settled without a chosen amount");
        }
        let Some(child) = Self::remainder_listing(parent, now) else {
            return Ok(None);
        };
        let child = self.ctx.orders.insert(&child).await?;
        Metrics::order_transition(child.status.as_str());
        info!(
            parent_id = %parent.id,
            order_id = %child.id,
            fiat_amount = %child.fiat_amount,
            "Range remainder republished"
        );
        self.ctx
            .notify(&child.creator_id, Template::NewRangeOrder, &order_params(&child))
            .await;
        Ok(Some(child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::*;
    use p2px_core::{FiatValue, OrderKind, OrderStatus, UserId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn settled(min: Decimal, max: Decimal, filled: Decimal) -> Order {
        let mut order = Order::new(
            OrderKind::Sell,
            UserId::new("alice"),
            "USDT",
            "ARS",
            FiatAmount::range(FiatValue::new(min), FiatValue::new(max)).unwrap(),
            "bank",
            Utc::now(),
        );
        order.price_from_api = true;
        order.price_margin = dec!(1.5);
        order.range_fill = Some(FiatValue::new(filled));
        order.status = OrderStatus::Released;
        order
    }

    #[test]
    fn test_remainder_above_min_creates_range() {
        let parent = settled(dec!(50), dec!(200), dec!(80));
        let child = RangeOrderSplitter::remainder_listing(&parent, Utc::now()).unwrap();
        assert_eq!(
            child.fiat_amount,
            FiatAmount::Range {
                min: FiatValue::new(dec!(50)),
                max: FiatValue::new(dec!(120)),
            }
        );
        assert_eq!(child.range_parent_id, Some(parent.id));
        assert_eq!(child.status, OrderStatus::Pending);
        assert!(child.amount.is_zero());
        assert!(child.buyer_id.is_none());
        assert_eq!(child.seller_id, Some(UserId::new("alice")));
        assert_eq!(child.price_margin, dec!(1.5));
    }

    #[test]
    fn test_remainder_below_min_creates_nothing() {
        let parent = settled(dec!(50), dec!(200), dec!(170));
        assert!(RangeOrderSplitter::remainder_listing(&parent, Utc::now()).is_none());
    }

    #[test]
    fn test_remainder_equal_to_min_is_fixed() {
        let parent = settled(dec!(50), dec!(200), dec!(150));
        let child = RangeOrderSplitter::remainder_listing(&parent, Utc::now()).unwrap();
        assert_eq!(
            child.fiat_amount,
            FiatAmount::Fixed {
                value: FiatValue::new(dec!(50))
            }
        );
    }

    #[tokio::test]
    async fn test_split_stores_and_notifies() {
        let h = harness();
        let parent = settled(dec!(50), dec!(200), dec!(80));
        let child = RangeOrderSplitter::new(&h.ctx)
            .split(&parent, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(child.version, 1);
        assert_eq!(h.store.order_count(), 1);
        assert_eq!(
            h.notifier.templates_for(&user("alice")),
            vec![Template::NewRangeOrder]
        );
    }
}
