//! Cooperative cancel handshake for funded orders.
//!
//! Each role has its own flag. The order is canceled only once both flags are
//! set; a single flag never changes status. The seller's confirmation differs
//! from the buyer's because only the seller has tokens to reclaim.

use p2px_core::{Order, OrderStatus, Role};
use p2px_gateway::Template;
use tracing::info;

use crate::context::{order_params, LifecycleContext};
use crate::error::{LifecycleResult, Rejection};

#[derive(Debug, Clone, PartialEq)]
pub enum CoopOutcome {
    /// The initiator had already asked; nothing changed.
    AlreadyRequested,
    /// Flag recorded, waiting for the counterpart.
    Requested(Order),
    /// Both sides agreed; the order is CANCELED.
    Finalized(Order),
}

pub struct CooperativeCancelProtocol<'a> {
    ctx: &'a LifecycleContext,
}

impl<'a> CooperativeCancelProtocol<'a> {
    pub fn new(ctx: &'a LifecycleContext) -> Self {
        Self { ctx }
    }

    pub async fn initiate(&self, mut order: Order, initiator: Role) -> LifecycleResult<CoopOutcome> {
        if !order.status.is_funded() {
            return Err(Rejection::WrongStatus {
                status: order.status,
            }
            .into());
        }
        let params = order_params(&order);

        if order.coop_flag(initiator) {
            self.ctx
                .notify_party(order.party(initiator), Template::CooperativeCancelWaiting, &params)
                .await;
            return Ok(CoopOutcome::AlreadyRequested);
        }

        let prior = order.status;
        order.raise_coop_flag(initiator);
        let counterpart = initiator.counterpart();

        if order.coop_flag(counterpart) {
            order.transition(OrderStatus::Canceled)?;
            order.canceled_by = order.party(initiator).cloned();
            let saved = self.ctx.save(&order, prior).await?;
            info!(order_id = %saved.id, "Order canceled cooperatively");

            let params = order_params(&saved);
            for role in [Role::Buyer, Role::Seller] {
                let template = match role {
                    Role::Buyer => Template::CooperativeCancelBuyer,
                    Role::Seller => Template::CooperativeCancelSeller,
                };
                self.ctx.notify_party(saved.party(role), template, &params).await;
            }
            return Ok(CoopOutcome::Finalized(saved));
        }

        let saved = self.ctx.save(&order, prior).await?;
        info!(order_id = %saved.id, initiator = %initiator, "Cooperative cancel requested");
        self.ctx
            .notify_party(saved.party(initiator), Template::CooperativeCancelWaiting, &params)
            .await;
        self.ctx
            .notify_party(
                saved.party(counterpart),
                Template::CooperativeCancelRequested,
                &params,
            )
            .await;
        Ok(CoopOutcome::Requested(saved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::*;
    use p2px_core::{OrderKind, TokenAmount};
    use p2px_store::OrderStore;
    use rust_decimal_macros::dec;

    async fn active_order(h: &Harness) -> Order {
        let mut order = listing(h, OrderKind::Sell, "alice", fixed(dec!(100))).await;
        order.buyer_id = Some(user("bob"));
        order.amount = TokenAmount::from(100);
        order.status = OrderStatus::Active;
        h.store.save(&order).await.unwrap()
    }

    #[tokio::test]
    async fn test_single_flag_never_cancels() {
        let h = harness();
        let order = active_order(&h).await;
        let protocol = CooperativeCancelProtocol::new(&h.ctx);

        let outcome = protocol.initiate(order, Role::Buyer).await.unwrap();
        let order = match outcome {
            CoopOutcome::Requested(order) => order,
            other => panic!("expected Requested, got {other:?}"),
        };
        assert_eq!(order.status, OrderStatus::Active);
        assert!(order.buyer_cooperativecancel);
        assert!(!order.seller_cooperativecancel);
        assert_eq!(
            h.notifier.templates_for(&user("alice")),
            vec![Template::CooperativeCancelRequested]
        );
    }

    #[tokio::test]
    async fn test_repeat_request_is_noop() {
        let h = harness();
        let order = active_order(&h).await;
        let protocol = CooperativeCancelProtocol::new(&h.ctx);

        let CoopOutcome::Requested(order) = protocol.initiate(order, Role::Seller).await.unwrap()
        else {
            panic!("expected Requested");
        };
        let (id, version) = (order.id, order.version);
        let outcome = protocol.initiate(order, Role::Seller).await.unwrap();
        assert_eq!(outcome, CoopOutcome::AlreadyRequested);

        let stored = h.ctx.load(&id).await.unwrap();
        assert_eq!(stored.version, version);
        assert_eq!(stored.status, OrderStatus::Active);
    }

    #[tokio::test]
    async fn test_both_flags_cancel_with_role_wording() {
        let h = harness();
        let order = active_order(&h).await;
        let protocol = CooperativeCancelProtocol::new(&h.ctx);

        let CoopOutcome::Requested(order) = protocol.initiate(order, Role::Buyer).await.unwrap()
        else {
            panic!("expected Requested");
        };
        h.notifier.clear();
        let outcome = protocol.initiate(order, Role::Seller).await.unwrap();
        let order = match outcome {
            CoopOutcome::Finalized(order) => order,
            other => panic!("expected Finalized, got {other:?}"),
        };
        assert_eq!(order.status, OrderStatus::Canceled);
        assert_eq!(order.canceled_by, Some(user("alice")));
        assert_eq!(
            h.notifier.templates_for(&user("alice")),
            vec![Template::CooperativeCancelSeller]
        );
        assert_eq!(
            h.notifier.templates_for(&user("bob")),
            vec![Template::CooperativeCancelBuyer]
        );
    }

    #[tokio::test]
    async fn test_unfunded_order_rejected() {
        let h = harness();
        let order = listing(&h, OrderKind::Sell, "alice", fixed(dec!(100))).await;
        let err = CooperativeCancelProtocol::new(&h.ctx)
            .initiate(order, Role::Seller)
            .await
            .unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&Rejection::WrongStatus {
                status: OrderStatus::Pending
            })
        );
    }
}
