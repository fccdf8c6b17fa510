//! Escrow reconciliation.
//!
//! The only writer that moves orders into or out of the funded states. A pass
//! runs three phases under [`GlobalOrdersLock`]:
//!
//! 1. Activation: WAITING_PAYMENT orders whose escrow is LOCKED become ACTIVE.
//! 2. Resolution: funded orders whose escrow was RELEASED or REFUNDED are
//!    settled.
//! 3. Unlock flagging: CANCELED orders whose escrow was paid out get
//!    `funds_unlocked`.
//!
//! Every phase acts only on an escrow record that matches the order field by
//! field. A missing or mismatched record means "not funded yet" and is never
//! an error. A failure on one order is logged and skipped.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use p2px_core::{DisputeStatus, EscrowRecord, EscrowStatus, Order, OrderId, OrderStatus};
use p2px_gateway::{EscrowLedger, Template};
use p2px_lifecycle::context::order_params;
use p2px_lifecycle::{LifecycleContext, RangeOrderSplitter, ReputationAccumulator};
use p2px_store::OrderFilter;
use p2px_telemetry::Metrics;
use tracing::{debug, error, info, warn};

use crate::error::JobResult;
use crate::lock::GlobalOrdersLock;

const JOB: &str = "reconcile";

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub activated: usize,
    pub released: usize,
    pub completed_by_admin: usize,
    pub canceled_by_admin: usize,
    pub unlocked: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Untouched,
    Released,
    CompletedByAdmin,
    CanceledByAdmin,
    Unlocked,
}

pub struct EscrowReconciler {
    ctx: LifecycleContext,
    ledger: Arc<dyn EscrowLedger>,
    lock: Arc<GlobalOrdersLock>,
}

impl EscrowReconciler {
    pub fn new(
        ctx: LifecycleContext,
        ledger: Arc<dyn EscrowLedger>,
        lock: Arc<GlobalOrdersLock>,
    ) -> Self {
        Self { ctx, ledger, lock }
    }

    /// One reconciliation pass. `Ok(None)` when the lock was busy and the pass
    /// was skipped.
    pub async fn run_reconciliation(&self) -> JobResult<Option<ReconcileReport>> {
        let Some(_guard) = self.lock.try_guard() else {
            Metrics::pass_skipped(JOB);
            debug!("Reconciliation skipped, orders lock held");
            return Ok(None);
        };
        let started = Instant::now();
        let mut report = ReconcileReport::default();

        self.activation_phase(&mut report).await?;
        self.resolution_phase(&mut report).await?;
        self.unlock_phase(&mut report).await?;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        Metrics::pass_run(JOB, elapsed_ms);
        if report != ReconcileReport::default() {
            info!(
                activated = report.activated,
                released = report.released,
                completed_by_admin = report.completed_by_admin,
                canceled_by_admin = report.canceled_by_admin,
                unlocked = report.unlocked,
                failed = report.failed,
                elapsed_ms,
                "Reconciliation pass complete"
            );
        }
        Ok(Some(report))
    }

    fn isolate(
        &self,
        order_id: &OrderId,
        phase: &str,
        err: &dyn std::fmt::Display,
        report: &mut ReconcileReport,
    ) {
        report.failed += 1;
        Metrics::order_failure(JOB);
        warn!(order_id = %order_id, phase, error = %err, "Order skipped this pass");
    }

    /// The ledger record for `order`, if it exists and matches exactly.
    async fn matching_record(&self, order: &Order) -> JobResult<Option<EscrowRecord>> {
        let token = self.ctx.tokens.get(&order.token_code)?;
        let Some(record) = self.ledger.get_escrow_record(&order.id).await? else {
            return Ok(None);
        };
        if !record.matches(order, &token.contract_address) {
            debug!(
                order_id = %order.id,
                escrow_status = %record.status,
                "Escrow record does not match order"
            );
            return Ok(None);
        }
        Ok(Some(record))
    }

    // ========================================================================
    // Activation
    // ========================================================================

    async fn activation_phase(&self, report: &mut ReconcileReport) -> JobResult<()> {
        let waiting = self
            .ctx
            .orders
            .find(&OrderFilter::with_status(OrderStatus::WaitingPayment))
            .await?;
        for order in waiting {
            let id = order.id;
            match self.activate(order).await {
                Ok(true) => report.activated += 1,
                Ok(false) => {}
                Err(e) => self.isolate(&id, "activation", &e, report),
            }
        }
        Ok(())
    }

    async fn activate(&self, mut order: Order) -> JobResult<bool> {
        let Some(record) = self.matching_record(&order).await? else {
            return Ok(false);
        };
        if record.status != EscrowStatus::Locked {
            return Ok(false);
        }

        let prior = order.status;
        order.transition(OrderStatus::Active)?;
        order.tokens_held_at = Some(Utc::now());
        let order = self.ctx.save(&order, prior).await?;
        info!(order_id = %order.id, amount = %order.amount, "Escrow locked, order active");

        let params = order_params(&order);
        self.ctx
            .notify_party(order.buyer_id.as_ref(), Template::TokensLockedBuyer, &params)
            .await;
        self.ctx
            .notify_party(order.seller_id.as_ref(), Template::TokensLockedSeller, &params)
            .await;
        Ok(true)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    async fn resolution_phase(&self, report: &mut ReconcileReport) -> JobResult<()> {
        let funded = self
            .ctx
            .orders
            .find(&OrderFilter::with_statuses([
                OrderStatus::Active,
                OrderStatus::FiatSent,
                OrderStatus::Dispute,
            ]))
            .await?;
        for order in funded {
            let id = order.id;
            match self.resolve(order).await {
                Ok(Resolution::Untouched) => {}
                Ok(Resolution::Released) => report.released += 1,
                Ok(Resolution::CompletedByAdmin) => report.completed_by_admin += 1,
                Ok(Resolution::CanceledByAdmin) => report.canceled_by_admin += 1,
                Ok(Resolution::Unlocked) => report.unlocked += 1,
                Err(e) => self.isolate(&id, "resolution", &e, report),
            }
        }
        Ok(())
    }

    async fn resolve(&self, mut order: Order) -> JobResult<Resolution> {
        let Some(record) = self.matching_record(&order).await? else {
            return Ok(Resolution::Untouched);
        };
        let prior = order.status;

        match (record.status, record.admin_triggered) {
            (EscrowStatus::Released, admin) => {
                let (status, dispute_status) = if admin {
                    (OrderStatus::CompletedByAdmin, DisputeStatus::AdminReleased)
                } else {
                    (OrderStatus::Released, DisputeStatus::SellerReleased)
                };
                self.close_dispute(&order, dispute_status).await?;
                order.transition(status)?;
                order.funds_unlocked = true;
                let order = self.ctx.save(&order, prior).await?;
                info!(order_id = %order.id, status = %order.status, "Escrow released");

                let params = order_params(&order);
                if admin {
                    for party in [order.buyer_id.as_ref(), order.seller_id.as_ref()] {
                        self.ctx
                            .notify_party(party, Template::CompletedByAdmin, &params)
                            .await;
                    }
                    return Ok(Resolution::CompletedByAdmin);
                }
                self.ctx
                    .notify_party(order.buyer_id.as_ref(), Template::OrderReleasedBuyer, &params)
                    .await;
                self.ctx
                    .notify_party(order.seller_id.as_ref(), Template::OrderReleasedSeller, &params)
                    .await;
                self.settle_released(&order).await;
                Ok(Resolution::Released)
            }
            (EscrowStatus::Refunded, true) => {
                self.close_dispute(&order, DisputeStatus::AdminRefunded)
                    .await?;
                order.transition(OrderStatus::CanceledByAdmin)?;
                order.funds_unlocked = true;
                let order = self.ctx.save(&order, prior).await?;
                info!(order_id = %order.id, "Escrow refunded by admin");

                let params = order_params(&order);
                for party in [order.buyer_id.as_ref(), order.seller_id.as_ref()] {
                    self.ctx
                        .notify_party(party, Template::CanceledByAdmin, &params)
                        .await;
                }
                Ok(Resolution::CanceledByAdmin)
            }
            (EscrowStatus::Refunded, false) => {
                // A seller refund was already accounted for when the order was
                // canceled; only record that the funds left the escrow.
                if order.funds_unlocked {
                    return Ok(Resolution::Untouched);
                }
                order.funds_unlocked = true;
                self.ctx.save(&order, prior).await?;
                debug!(order_id = %order.id, "Seller refund observed");
                Ok(Resolution::Unlocked)
            }
            (EscrowStatus::Locked | EscrowStatus::None, _) => Ok(Resolution::Untouched),
        }
    }

    async fn close_dispute(&self, order: &Order, status: DisputeStatus) -> JobResult<()> {
        let Some(mut dispute) = self.ctx.disputes.find_by_order(&order.id).await? else {
            return Ok(());
        };
        if dispute.close(status) {
            self.ctx.disputes.save_dispute(&dispute).await?;
            info!(order_id = %order.id, dispute_id = %dispute.id, status = %status, "Dispute closed");
        }
        Ok(())
    }

    /// Reputation and range remainder for a released order. The order itself
    /// is already persisted, so failures here are logged, not retried.
    async fn settle_released(&self, order: &Order) {
        if let Err(e) = ReputationAccumulator::new(&self.ctx)
            .record_release(order)
            .await
        {
            Metrics::order_failure(JOB);
            error!(order_id = %order.id, error = %e, "Failed to update reputation");
        }
        if let Err(e) = RangeOrderSplitter::new(&self.ctx)
            .split(order, Utc::now())
            .await
        {
            Metrics::order_failure(JOB);
            error!(order_id = %order.id, error = %e, "Failed to republish range remainder");
        }
    }

    // ========================================================================
    // Unlock flagging
    // ========================================================================

    async fn unlock_phase(&self, report: &mut ReconcileReport) -> JobResult<()> {
        let canceled = self
            .ctx
            .orders
            .find(&OrderFilter::with_status(OrderStatus::Canceled).funds_unlocked(false))
            .await?;
        for order in canceled {
            let id = order.id;
            match self.flag_unlocked(order).await {
                Ok(true) => report.unlocked += 1,
                Ok(false) => {}
                Err(e) => self.isolate(&id, "unlock", &e, report),
            }
        }
        Ok(())
    }

    async fn flag_unlocked(&self, mut order: Order) -> JobResult<bool> {
        let Some(record) = self.matching_record(&order).await? else {
            return Ok(false);
        };
        if !matches!(record.status, EscrowStatus::Released | EscrowStatus::Refunded) {
            return Ok(false);
        }
        order.funds_unlocked = true;
        let order = self.ctx.save(&order, OrderStatus::Canceled).await?;
        debug!(order_id = %order.id, escrow_status = %record.status, "Canceled order funds unlocked");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use p2px_core::{Dispute, FiatAmount, FiatValue, OrderKind, TokenAmount, UserId};
    use p2px_gateway::memory::MemoryLedger;
    use p2px_gateway::{GatewayError, GatewayResult};
    use p2px_lifecycle::mint_escrow_keys;
    use p2px_lifecycle::testkit::*;
    use p2px_store::{DisputeStore, OrderStore, UserStatsStore};
    use rust_decimal_macros::dec;

    mock! {
        Ledger {}

        #[async_trait]
        impl EscrowLedger for Ledger {
            async fn get_escrow_record(&self, order_id: &OrderId) -> GatewayResult<Option<EscrowRecord>>;
        }
    }

    struct Fixture {
        h: Harness,
        ledger: Arc<MemoryLedger>,
        lock: Arc<GlobalOrdersLock>,
        reconciler: EscrowReconciler,
    }

    fn fixture() -> Fixture {
        let h = harness();
        let ledger = Arc::new(MemoryLedger::new());
        let lock = Arc::new(GlobalOrdersLock::new());
        let reconciler = EscrowReconciler::new(h.ctx.clone(), ledger.clone(), lock.clone());
        Fixture {
            h,
            ledger,
            lock,
            reconciler,
        }
    }

    async fn funded_order(h: &Harness, fiat: FiatAmount, status: OrderStatus) -> Order {
        let mut order = listing(h, OrderKind::Sell, "alice", fiat).await;
        order.buyer_id = Some(user("bob"));
        order.buyer_address = Some(BUYER_ADDR.into());
        order.range_fill = order.fiat_amount.is_range().then(|| FiatValue::new(dec!(80)));
        order
            .freeze_amount(TokenAmount::from(100_000), TokenAmount::from(300))
            .unwrap();
        order.keys = Some(mint_escrow_keys());
        order.taken_at = Some(Utc::now());
        order.status = status;
        h.store.save(&order).await.unwrap()
    }

    fn record_for(order: &Order, status: EscrowStatus) -> EscrowRecord {
        let keys = order.keys.as_ref().unwrap();
        EscrowRecord {
            status,
            token_contract_address: USDT.to_ascii_uppercase().replacen("0X", "0x", 1),
            buyer_address: BUYER_ADDR.into(),
            buyer_hash: format!("0x{}", keys.buyer_hash),
            seller_hash: format!("0x{}", keys.seller_hash),
            amount: order.amount,
            fee: order.fee,
            admin_triggered: false,
        }
    }

    async fn reload(h: &Harness, id: &OrderId) -> Order {
        h.ctx.load(id).await.unwrap()
    }

    #[tokio::test]
    async fn test_locked_escrow_activates_order() {
        let f = fixture();
        let order = funded_order(&f.h, fixed(dec!(100)), OrderStatus::WaitingPayment).await;
        f.ledger.put(order.id, record_for(&order, EscrowStatus::Locked));

        let report = f.reconciler.run_reconciliation().await.unwrap().unwrap();
        assert_eq!(report.activated, 1);

        let order = reload(&f.h, &order.id).await;
        assert_eq!(order.status, OrderStatus::Active);
        assert!(order.tokens_held_at.is_some());
        assert!(f.h.notifier.templates_for(&user("bob")).contains(&Template::TokensLockedBuyer));
        assert!(f.h.notifier.templates_for(&user("alice")).contains(&Template::TokensLockedSeller));

        // Activation is monotonic.
        let report = f.reconciler.run_reconciliation().await.unwrap().unwrap();
        assert_eq!(report.activated, 0);
        assert_eq!(reload(&f.h, &order.id).await.status, OrderStatus::Active);
    }

    #[tokio::test]
    async fn test_missing_escrow_is_noop() {
        let f = fixture();
        let order = funded_order(&f.h, fixed(dec!(100)), OrderStatus::WaitingPayment).await;
        let report = f.reconciler.run_reconciliation().await.unwrap().unwrap();
        assert_eq!(report, ReconcileReport::default());
        assert_eq!(reload(&f.h, &order.id).await.version, order.version);
    }

    #[tokio::test]
    async fn test_mismatched_escrow_never_mutates() {
        type Tamper = fn(&mut EscrowRecord);
        let tampers: [Tamper; 6] = [
            |r| r.token_contract_address = "0x0000000000000000000000000000000000000001".into(),
            |r| r.buyer_address = "0x2222222222222222222222222222222222222222".into(),
            |r| r.buyer_hash = "0xdeadbeef".into(),
            |r| r.seller_hash.push('0'),
            |r| r.amount = r.amount + TokenAmount::from(1),
            |r| r.fee = TokenAmount::ZERO,
        ];

        for status in [EscrowStatus::Locked, EscrowStatus::Released, EscrowStatus::Refunded] {
            for admin in [false, true] {
                for tamper in tampers {
                    let f = fixture();
                    let waiting =
                        funded_order(&f.h, fixed(dec!(100)), OrderStatus::WaitingPayment).await;
                    let active = {
                        let mut o = listing(&f.h, OrderKind::Sell, "carol", fixed(dec!(100))).await;
                        o.buyer_id = Some(user("dave"));
                        o.buyer_address = Some(BUYER_ADDR.into());
                        o.freeze_amount(TokenAmount::from(5_000), TokenAmount::from(15))
                            .unwrap();
                        o.keys = Some(mint_escrow_keys());
                        o.status = OrderStatus::FiatSent;
                        f.h.store.save(&o).await.unwrap()
                    };
                    for order in [&waiting, &active] {
                        let mut record = record_for(order, status);
                        record.admin_triggered = admin;
                        tamper(&mut record);
                        f.ledger.put(order.id, record);
                    }

                    let report = f.reconciler.run_reconciliation().await.unwrap().unwrap();
                    assert_eq!(report, ReconcileReport::default());
                    for order in [&waiting, &active] {
                        let stored = reload(&f.h, &order.id).await;
                        assert_eq!(stored.status, order.status);
                        assert_eq!(stored.version, order.version);
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_release_settles_order() {
        let f = fixture();
        let range = FiatAmount::range(FiatValue::new(dec!(50)), FiatValue::new(dec!(200))).unwrap();
        let order = funded_order(&f.h, range, OrderStatus::FiatSent).await;
        f.ledger.put(order.id, record_for(&order, EscrowStatus::Released));

        let report = f.reconciler.run_reconciliation().await.unwrap().unwrap();
        assert_eq!(report.released, 1);

        let settled = reload(&f.h, &order.id).await;
        assert_eq!(settled.status, OrderStatus::Released);
        assert!(settled.funds_unlocked);

        for name in ["alice", "bob"] {
            let stats = f.h.store.load_stats(&user(name)).await.unwrap();
            assert_eq!(stats.trades_completed, 1);
            assert_eq!(stats.volume_of("USDT"), TokenAmount::from(100_000));
        }

        let children = f
            .h
            .store
            .find(&OrderFilter::with_status(OrderStatus::Pending))
            .await
            .unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].range_parent_id, Some(order.id));
        assert_eq!(
            children[0].fiat_amount,
            FiatAmount::Range {
                min: FiatValue::new(dec!(50)),
                max: FiatValue::new(dec!(120)),
            }
        );
        assert!(f.h.notifier.templates_for(&user("bob")).contains(&Template::OrderReleasedBuyer));
    }

    #[tokio::test]
    async fn test_release_closes_dispute() {
        let f = fixture();
        let order = funded_order(&f.h, fixed(dec!(100)), OrderStatus::Dispute).await;
        f.h.store
            .insert_dispute(&Dispute::open(&order, user("bob"), Utc::now()))
            .await
            .unwrap();
        f.ledger.put(order.id, record_for(&order, EscrowStatus::Released));

        f.reconciler.run_reconciliation().await.unwrap();

        let dispute = f.h.store.find_by_order(&order.id).await.unwrap().unwrap();
        assert_eq!(dispute.status, DisputeStatus::SellerReleased);
        assert_eq!(reload(&f.h, &order.id).await.status, OrderStatus::Released);
    }

    #[tokio::test]
    async fn test_admin_release_completes_without_reputation() {
        let f = fixture();
        let order = funded_order(&f.h, fixed(dec!(100)), OrderStatus::Dispute).await;
        f.h.store
            .insert_dispute(&Dispute::open(&order, user("alice"), Utc::now()))
            .await
            .unwrap();
        let mut record = record_for(&order, EscrowStatus::Released);
        record.admin_triggered = true;
        f.ledger.put(order.id, record);

        let report = f.reconciler.run_reconciliation().await.unwrap().unwrap();
        assert_eq!(report.completed_by_admin, 1);
        assert_eq!(
            reload(&f.h, &order.id).await.status,
            OrderStatus::CompletedByAdmin
        );
        let dispute = f.h.store.find_by_order(&order.id).await.unwrap().unwrap();
        assert_eq!(dispute.status, DisputeStatus::AdminReleased);
        let stats = f.h.store.load_stats(&user("bob")).await.unwrap();
        assert_eq!(stats.trades_completed, 0);
    }

    #[tokio::test]
    async fn test_refund_paths() {
        let f = fixture();
        let self_refund = funded_order(&f.h, fixed(dec!(100)), OrderStatus::Active).await;
        f.ledger.put(self_refund.id, record_for(&self_refund, EscrowStatus::Refunded));

        let admin_refund = {
            let mut o = listing(&f.h, OrderKind::Sell, "carol", fixed(dec!(100))).await;
            o.buyer_id = Some(user("dave"));
            o.buyer_address = Some(BUYER_ADDR.into());
            o.freeze_amount(TokenAmount::from(7_000), TokenAmount::from(21))
                .unwrap();
            o.keys = Some(mint_escrow_keys());
            o.status = OrderStatus::Dispute;
            f.h.store.save(&o).await.unwrap()
        };
        let mut record = record_for(&admin_refund, EscrowStatus::Refunded);
        record.admin_triggered = true;
        f.ledger.put(admin_refund.id, record);

        let report = f.reconciler.run_reconciliation().await.unwrap().unwrap();
        assert_eq!(report.canceled_by_admin, 1);
        assert_eq!(report.unlocked, 1);

        let stored = reload(&f.h, &self_refund.id).await;
        assert_eq!(stored.status, OrderStatus::Active);
        assert!(stored.funds_unlocked);
        assert_eq!(
            reload(&f.h, &admin_refund.id).await.status,
            OrderStatus::CanceledByAdmin
        );

        // The self-refund is not applied twice.
        let report = f.reconciler.run_reconciliation().await.unwrap().unwrap();
        assert_eq!(report.unlocked, 0);
        assert_eq!(reload(&f.h, &self_refund.id).await.version, stored.version);
    }

    #[tokio::test]
    async fn test_canceled_order_flagged_unlocked() {
        let f = fixture();
        let order = funded_order(&f.h, fixed(dec!(100)), OrderStatus::Canceled).await;
        f.ledger.put(order.id, record_for(&order, EscrowStatus::Refunded));

        let report = f.reconciler.run_reconciliation().await.unwrap().unwrap();
        assert_eq!(report.unlocked, 1);
        let stored = reload(&f.h, &order.id).await;
        assert!(stored.funds_unlocked);
        assert_eq!(stored.status, OrderStatus::Canceled);
    }

    #[tokio::test]
    async fn test_ledger_failure_isolated_per_order() {
        let f = fixture();
        let broken = funded_order(&f.h, fixed(dec!(100)), OrderStatus::WaitingPayment).await;
        let healthy = {
            let mut o = listing(&f.h, OrderKind::Sell, "carol", fixed(dec!(100))).await;
            o.buyer_id = Some(UserId::new("dave"));
            o.buyer_address = Some(BUYER_ADDR.into());
            o.freeze_amount(TokenAmount::from(9_000), TokenAmount::from(27))
                .unwrap();
            o.keys = Some(mint_escrow_keys());
            o.status = OrderStatus::WaitingPayment;
            f.h.store.save(&o).await.unwrap()
        };
        f.ledger.fail_for(broken.id);
        f.ledger.put(healthy.id, record_for(&healthy, EscrowStatus::Locked));

        let report = f.reconciler.run_reconciliation().await.unwrap().unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.activated, 1);
        assert_eq!(reload(&f.h, &healthy.id).await.status, OrderStatus::Active);
        assert_eq!(
            reload(&f.h, &broken.id).await.status,
            OrderStatus::WaitingPayment
        );
    }

    #[tokio::test]
    async fn test_mock_ledger_error_does_not_abort_pass() {
        let h = harness();
        let order = funded_order(&h, fixed(dec!(100)), OrderStatus::Active).await;

        let mut ledger = MockLedger::new();
        ledger.expect_get_escrow_record().returning(|_| {
            Err(GatewayError::HttpClient("connection refused".into()))
        });
        let reconciler = EscrowReconciler::new(
            h.ctx.clone(),
            Arc::new(ledger),
            Arc::new(GlobalOrdersLock::new()),
        );

        let report = reconciler.run_reconciliation().await.unwrap().unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(h.ctx.load(&order.id).await.unwrap().status, OrderStatus::Active);
    }

    #[tokio::test]
    async fn test_busy_lock_skips_pass() {
        let f = fixture();
        let order = funded_order(&f.h, fixed(dec!(100)), OrderStatus::WaitingPayment).await;
        f.ledger.put(order.id, record_for(&order, EscrowStatus::Locked));

        assert!(f.lock.acquire());
        assert!(f.reconciler.run_reconciliation().await.unwrap().is_none());
        assert_eq!(
            reload(&f.h, &order.id).await.status,
            OrderStatus::WaitingPayment
        );

        f.lock.release();
        assert!(f.reconciler.run_reconciliation().await.unwrap().is_some());
        assert!(!f.lock.is_held());
    }
}
