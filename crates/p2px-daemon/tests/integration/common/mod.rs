//! Shared trade fixture: state machine, reconciler and sweeper over one
//! in-memory store and ledger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use p2px_core::{EscrowRecord, EscrowStatus, FiatAmount, Order, OrderKind, TokenAmount, UserId};
use p2px_gateway::memory::MemoryLedger;
use p2px_jobs::{
    EscrowReconciler, ExpiryConfig, ExpirySweeper, GlobalOrdersLock, ReconcileReport, SweepReport,
};
use p2px_lifecycle::testkit::{harness, Harness, BUYER_ADDR, USDT};
use p2px_lifecycle::{NewOrder, OrderStateMachine};
use rust_decimal::Decimal;

pub struct TradeDesk {
    pub h: Harness,
    pub machine: OrderStateMachine,
    pub ledger: Arc<MemoryLedger>,
    pub reconciler: EscrowReconciler,
    pub sweeper: ExpirySweeper,
}

impl TradeDesk {
    pub fn new() -> Self {
        let h = harness();
        let ledger = Arc::new(MemoryLedger::new());
        let lock = Arc::new(GlobalOrdersLock::new());
        let reconciler = EscrowReconciler::new(h.ctx.clone(), ledger.clone(), lock.clone());
        let sweeper = ExpirySweeper::new(
            h.ctx.clone(),
            ExpiryConfig {
                payment_window_secs: 900,
                trade_window_secs: 3600,
            },
            lock,
        );
        Self {
            machine: OrderStateMachine::new(h.ctx.clone()),
            h,
            ledger,
            reconciler,
            sweeper,
        }
    }

    pub fn listing(kind: OrderKind, creator: &str, fiat_amount: FiatAmount) -> NewOrder {
        NewOrder {
            kind,
            creator: UserId::new(creator),
            token_code: "USDT".into(),
            fiat_code: "ARS".into(),
            fiat_amount,
            amount: TokenAmount::ZERO,
            payment_method: "bank transfer".into(),
            price_margin: Decimal::ZERO,
            buyer_address: (kind == OrderKind::Buy).then(|| BUYER_ADDR.to_string()),
            community_id: None,
        }
    }

    /// Put an escrow record matching `order` on the ledger.
    pub fn fund(&self, order: &Order, status: EscrowStatus, admin_triggered: bool) {
        let keys = order.keys.as_ref().expect("order has escrow keys");
        self.ledger.put(
            order.id,
            EscrowRecord {
                status,
                token_contract_address: USDT.into(),
                buyer_address: order.buyer_address.clone().expect("order has buyer address"),
                buyer_hash: format!("0x{}", keys.buyer_hash),
                seller_hash: format!("0x{}", keys.seller_hash),
                amount: order.amount,
                fee: order.fee,
                admin_triggered,
            },
        );
    }

    pub async fn reconcile(&self) -> ReconcileReport {
        self.reconciler
            .run_reconciliation()
            .await
            .expect("reconciliation pass")
            .expect("lock available")
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        self.sweeper
            .run_expiry_sweep(now)
            .await
            .expect("expiry sweep")
            .expect("lock available")
    }

    pub async fn reload(&self, order: &Order) -> Order {
        self.h.ctx.load(&order.id).await.expect("order exists")
    }
}
