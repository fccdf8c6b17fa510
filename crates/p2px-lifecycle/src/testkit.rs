//! Fixtures shared by unit and integration tests: a context over
//! [`MemoryStore`] with recording doubles and a single USDT token.

use std::sync::Arc;

use chrono::Utc;
use p2px_core::{FiatAmount, FiatValue, Order, OrderKind, TokenRegistry, TokenSpec, UserId};
use p2px_gateway::memory::{FixedPriceOracle, RecordingNotifier, StaticCommunities};
use p2px_store::{MemoryStore, OrderStore};
use rust_decimal::Decimal;

use crate::context::LifecycleContext;
use crate::fees::FeePolicy;

pub const USDT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
pub const BUYER_ADDR: &str = "0x1111111111111111111111111111111111111111";

pub struct Harness {
    pub ctx: LifecycleContext,
    pub store: Arc<MemoryStore>,
    pub oracle: Arc<FixedPriceOracle>,
    pub notifier: Arc<RecordingNotifier>,
    pub communities: Arc<StaticCommunities>,
}

pub fn harness() -> Harness {
    harness_with_rate(Decimal::from(1000))
}

pub fn harness_with_rate(rate: Decimal) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let oracle = Arc::new(FixedPriceOracle::new(rate));
    let notifier = Arc::new(RecordingNotifier::new());
    let communities = Arc::new(StaticCommunities::new());
    let tokens = TokenRegistry::new([TokenSpec {
        code: "USDT".into(),
        contract_address: USDT.into(),
        decimals: 6,
        usd_price: Some(Decimal::ONE),
    }]);
    let ctx = LifecycleContext::new(
        store.clone(),
        oracle.clone(),
        notifier.clone(),
        communities.clone(),
        tokens,
        FeePolicy {
            max_fee: Decimal::new(3, 3),
            fee_percent: Decimal::new(7, 1),
        },
    );
    Harness {
        ctx,
        store,
        oracle,
        notifier,
        communities,
    }
}

pub fn user(name: &str) -> UserId {
    UserId::new(name)
}

pub fn fixed(v: Decimal) -> FiatAmount {
    FiatAmount::fixed(FiatValue::new(v)).unwrap()
}

/// Stored market-priced listing.
pub async fn listing(h: &Harness, kind: OrderKind, creator: &str, fiat: FiatAmount) -> Order {
    let mut order = Order::new(kind, user(creator), "USDT", "ARS", fiat, "bank", Utc::now());
    order.price_from_api = true;
    if kind == OrderKind::Buy {
        order.buyer_address = Some(BUYER_ADDR.into());
    }
    h.store.insert(&order).await.unwrap()
}
