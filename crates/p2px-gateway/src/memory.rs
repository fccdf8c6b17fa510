//! In-memory collaborator doubles.

use async_trait::async_trait;
use p2px_core::{CommunityId, EscrowRecord, OrderId, UserId};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{GatewayError, GatewayResult};
use crate::notify::Template;
use crate::traits::{CommunityDirectory, EscrowLedger, Notifier, PriceOracle};

// ============================================================================
// Ledger
// ============================================================================

/// Escrow ledger backed by a map. Individual orders can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: RwLock<HashMap<OrderId, EscrowRecord>>,
    failing: RwLock<HashSet<OrderId>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, order_id: OrderId, record: EscrowRecord) {
        self.records.write().insert(order_id, record);
    }

    pub fn remove(&self, order_id: &OrderId) {
        self.records.write().remove(order_id);
    }

    /// Make every lookup for `order_id` return an RPC error.
    pub fn fail_for(&self, order_id: OrderId) {
        self.failing.write().insert(order_id);
    }
}

#[async_trait]
impl EscrowLedger for MemoryLedger {
    async fn get_escrow_record(&self, order_id: &OrderId) -> GatewayResult<Option<EscrowRecord>> {
        if self.failing.read().contains(order_id) {
            return Err(GatewayError::Rpc {
                code: -32000,
                message: format!("injected failure for {order_id}"),
            });
        }
        Ok(self.records.read().get(order_id).cloned())
    }
}

// ============================================================================
// Oracle
// ============================================================================

/// Oracle returning a settable rate and counting calls.
#[derive(Debug)]
pub struct FixedPriceOracle {
    rate: RwLock<Decimal>,
    calls: AtomicUsize,
}

impl FixedPriceOracle {
    pub fn new(rate: Decimal) -> Self {
        Self {
            rate: RwLock::new(rate),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_rate(&self, rate: Decimal) {
        *self.rate.write() = rate;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceOracle for FixedPriceOracle {
    async fn fetch_market_rate(&self, _fiat_code: &str, _token_code: &str) -> GatewayResult<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.rate.read())
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Recipient of a recorded notification. `None` means the operators.
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub user: Option<UserId>,
    pub template: Template,
    pub params: Value,
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().clone()
    }

    pub fn templates_for(&self, user: &UserId) -> Vec<Template> {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.user.as_ref() == Some(user))
            .map(|n| n.template)
            .collect()
    }

    pub fn admin_templates(&self) -> Vec<Template> {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.user.is_none())
            .map(|n| n.template)
            .collect()
    }

    pub fn count(&self, template: Template) -> usize {
        self.sent.lock().iter().filter(|n| n.template == template).count()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user: &UserId, template: Template, params: &Value) -> GatewayResult<()> {
        self.sent.lock().push(SentNotification {
            user: Some(user.clone()),
            template,
            params: params.clone(),
        });
        Ok(())
    }

    async fn notify_admins(&self, template: Template, params: &Value) -> GatewayResult<()> {
        self.sent.lock().push(SentNotification {
            user: None,
            template,
            params: params.clone(),
        });
        Ok(())
    }
}

// ============================================================================
// Communities
// ============================================================================

#[derive(Debug, Default)]
pub struct StaticCommunities {
    banned: RwLock<HashSet<(CommunityId, UserId)>>,
    fees: RwLock<HashMap<CommunityId, Decimal>>,
}

impl StaticCommunities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ban(&self, community: CommunityId, user: UserId) {
        self.banned.write().insert((community, user));
    }

    pub fn set_fee_percent(&self, community: CommunityId, percent: Decimal) {
        self.fees.write().insert(community, percent);
    }
}

#[async_trait]
impl CommunityDirectory for StaticCommunities {
    async fn is_banned(&self, community: &CommunityId, user: &UserId) -> GatewayResult<bool> {
        Ok(self
            .banned
            .read()
            .contains(&(community.clone(), user.clone())))
    }

    async fn fee_percent(&self, community: &CommunityId) -> GatewayResult<Option<Decimal>> {
        Ok(self.fees.read().get(community).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_oracle_counts_calls() {
        let oracle = FixedPriceOracle::new(dec!(2));
        assert_eq!(oracle.fetch_market_rate("USD", "USDT").await.unwrap(), dec!(2));
        oracle.set_rate(dec!(3));
        assert_eq!(oracle.fetch_market_rate("USD", "USDT").await.unwrap(), dec!(3));
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn test_ledger_failure_injection() {
        let ledger = MemoryLedger::new();
        let id = OrderId::new();
        assert!(ledger.get_escrow_record(&id).await.unwrap().is_none());
        ledger.fail_for(id);
        assert!(ledger.get_escrow_record(&id).await.is_err());
    }
}
