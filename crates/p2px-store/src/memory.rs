//! In-process store backend.
//!
//! Orders live behind a single `RwLock` so that the version check and the
//! hash/secret uniqueness scan happen atomically with the write. Disputes and
//! stats are independent per key and use `DashMap`.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

use p2px_core::{Dispute, Order, OrderId, UserId, UserStats};

use crate::error::{StoreError, StoreResult};
use crate::filter::OrderFilter;
use crate::traits::{DisputeStore, OrderStore, UserStatsStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    orders: RwLock<HashMap<OrderId, Order>>,
    disputes: DashMap<OrderId, Dispute>,
    stats: DashMap<UserId, UserStats>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_count(&self) -> usize {
        self.orders.read().len()
    }
}

/// First hash or secret of `order` already held by a different order.
fn key_clash(orders: &HashMap<OrderId, Order>, order: &Order) -> Option<String> {
    let keys = order.keys.as_ref()?;
    let wanted: Vec<&str> = keys.hashes().into_iter().chain(keys.secrets()).collect();
    orders
        .values()
        .filter(|other| other.id != order.id)
        .filter_map(|other| other.keys.as_ref())
        .flat_map(|k| k.hashes().into_iter().chain(k.secrets()))
        .find(|held| wanted.contains(held))
        .map(|held| held.to_string())
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>> {
        let orders = self.orders.read();
        let mut found: Vec<Order> = orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        found.sort_by_key(|o| (o.created_at, o.id));
        Ok(found)
    }

    async fn find_one(&self, id: &OrderId) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().get(id).cloned())
    }

    async fn insert(&self, order: &Order) -> StoreResult<Order> {
        let mut orders = self.orders.write();
        if orders.contains_key(&order.id) {
            return Err(StoreError::DuplicateKey(format!("order {}", order.id)));
        }
        if let Some(key) = key_clash(&orders, order) {
            return Err(StoreError::DuplicateKey(format!("escrow key {key}")));
        }
        let mut stored = order.clone();
        stored.version = 1;
        orders.insert(stored.id, stored.clone());
        debug!(order_id = %stored.id, status = %stored.status, "Order inserted");
        Ok(stored)
    }

    async fn save(&self, order: &Order) -> StoreResult<Order> {
        let mut orders = self.orders.write();
        let current = orders
            .get(&order.id)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", order.id)))?;
        if current.version != order.version {
            return Err(StoreError::VersionConflict {
                id: order.id.to_string(),
                expected: order.version,
                found: current.version,
            });
        }
        if let Some(key) = key_clash(&orders, order) {
            return Err(StoreError::DuplicateKey(format!("escrow key {key}")));
        }
        let mut stored = order.clone();
        stored.version = order.version + 1;
        orders.insert(stored.id, stored.clone());
        debug!(
            order_id = %stored.id,
            status = %stored.status,
            version = stored.version,
            "Order saved"
        );
        Ok(stored)
    }
}

#[async_trait]
impl DisputeStore for MemoryStore {
    async fn find_by_order(&self, order_id: &OrderId) -> StoreResult<Option<Dispute>> {
        Ok(self.disputes.get(order_id).map(|d| d.clone()))
    }

    async fn insert_dispute(&self, dispute: &Dispute) -> StoreResult<Dispute> {
        match self.disputes.entry(dispute.order_id) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(format!(
                "dispute for order {}",
                dispute.order_id
            ))),
            Entry::Vacant(slot) => {
                let mut stored = dispute.clone();
                stored.version = 1;
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn save_dispute(&self, dispute: &Dispute) -> StoreResult<Dispute> {
        let mut current = self
            .disputes
            .get_mut(&dispute.order_id)
            .ok_or_else(|| StoreError::NotFound(format!("dispute {}", dispute.id)))?;
        if current.version != dispute.version {
            return Err(StoreError::VersionConflict {
                id: dispute.id.to_string(),
                expected: dispute.version,
                found: current.version,
            });
        }
        let mut stored = dispute.clone();
        stored.version = dispute.version + 1;
        *current = stored.clone();
        Ok(stored)
    }
}

#[async_trait]
impl UserStatsStore for MemoryStore {
    async fn load_stats(&self, user: &UserId) -> StoreResult<UserStats> {
        Ok(self
            .stats
            .get(user)
            .map(|s| s.clone())
            .unwrap_or_else(|| UserStats::new(user.clone())))
    }

    async fn save_stats(&self, stats: &UserStats) -> StoreResult<UserStats> {
        let conflict = |found: u64| StoreError::VersionConflict {
            id: stats.user_id.to_string(),
            expected: stats.version,
            found,
        };
        let mut stored = stats.clone();
        stored.version = stats.version + 1;

        // Version check and write under the same shard lock.
        match self.stats.entry(stats.user_id.clone()) {
            Entry::Occupied(mut slot) => {
                if slot.get().version != stats.version {
                    return Err(conflict(slot.get().version));
                }
                slot.insert(stored.clone());
            }
            Entry::Vacant(slot) => {
                if stats.version != 0 {
                    return Err(conflict(0));
                }
                slot.insert(stored.clone());
            }
        }
        Ok(stored)
    }
}
