//! Store traits.

use async_trait::async_trait;
use p2px_core::{Dispute, Order, OrderId, UserId, UserStats};

use crate::error::StoreResult;
use crate::filter::OrderFilter;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>>;

    async fn find_one(&self, id: &OrderId) -> StoreResult<Option<Order>>;

    /// Insert a new record. Returns the stored copy.
    async fn insert(&self, order: &Order) -> StoreResult<Order>;

    /// Persist `order` if its `version` still matches the stored record.
    ///
    /// Returns the stored copy with its version bumped. Rejects with
    /// `VersionConflict` when another writer saved first, and with
    /// `DuplicateKey` when a hash or secret is already held by another order.
    async fn save(&self, order: &Order) -> StoreResult<Order>;
}

#[async_trait]
pub trait DisputeStore: Send + Sync {
    async fn find_by_order(&self, order_id: &OrderId) -> StoreResult<Option<Dispute>>;

    async fn insert_dispute(&self, dispute: &Dispute) -> StoreResult<Dispute>;

    async fn save_dispute(&self, dispute: &Dispute) -> StoreResult<Dispute>;
}

#[async_trait]
pub trait UserStatsStore: Send + Sync {
    /// Stats for `user`, or a zeroed record if none exist yet.
    async fn load_stats(&self, user: &UserId) -> StoreResult<UserStats>;

    async fn save_stats(&self, stats: &UserStats) -> StoreResult<UserStats>;
}
