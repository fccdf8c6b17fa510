//! Order query predicate.

use chrono::{DateTime, Utc};
use p2px_core::{Order, OrderKind, OrderStatus, UserId};

/// Conjunction of optional criteria. An empty filter matches every order.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub statuses: Vec<OrderStatus>,
    pub kind: Option<OrderKind>,
    pub buyer_id: Option<UserId>,
    pub seller_id: Option<UserId>,
    pub funds_unlocked: Option<bool>,
    pub admin_warned: Option<bool>,
    /// `taken_at <= cutoff`.
    pub taken_before: Option<DateTime<Utc>>,
    /// `tokens_held_at <= cutoff`.
    pub tokens_held_before: Option<DateTime<Utc>>,
}

impl OrderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(status: OrderStatus) -> Self {
        Self::with_statuses([status])
    }

    pub fn with_statuses(statuses: impl IntoIterator<Item = OrderStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: OrderKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn buyer(mut self, user: UserId) -> Self {
        self.buyer_id = Some(user);
        self
    }

    pub fn seller(mut self, user: UserId) -> Self {
        self.seller_id = Some(user);
        self
    }

    pub fn funds_unlocked(mut self, value: bool) -> Self {
        self.funds_unlocked = Some(value);
        self
    }

    pub fn admin_warned(mut self, value: bool) -> Self {
        self.admin_warned = Some(value);
        self
    }

    pub fn taken_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.taken_before = Some(cutoff);
        self
    }

    pub fn tokens_held_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.tokens_held_before = Some(cutoff);
        self
    }

    pub fn matches(&self, order: &Order) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&order.status) {
            return false;
        }
        if self.kind.is_some_and(|k| k != order.kind) {
            return false;
        }
        if self.buyer_id.is_some() && self.buyer_id != order.buyer_id {
            return false;
        }
        if self.seller_id.is_some() && self.seller_id != order.seller_id {
            return false;
        }
        if self.funds_unlocked.is_some_and(|v| v != order.funds_unlocked) {
            return false;
        }
        if self.admin_warned.is_some_and(|v| v != order.admin_warned) {
            return false;
        }
        if let Some(cutoff) = self.taken_before {
            if !order.taken_at.is_some_and(|t| t <= cutoff) {
                return false;
            }
        }
        if let Some(cutoff) = self.tokens_held_before {
            if !order.tokens_held_at.is_some_and(|t| t <= cutoff) {
                return false;
            }
        }
        true
    }
}
