//! Shared handles used by the state machine and the background jobs.

use std::sync::Arc;

use p2px_core::{CommunityId, Order, OrderId, OrderStatus, TokenAmount, TokenRegistry, UserId};
use p2px_gateway::{CommunityDirectory, Notifier, PriceOracle, Template};
use p2px_store::{DisputeStore, OrderStore, UserStatsStore};
use p2px_telemetry::Metrics;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::{LifecycleError, LifecycleResult};
use crate::fees::FeePolicy;

#[derive(Clone)]
pub struct LifecycleContext {
    pub orders: Arc<dyn OrderStore>,
    pub disputes: Arc<dyn DisputeStore>,
    pub stats: Arc<dyn UserStatsStore>,
    pub oracle: Arc<dyn PriceOracle>,
    pub notifier: Arc<dyn Notifier>,
    pub communities: Arc<dyn CommunityDirectory>,
    pub tokens: Arc<TokenRegistry>,
    pub fees: FeePolicy,
}

impl LifecycleContext {
    /// Build a context whose three stores are served by one backend.
    pub fn new<S>(
        store: Arc<S>,
        oracle: Arc<dyn PriceOracle>,
        notifier: Arc<dyn Notifier>,
        communities: Arc<dyn CommunityDirectory>,
        tokens: TokenRegistry,
        fees: FeePolicy,
    ) -> Self
    where
        S: OrderStore + DisputeStore + UserStatsStore + 'static,
    {
        Self {
            orders: store.clone(),
            disputes: store.clone(),
            stats: store,
            oracle,
            notifier,
            communities,
            tokens: Arc::new(tokens),
            fees,
        }
    }

    pub async fn load(&self, id: &OrderId) -> LifecycleResult<Order> {
        self.orders
            .find_one(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("order {id}")))
    }

    /// Save `order`, counting a transition when its status moved off `prior`.
    pub async fn save(&self, order: &Order, prior: OrderStatus) -> LifecycleResult<Order> {
        let saved = self.orders.save(order).await?;
        if saved.status != prior {
            Metrics::order_transition(saved.status.as_str());
        }
        Ok(saved)
    }

    /// Fee for `amount` under the order's community, if any.
    pub async fn fee_for(
        &self,
        community: Option<&CommunityId>,
        amount: TokenAmount,
    ) -> LifecycleResult<TokenAmount> {
        let share = match community {
            Some(id) => self.communities.fee_percent(id).await?,
            None => None,
        };
        Ok(self.fees.compute(amount, share))
    }

    /// Fire-and-forget user message.
    pub async fn notify(&self, user: &UserId, template: Template, params: &Value) {
        if let Err(e) = self.notifier.notify(user, template, params).await {
            Metrics::notify_failure(template.key());
            warn!(user = %user, template = %template, error = %e, "Notification failed");
        }
    }

    pub async fn notify_party(&self, user: Option<&UserId>, template: Template, params: &Value) {
        if let Some(user) = user {
            self.notify(user, template, params).await;
        }
    }

    pub async fn notify_admins(&self, template: Template, params: &Value) {
        if let Err(e) = self.notifier.notify_admins(template, params).await {
            Metrics::notify_failure(template.key());
            warn!(template = %template, error = %e, "Admin notification failed");
        }
    }
}

/// Common message parameters for an order.
pub fn order_params(order: &Order) -> Value {
    json!({
        "order_id": order.id.to_string(),
        "kind": order.kind.to_string(),
        "status": order.status.as_str(),
        "amount": order.amount.to_base_unit_string(),
        "fee": order.fee.to_base_unit_string(),
        "fiat_amount": order
            .effective_fiat_amount()
            .map(|v| v.to_string())
            .unwrap_or_else(|| order.fiat_amount.to_string()),
        "fiat_code": order.fiat_code,
        "token_code": order.token_code,
        "payment_method": order.payment_method,
    })
}

/// Order parameters plus the data a seller needs to fund the escrow.
pub fn escrow_params(order: &Order, token_contract_address: &str) -> Value {
    let mut params = order_params(order);
    if let Value::Object(map) = &mut params {
        map.insert("token_contract_address".into(), json!(token_contract_address));
        map.insert("buyer_address".into(), json!(order.buyer_address));
        if let Some(keys) = &order.keys {
            map.insert("buyer_hash".into(), json!(keys.buyer_hash));
            map.insert("seller_hash".into(), json!(keys.seller_hash));
        }
    }
    params
}
