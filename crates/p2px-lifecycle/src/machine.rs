//! User-triggered order transitions.
//!
//! Every operation loads the order, runs its guards in memory and persists
//! with a single optimistic-concurrency save. A guard failure returns
//! [`LifecycleError::Validation`] and writes nothing.

use std::str::FromStr;

use alloy::primitives::Address;
use chrono::Utc;
use p2px_core::{
    CommunityId, Dispute, FiatAmount, FiatValue, Order, OrderId, OrderKind, OrderStatus, Role,
    TokenAmount, UserId,
};
use p2px_gateway::Template;
use p2px_store::OrderFilter;
use p2px_telemetry::Metrics;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::context::{escrow_params, order_params, LifecycleContext};
use crate::cooperative::{CoopOutcome, CooperativeCancelProtocol};
use crate::error::{LifecycleError, LifecycleResult, Rejection};
use crate::pricing::finalize_amount;
use crate::republish::{republish, ExitCause, Republished};
use crate::secrets::mint_escrow_keys;

/// Reload-and-retry budget for cooperative cancel races.
const COOP_ATTEMPTS: usize = 3;

/// Listing parameters supplied by its creator.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub kind: OrderKind,
    pub creator: UserId,
    pub token_code: String,
    pub fiat_code: String,
    pub fiat_amount: FiatAmount,
    /// Zero for market pricing.
    pub amount: TokenAmount,
    pub payment_method: String,
    pub price_margin: Decimal,
    /// Required for buy listings.
    pub buyer_address: Option<String>,
    pub community_id: Option<CommunityId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    /// PENDING listing withdrawn by its creator.
    Closed(Order),
    /// Taker left a WAITING_* order; the listing is back on offer.
    Republished(Republished),
    Cooperative(CoopOutcome),
    /// Nothing to cancel in this status. No side effects were applied.
    BadStatus(OrderStatus),
}

fn require_address(address: &str) -> LifecycleResult<String> {
    let trimmed = address.trim();
    if !trimmed.starts_with("0x") {
        return Err(Rejection::InvalidAddress(trimmed.to_string()).into());
    }
    Address::from_str(trimmed)
        .map_err(|e| Rejection::InvalidAddress(format!("{trimmed}: {e}")))?;
    Ok(trimmed.to_string())
}

fn wrong_status(order: &Order) -> LifecycleError {
    Rejection::WrongStatus {
        status: order.status,
    }
    .into()
}

pub struct OrderStateMachine {
    ctx: LifecycleContext,
}

impl OrderStateMachine {
    pub fn new(ctx: LifecycleContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &LifecycleContext {
        &self.ctx
    }

    fn token_contract(&self, order: &Order) -> LifecycleResult<String> {
        Ok(self.ctx.tokens.get(&order.token_code)?.contract_address.clone())
    }

    async fn ensure_not_banned(
        &self,
        community: Option<&CommunityId>,
        user: &UserId,
    ) -> LifecycleResult<()> {
        if let Some(community) = community {
            if self.ctx.communities.is_banned(community, user).await? {
                return Err(Rejection::Banned.into());
            }
        }
        Ok(())
    }

    // ========================================================================
    // Creation
    // ========================================================================

    pub async fn create_order(&self, new: NewOrder) -> LifecycleResult<Order> {
        let token = self.ctx.tokens.get(&new.token_code)?;
        let market_priced = new.amount.is_zero();

        if new.fiat_amount.is_range() && !market_priced {
            return Err(Rejection::RangeNeedsMarketPrice.into());
        }
        if market_priced && !token.supports_market_price() {
            return Err(Rejection::MarketPriceUnavailable(format!(
                "{} has no price source",
                token.code
            ))
            .into());
        }
        // Re-validate so hand-built variants cannot bypass the bounds.
        match new.fiat_amount {
            FiatAmount::Fixed { value } => FiatAmount::fixed(value)?,
            FiatAmount::Range { min, max } => FiatAmount::range(min, max)?,
        };
        let buyer_address = match (new.kind, new.buyer_address.as_deref()) {
            (OrderKind::Buy, None) => return Err(Rejection::BuyerAddressRequired.into()),
            (OrderKind::Buy, Some(addr)) => Some(require_address(addr)?),
            (OrderKind::Sell, _) => None,
        };
        self.ensure_not_banned(new.community_id.as_ref(), &new.creator)
            .await?;

        let mut order = Order::new(
            new.kind,
            new.creator,
            token.code.clone(),
            new.fiat_code.to_ascii_uppercase(),
            new.fiat_amount,
            new.payment_method,
            Utc::now(),
        );
        order.buyer_address = buyer_address;
        order.price_margin = new.price_margin;
        order.community_id = new.community_id;
        order.price_from_api = market_priced;
        if !market_priced {
            order.amount = new.amount;
            order.fee = self
                .ctx
                .fee_for(order.community_id.as_ref(), new.amount)
                .await?;
        }

        let order = self.ctx.orders.insert(&order).await?;
        Metrics::order_transition(order.status.as_str());
        info!(
            order_id = %order.id,
            kind = %order.kind,
            creator = %order.creator_id,
            fiat_amount = %order.fiat_amount,
            "Order published"
        );
        self.ctx
            .notify(&order.creator_id, Template::OrderPublished, &order_params(&order))
            .await;
        Ok(order)
    }

    // ========================================================================
    // Take
    // ========================================================================

    /// Take a PENDING listing. Of concurrent takers exactly one succeeds; the
    /// others get [`Rejection::AlreadyTaken`].
    pub async fn take(&self, order_id: &OrderId, taker: &UserId) -> LifecycleResult<Order> {
        let mut order = self.ctx.load(order_id).await?;

        if order.is_creator(taker) {
            return Err(Rejection::OwnOrder.into());
        }
        if order.status != OrderStatus::Pending {
            self.ctx
                .notify(taker, Template::AlreadyTaken, &order_params(&order))
                .await;
            return Err(Rejection::AlreadyTaken.into());
        }

        let role = order.kind.taker_role();
        self.ensure_no_waiting_order(taker).await?;
        if role == Role::Seller {
            let fiat_sent = self
                .ctx
                .orders
                .find(&OrderFilter::with_status(OrderStatus::FiatSent).seller(taker.clone()))
                .await?;
            if !fiat_sent.is_empty() {
                return Err(Rejection::SellerHasFiatSent.into());
            }
        }
        self.ensure_not_banned(order.community_id.as_ref(), taker)
            .await?;

        let prior = order.status;
        match role {
            Role::Seller => {
                order.seller_id = Some(taker.clone());
                order.transition(OrderStatus::WaitingPayment)?;
            }
            Role::Buyer => {
                order.buyer_id = Some(taker.clone());
                order.transition(OrderStatus::WaitingBuyerAddress)?;
            }
        }
        order.taken_at = Some(Utc::now());

        let order = match self.ctx.save(&order, prior).await {
            Ok(saved) => saved,
            Err(e) if e.is_conflict() => {
                Metrics::take_conflict(&order.kind.to_string());
                debug!(order_id = %order_id, taker = %taker, "Lost take race");
                self.ctx
                    .notify(taker, Template::AlreadyTaken, &order_params(&order))
                    .await;
                return Err(Rejection::AlreadyTaken.into());
            }
            Err(e) => return Err(e),
        };

        info!(order_id = %order.id, taker = %taker, role = %role, "Order taken");
        let mut params = order_params(&order);
        params["taker_role"] = json!(role.to_string());
        self.ctx
            .notify(&order.creator_id, Template::OrderTaken, &params)
            .await;
        self.ctx.notify(taker, Template::OrderTaken, &params).await;
        Ok(order)
    }

    async fn ensure_no_waiting_order(&self, user: &UserId) -> LifecycleResult<()> {
        let as_seller = self
            .ctx
            .orders
            .find(&OrderFilter::with_status(OrderStatus::WaitingPayment).seller(user.clone()))
            .await?;
        let as_buyer = self
            .ctx
            .orders
            .find(&OrderFilter::with_status(OrderStatus::WaitingBuyerAddress).buyer(user.clone()))
            .await?;
        if as_seller.is_empty() && as_buyer.is_empty() {
            Ok(())
        } else {
            Err(Rejection::HasWaitingOrder.into())
        }
    }

    // ========================================================================
    // Continue
    // ========================================================================

    /// Taker of a range listing picks the fiat amount to trade.
    pub async fn choose_fiat_amount(
        &self,
        order_id: &OrderId,
        user: &UserId,
        value: FiatValue,
    ) -> LifecycleResult<Order> {
        let mut order = self.ctx.load(order_id).await?;
        if order.taker_id() != Some(user) {
            return Err(Rejection::NotTaker.into());
        }
        if !order.status.is_waiting() {
            return Err(wrong_status(&order));
        }
        let FiatAmount::Range { min, max } = order.fiat_amount else {
            return Err(Rejection::NotARangeOrder.into());
        };
        if order.amount_frozen || order.keys.is_some() {
            return Err(Rejection::AmountFrozen.into());
        }
        if !order.fiat_amount.accepts(value) {
            return Err(Rejection::FiatAmountOutOfRange { value, min, max }.into());
        }
        order.range_fill = Some(value);
        let prior = order.status;
        let order = self.ctx.save(&order, prior).await?;
        debug!(order_id = %order.id, fiat_amount = %value, "Range amount chosen");
        Ok(order)
    }

    /// Counterpart continues after taking.
    ///
    /// Buy listing: the seller receives escrow funding instructions. Sell
    /// listing: the buyer sees the final amount and is asked for an address.
    pub async fn continue_order(&self, order_id: &OrderId, user: &UserId) -> LifecycleResult<Order> {
        let mut order = self.ctx.load(order_id).await?;
        if order.taker_id() != Some(user) {
            return Err(Rejection::NotTaker.into());
        }

        match order.kind {
            OrderKind::Buy => {
                if order.status != OrderStatus::WaitingPayment {
                    return Err(wrong_status(&order));
                }
                let contract = self.token_contract(&order)?;
                if order.keys.is_some() {
                    // Keys are already with the seller; never re-mint them.
                    self.ctx
                        .notify(user, Template::PayEscrow, &escrow_params(&order, &contract))
                        .await;
                    return Ok(order);
                }
                finalize_amount(&self.ctx, &mut order).await?;
                order.keys = Some(mint_escrow_keys());
                order.taken_at = Some(Utc::now());
                let prior = order.status;
                let order = self.ctx.save(&order, prior).await?;
                info!(order_id = %order.id, "Escrow keys minted, waiting for seller to lock tokens");
                self.ctx
                    .notify(user, Template::PayEscrow, &escrow_params(&order, &contract))
                    .await;
                self.ctx
                    .notify_party(
                        order.buyer_id.as_ref(),
                        Template::WaitingSellerToPay,
                        &order_params(&order),
                    )
                    .await;
                Ok(order)
            }
            OrderKind::Sell => {
                if order.status != OrderStatus::WaitingBuyerAddress {
                    return Err(wrong_status(&order));
                }
                let order = if finalize_amount(&self.ctx, &mut order).await? {
                    let prior = order.status;
                    self.ctx.save(&order, prior).await?
                } else {
                    order
                };
                self.ctx
                    .notify(user, Template::EnterBuyerAddress, &order_params(&order))
                    .await;
                Ok(order)
            }
        }
    }

    /// Buyer of a sell listing supplies the receiving address.
    pub async fn submit_buyer_address(
        &self,
        order_id: &OrderId,
        buyer: &UserId,
        address: &str,
    ) -> LifecycleResult<Order> {
        let mut order = self.ctx.load(order_id).await?;
        if order.kind != OrderKind::Sell || order.buyer_id.as_ref() != Some(buyer) {
            return Err(Rejection::NotTaker.into());
        }
        if order.status != OrderStatus::WaitingBuyerAddress {
            return Err(wrong_status(&order));
        }
        let address = require_address(address)?;
        let contract = self.token_contract(&order)?;

        finalize_amount(&self.ctx, &mut order).await?;
        if order.effective_fiat_amount().is_none() {
            return Err(Rejection::FiatAmountRequired.into());
        }
        let prior = order.status;
        order.buyer_address = Some(address);
        order.keys = Some(mint_escrow_keys());
        order.taken_at = Some(Utc::now());
        order.transition(OrderStatus::WaitingPayment)?;
        let order = self.ctx.save(&order, prior).await?;

        info!(order_id = %order.id, "Buyer address received, waiting for seller to lock tokens");
        self.ctx
            .notify_party(
                order.seller_id.as_ref(),
                Template::PayEscrow,
                &escrow_params(&order, &contract),
            )
            .await;
        self.ctx
            .notify(buyer, Template::WaitingSellerToPay, &order_params(&order))
            .await;
        Ok(order)
    }

    // ========================================================================
    // Cancel
    // ========================================================================

    pub async fn cancel(&self, order_id: &OrderId, user: &UserId) -> LifecycleResult<CancelOutcome> {
        let mut order = self.ctx.load(order_id).await?;
        let role = order.role_of(user);
        if role.is_none() && !order.is_creator(user) {
            return Err(Rejection::NotAParty.into());
        }

        match order.status {
            OrderStatus::Pending => {
                if !order.is_creator(user) {
                    return Err(Rejection::NotAParty.into());
                }
                let prior = order.status;
                order.transition(OrderStatus::Closed)?;
                order.canceled_by = Some(user.clone());
                let order = self.ctx.save(&order, prior).await?;
                info!(order_id = %order.id, "Pending order closed by creator");
                self.ctx
                    .notify(user, Template::OrderClosed, &order_params(&order))
                    .await;
                Ok(CancelOutcome::Closed(order))
            }
            status if status.is_waiting() && order.taker_id() == Some(user) => {
                let out = republish(
                    &self.ctx,
                    order,
                    ExitCause::UserCanceled(user.clone()),
                    Utc::now(),
                )
                .await?;
                Ok(CancelOutcome::Republished(out))
            }
            status if status.is_funded() => {
                let Some(role) = role else {
                    return Err(Rejection::NotAParty.into());
                };
                self.cooperative_cancel(order, role).await
            }
            status => {
                debug!(order_id = %order.id, status = %status, "Cancel ignored");
                self.ctx
                    .notify(user, Template::BadStatus, &order_params(&order))
                    .await;
                Ok(CancelOutcome::BadStatus(status))
            }
        }
    }

    async fn cooperative_cancel(&self, order: Order, role: Role) -> LifecycleResult<CancelOutcome> {
        let protocol = CooperativeCancelProtocol::new(&self.ctx);
        let mut order = order;
        let mut attempt = 1;
        loop {
            match protocol.initiate(order.clone(), role).await {
                Err(e) if e.is_conflict() && attempt < COOP_ATTEMPTS => {
                    warn!(order_id = %order.id, attempt, "Cooperative cancel raced, reloading");
                    attempt += 1;
                    order = self.ctx.load(&order.id).await?;
                    if !order.status.is_funded() {
                        return Ok(CancelOutcome::BadStatus(order.status));
                    }
                }
                result => return result.map(CancelOutcome::Cooperative),
            }
        }
    }

    // ========================================================================
    // Settlement requests
    // ========================================================================

    /// Buyer reports the fiat payment as sent.
    pub async fn fiat_sent(&self, order_id: &OrderId, buyer: &UserId) -> LifecycleResult<Order> {
        let mut order = self.ctx.load(order_id).await?;
        if order.buyer_id.as_ref() != Some(buyer) {
            return Err(Rejection::NotAParty.into());
        }
        match order.status {
            OrderStatus::Active => {}
            OrderStatus::Released => {
                self.ctx
                    .notify(buyer, Template::SellerAlreadyReleased, &order_params(&order))
                    .await;
                return Err(Rejection::SellerAlreadyReleased.into());
            }
            _ => return Err(wrong_status(&order)),
        }
        // The seller already pulled the tokens back out of escrow.
        if order.funds_unlocked {
            return Err(Rejection::FundsAlreadyUnlocked.into());
        }
        if order.buyer_address.is_none() {
            return Err(Rejection::BuyerAddressRequired.into());
        }

        let prior = order.status;
        order.transition(OrderStatus::FiatSent)?;
        let order = self.ctx.save(&order, prior).await?;
        info!(order_id = %order.id, "Buyer marked fiat as sent");

        let params = order_params(&order);
        self.ctx.notify(buyer, Template::FiatSent, &params).await;
        self.ctx
            .notify_party(order.seller_id.as_ref(), Template::FiatSent, &params)
            .await;
        Ok(order)
    }

    /// Seller asks how to release. The release itself happens on-chain and
    /// is picked up by the reconciler; nothing is mutated here.
    pub async fn request_release(&self, order_id: &OrderId, seller: &UserId) -> LifecycleResult<Order> {
        let order = self.ctx.load(order_id).await?;
        if order.seller_id.as_ref() != Some(seller) {
            return Err(Rejection::NotAParty.into());
        }
        if order.status == OrderStatus::WaitingBuyerAddress {
            self.ctx
                .notify(seller, Template::WaitingForBuyer, &order_params(&order))
                .await;
            return Err(Rejection::WaitingForBuyer.into());
        }
        if !order.status.is_funded() {
            return Err(wrong_status(&order));
        }
        let contract = self.token_contract(&order)?;
        self.ctx
            .notify(seller, Template::ReleaseInstructions, &escrow_params(&order, &contract))
            .await;
        Ok(order)
    }

    /// Seller of a canceled order asks how to reclaim the escrowed tokens.
    pub async fn request_refund(&self, order_id: &OrderId, seller: &UserId) -> LifecycleResult<Order> {
        let order = self.ctx.load(order_id).await?;
        if order.seller_id.as_ref() != Some(seller) {
            return Err(Rejection::NotAParty.into());
        }
        if order.status != OrderStatus::Canceled {
            return Err(wrong_status(&order));
        }
        if order.funds_unlocked {
            return Err(Rejection::FundsAlreadyUnlocked.into());
        }
        let contract = self.token_contract(&order)?;
        self.ctx
            .notify(seller, Template::RefundInstructions, &escrow_params(&order, &contract))
            .await;
        Ok(order)
    }

    /// A party escalates an ACTIVE or FIAT_SENT order to the operators.
    pub async fn open_dispute(
        &self,
        order_id: &OrderId,
        user: &UserId,
    ) -> LifecycleResult<(Order, Dispute)> {
        let mut order = self.ctx.load(order_id).await?;
        let role = order.role_of(user).ok_or(Rejection::NotAParty)?;
        if !matches!(order.status, OrderStatus::Active | OrderStatus::FiatSent) {
            return Err(wrong_status(&order));
        }

        let prior = order.status;
        order.raise_dispute_flag(role);
        order.transition(OrderStatus::Dispute)?;
        let order = self.ctx.save(&order, prior).await?;
        let dispute = self
            .ctx
            .disputes
            .insert_dispute(&Dispute::open(&order, user.clone(), Utc::now()))
            .await?;
        info!(order_id = %order.id, dispute_id = %dispute.id, initiator = %user, "Dispute opened");

        let mut params = order_params(&order);
        params["initiator_role"] = json!(role.to_string());
        for party in [order.buyer_id.as_ref(), order.seller_id.as_ref()] {
            self.ctx
                .notify_party(party, Template::DisputeOpened, &params)
                .await;
        }
        Metrics::operator_alert("dispute");
        self.ctx.notify_admins(Template::DisputeAlert, &params).await;
        Ok((order, dispute))
    }
}
