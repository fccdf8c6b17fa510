//! Return a taken-but-unfunded listing to the book.
//!
//! Used both for a taker walking away and for payment-window expiry. Buy
//! listings are cloned into a fresh PENDING record while the original record
//! is closed as CANCELED, so the departing seller is detached without touching
//! the buyer's ownership. Sell listings are reset in place.

use chrono::{DateTime, Utc};
use p2px_core::{Order, OrderId, OrderKind, OrderStatus, UserId};
use p2px_gateway::Template;
use p2px_telemetry::Metrics;
use tracing::{error, info};

use crate::context::{order_params, LifecycleContext};
use crate::error::{LifecycleResult, Rejection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitCause {
    /// The taker canceled.
    UserCanceled(UserId),
    /// Payment window elapsed.
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Republished {
    /// The record as it was closed (buy) or reset (sell).
    pub previous: Order,
    /// The PENDING listing now on offer.
    pub listing: Order,
}

fn cloned_listing(original: &Order, now: DateTime<Utc>) -> Order {
    let mut listing = original.clone();
    listing.id = OrderId::new();
    listing.reset_for_republish();
    listing.status = OrderStatus::Pending;
    listing.canceled_by = None;
    listing.funds_unlocked = false;
    listing.admin_warned = false;
    listing.tokens_held_at = None;
    listing.created_at = now;
    listing.version = 0;
    listing
}

pub async fn republish(
    ctx: &LifecycleContext,
    mut order: Order,
    cause: ExitCause,
    now: DateTime<Utc>,
) -> LifecycleResult<Republished> {
    if !order.status.is_waiting() {
        return Err(Rejection::WrongStatus {
            status: order.status,
        }
        .into());
    }
    let prior = order.status;
    let taker = order.taker_id().cloned();

    let (previous, listing) = match order.kind {
        OrderKind::Buy => {
            if let ExitCause::UserCanceled(user) = &cause {
                order.canceled_by = Some(user.clone());
            }
            order.transition(OrderStatus::Canceled)?;
            let previous = ctx.save(&order, prior).await?;
            let fresh = cloned_listing(&previous, now);
            let listing = match ctx.orders.insert(&fresh).await {
                Ok(listing) => listing,
                Err(e) => {
                    error!(order_id = %previous.id, error = %e, "Failed to republish buy listing");
                    return Err(e.into());
                }
            };
            Metrics::order_transition(OrderStatus::Pending.as_str());
            (previous, listing)
        }
        OrderKind::Sell => {
            order.reset_for_republish();
            order.transition(OrderStatus::Pending)?;
            let listing = ctx.save(&order, prior).await?;
            (listing.clone(), listing)
        }
    };

    match &cause {
        ExitCause::UserCanceled(user) => {
            info!(order_id = %previous.id, user = %user, "Taker canceled, listing republished");
        }
        ExitCause::Expired => {
            info!(order_id = %previous.id, "Payment window expired, listing republished");
        }
    }

    let params = order_params(&listing);
    ctx.notify(&listing.creator_id, Template::OrderRepublished, &params)
        .await;
    match cause {
        ExitCause::UserCanceled(user) => {
            ctx.notify(&user, Template::CancelConfirmed, &params).await;
        }
        ExitCause::Expired => {
            ctx.notify_party(taker.as_ref(), Template::PaymentWindowExpired, &params)
                .await;
            ctx.notify_admins(Template::PaymentWindowExpired, &order_params(&previous))
                .await;
        }
    }

    Ok(Republished { previous, listing })
}
