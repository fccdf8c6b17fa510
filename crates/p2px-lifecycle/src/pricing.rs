//! Market-priced amount finalization.
//!
//! An order listed with amount 0 gets its token amount when the counterpart
//! continues. The oracle is consulted once; the result and its fee are then
//! frozen on the order and never recomputed.

use p2px_core::{Order, TokenAmount};
use tracing::info;

use crate::context::LifecycleContext;
use crate::error::{LifecycleResult, Rejection};

/// Freeze amount and fee if the order is still market-priced.
///
/// Returns `true` when the order was modified.
pub async fn finalize_amount(ctx: &LifecycleContext, order: &mut Order) -> LifecycleResult<bool> {
    if !order.needs_amount_finalization() {
        return Ok(false);
    }
    let fiat = order
        .effective_fiat_amount()
        .ok_or(Rejection::FiatAmountRequired)?;

    let rate = ctx
        .oracle
        .fetch_market_rate(&order.fiat_code, &order.token_code)
        .await?;

    let raw = fiat.inner().checked_mul(rate).ok_or_else(|| {
        Rejection::MarketPriceUnavailable(format!("{fiat} x {rate} overflows"))
    })?;
    let amount = TokenAmount::floor(raw);
    if amount.is_zero() {
        return Err(Rejection::MarketPriceUnavailable(format!(
            "rate {rate} gives no tokens for {fiat} {}",
            order.fiat_code
        ))
        .into());
    }

    let fee = ctx.fee_for(order.community_id.as_ref(), amount).await?;
    order.freeze_amount(amount, fee)?;
    info!(
        order_id = %order.id,
        fiat = %fiat,
        rate = %rate,
        amount = %amount,
        fee = %fee,
        "Market amount frozen"
    );
    Ok(true)
}
