//! Trade counters and settled volume.

use p2px_core::{Order, UserId};
use tracing::debug;

use crate::context::LifecycleContext;
use crate::error::LifecycleResult;

/// Attempts per user before a version conflict is reported.
const SAVE_ATTEMPTS: usize = 3;

pub struct ReputationAccumulator<'a> {
    ctx: &'a LifecycleContext,
}

impl<'a> ReputationAccumulator<'a> {
    pub fn new(ctx: &'a LifecycleContext) -> Self {
        Self { ctx }
    }

    /// Credit both parties of a released order.
    pub async fn record_release(&self, order: &Order) -> LifecycleResult<()> {
        for user in [order.buyer_id.as_ref(), order.seller_id.as_ref()]
            .into_iter()
            .flatten()
        {
            self.credit(user, order).await?;
        }
        Ok(())
    }

    async fn credit(&self, user: &UserId, order: &Order) -> LifecycleResult<()> {
        let mut attempt = 1;
        loop {
            let mut stats = self.ctx.stats.load_stats(user).await?;
            stats.record_trade(&order.token_code, order.amount);
            match self.ctx.stats.save_stats(&stats).await {
                Ok(saved) => {
                    debug!(
                        user = %user,
                        trades = saved.trades_completed,
                        volume = %saved.volume_of(&order.token_code),
                        "Reputation updated"
                    );
                    return Ok(());
                }
                Err(e) if e.is_conflict() && attempt < SAVE_ATTEMPTS => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
