//! Payment-window and trade-window timeouts.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use p2px_core::{Order, OrderStatus};
use p2px_gateway::Template;
use p2px_lifecycle::context::order_params;
use p2px_lifecycle::{republish, ExitCause, LifecycleContext};
use p2px_store::OrderFilter;
use p2px_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::JobResult;
use crate::lock::GlobalOrdersLock;

const JOB: &str = "sweep";

fn default_payment_window_secs() -> u64 {
    900
}

fn default_trade_window_secs() -> u64 {
    172_800
}

/// Timeout windows, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiryConfig {
    /// How long a taker has to fund the escrow or supply an address.
    #[serde(default = "default_payment_window_secs")]
    pub payment_window_secs: u64,

    /// How long a funded trade may stay open before operators are alerted.
    #[serde(default = "default_trade_window_secs")]
    pub trade_window_secs: u64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            payment_window_secs: default_payment_window_secs(),
            trade_window_secs: default_trade_window_secs(),
        }
    }
}

impl ExpiryConfig {
    fn cutoff(now: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
        i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn payment_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Self::cutoff(now, self.payment_window_secs)
    }

    pub fn trade_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Self::cutoff(now, self.trade_window_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub republished: usize,
    pub admin_warned: usize,
    pub failed: usize,
}

pub struct ExpirySweeper {
    ctx: LifecycleContext,
    config: ExpiryConfig,
    lock: Arc<GlobalOrdersLock>,
}

impl ExpirySweeper {
    pub fn new(ctx: LifecycleContext, config: ExpiryConfig, lock: Arc<GlobalOrdersLock>) -> Self {
        Self { ctx, config, lock }
    }

    /// One sweep evaluated at `now`. `Ok(None)` when the lock was busy.
    pub async fn run_expiry_sweep(&self, now: DateTime<Utc>) -> JobResult<Option<SweepReport>> {
        let Some(_guard) = self.lock.try_guard() else {
            Metrics::pass_skipped(JOB);
            debug!("Expiry sweep skipped, orders lock held");
            return Ok(None);
        };
        let started = Instant::now();
        let mut report = SweepReport::default();

        let stale = self
            .ctx
            .orders
            .find(
                &OrderFilter::with_statuses([
                    OrderStatus::WaitingPayment,
                    OrderStatus::WaitingBuyerAddress,
                ])
                .taken_before(self.config.payment_cutoff(now)),
            )
            .await?;
        for order in stale {
            let id = order.id;
            match republish(&self.ctx, order, ExitCause::Expired, now).await {
                Ok(_) => report.republished += 1,
                Err(e) => {
                    report.failed += 1;
                    Metrics::order_failure(JOB);
                    warn!(order_id = %id, error = %e, "Failed to expire waiting order");
                }
            }
        }

        let overdue = self
            .ctx
            .orders
            .find(
                &OrderFilter::with_statuses([OrderStatus::Active, OrderStatus::FiatSent])
                    .admin_warned(false)
                    .tokens_held_before(self.config.trade_cutoff(now)),
            )
            .await?;
        for order in overdue {
            let id = order.id;
            match self.warn_admins(order).await {
                Ok(()) => report.admin_warned += 1,
                Err(e) => {
                    report.failed += 1;
                    Metrics::order_failure(JOB);
                    warn!(order_id = %id, error = %e, "Failed to flag overdue trade");
                }
            }
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        Metrics::pass_run(JOB, elapsed_ms);
        if report != SweepReport::default() {
            info!(
                republished = report.republished,
                admin_warned = report.admin_warned,
                failed = report.failed,
                elapsed_ms,
                "Expiry sweep complete"
            );
        }
        Ok(Some(report))
    }

    /// Flag an overdue funded trade. Funds are locked on-chain, so the order
    /// is never canceled here; operators decide.
    async fn warn_admins(&self, mut order: Order) -> JobResult<()> {
        order.admin_warned = true;
        let order = self.ctx.save(&order, order.status).await?;
        warn!(
            order_id = %order.id,
            status = %order.status,
            tokens_held_at = ?order.tokens_held_at,
            "Trade window expired, operators alerted"
        );

        let params = order_params(&order);
        for party in [order.buyer_id.as_ref(), order.seller_id.as_ref()] {
            self.ctx
                .notify_party(party, Template::TradeWindowExpired, &params)
                .await;
        }
        Metrics::operator_alert("trade_window");
        self.ctx
            .notify_admins(Template::TradeWindowAlert, &params)
            .await;
        Ok(())
    }
}
