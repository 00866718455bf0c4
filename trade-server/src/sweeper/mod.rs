//! 订单过期清扫
//!
//! 周期性扫描已过截止时间的订单：
//!
//! | 当前状态 | 目标状态 | 原因 |
//! |----------|----------|------|
//! | WAIT_PAYMENT | CANCELLED | `expired` |
//! | PAID | DISPUTE | `expired` |
//!
//! DISPUTE 订单不在扫描范围内。每个转换都走 [`OrderService::apply_transition`]，
//! 与用户操作共用同一次 compare-and-set，输掉竞争的一方计为 conflict。
//!
//! 停止时先发出取消信号，再等待正在执行的一轮扫描结束。

use crate::orders::OrderService;
use crate::utils::{TradeError, TradeResult};
use shared::models::{Order, OrderStatus, StatusChange};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub const EXPIRED_REASON: &str = "expired";

/// Outcome of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub cancelled: usize,
    pub disputed: usize,
    /// Someone else moved the order first
    pub conflicts: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn applied(&self) -> usize {
        self.cancelled + self.disputed
    }
}

pub struct ExpirySweeper {
    orders: Arc<OrderService>,
    interval: Duration,
    batch: usize,
}

impl ExpirySweeper {
    pub fn new(orders: Arc<OrderService>, interval: Duration, batch: usize) -> Self {
        Self {
            orders,
            interval,
            batch: batch.max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Orders past their deadline, earliest first
    pub fn collect_due(&self) -> TradeResult<Vec<Order>> {
        let now = self.orders.clock().now();
        Ok(self.orders.storage().find_expired_orders(now, self.batch)?)
    }

    /// Drive each order to its expiry target; one failure never stops the batch
    pub async fn expire(&self, due: Vec<Order>) -> SweepReport {
        let mut report = SweepReport {
            scanned: due.len(),
            ..Default::default()
        };
        let now = self.orders.clock().now();

        for order in due {
            let target = match order.status {
                OrderStatus::WaitPayment => OrderStatus::Cancelled,
                OrderStatus::Paid => OrderStatus::Dispute,
                _ => continue,
            };
            let change = StatusChange::new(target, now).with_reason(Some(EXPIRED_REASON.into()));

            match self
                .orders
                .apply_transition(&order.id, order.status, change)
                .await
            {
                Ok(_) if target == OrderStatus::Cancelled => report.cancelled += 1,
                Ok(_) => report.disputed += 1,
                Err(TradeError::Conflict(_)) => {
                    tracing::debug!(order_id = %order.id, "Order moved before expiry applied");
                    report.conflicts += 1;
                }
                Err(e) => {
                    tracing::warn!(order_id = %order.id, error = %e, "Failed to expire order");
                    report.failed += 1;
                }
            }
        }
        report
    }

    pub async fn run_once(&self) -> SweepReport {
        let due = match self.collect_due() {
            Ok(due) => due,
            Err(e) => {
                tracing::warn!(error = %e, "Expiry scan failed");
                return SweepReport::default();
            }
        };
        let report = self.expire(due).await;
        if report.applied() > 0 || report.failed > 0 {
            tracing::info!(
                scanned = report.scanned,
                cancelled = report.cancelled,
                disputed = report.disputed,
                conflicts = report.conflicts,
                failed = report.failed,
                "Expiry pass finished"
            );
        } else {
            tracing::debug!(scanned = report.scanned, "Expiry pass idle");
        }
        report
    }

    /// Periodic loop; a pass in progress is never interrupted by `shutdown`
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, batch = self.batch, "Order expirer started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.run_once().await;
        }
        tracing::info!("Order expirer stopped");
    }

    /// Spawn [`run`](Self::run) with its own stop token
    pub fn start(self: Arc<Self>) -> SweeperHandle {
        let token = CancellationToken::new();
        let handle = tokio::spawn(self.run(token.clone()));
        SweeperHandle { token, handle }
    }
}

/// Running sweeper
pub struct SweeperHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal stop and wait for the in-flight pass to finish
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!(error = ?e, "Order expirer task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
