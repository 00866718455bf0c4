//! Escrow ledger hook
//!
//! Funds for escrow orders (either asset non-fiat) live in an external
//! ledger. The engine calls it at three points:
//!
//! | When | Call |
//! |------|------|
//! | escrow order created | [`EscrowLedger::reserve`] |
//! | escrow order reaches RELEASED | [`EscrowLedger::payout`] |
//! | escrow order reaches CANCELLED | [`EscrowLedger::refund`] |
//!
//! Calls happen after the order row is committed. A ledger failure is
//! logged and never rolls back the order; reconciliation belongs to the
//! ledger.

use async_trait::async_trait;
use shared::models::{Order, OrderStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait EscrowLedger: Send + Sync {
    /// Hold the seller's funds for the order
    async fn reserve(&self, order: &Order) -> Result<(), LedgerError>;

    /// Move held funds to the buyer
    async fn payout(&self, order: &Order) -> Result<(), LedgerError>;

    /// Return held funds to the seller
    async fn refund(&self, order: &Order) -> Result<(), LedgerError>;
}

/// Ledger that only records movements in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingLedger;

#[async_trait]
impl EscrowLedger for LoggingLedger {
    async fn reserve(&self, order: &Order) -> Result<(), LedgerError> {
        tracing::info!(order_id = %order.id, seller = %order.seller_id, amount = %order.amount, asset = %order.from_asset_id, "Escrow reserve");
        Ok(())
    }

    async fn payout(&self, order: &Order) -> Result<(), LedgerError> {
        tracing::info!(order_id = %order.id, buyer = %order.buyer_id, amount = %order.amount, asset = %order.from_asset_id, "Escrow payout");
        Ok(())
    }

    async fn refund(&self, order: &Order) -> Result<(), LedgerError> {
        tracing::info!(order_id = %order.id, seller = %order.seller_id, amount = %order.amount, asset = %order.from_asset_id, "Escrow refund");
        Ok(())
    }
}

/// Run the terminal-state hook for an escrow order, if any
pub(crate) async fn settle(ledger: &dyn EscrowLedger, order: &Order) {
    if !order.is_escrow {
        return;
    }
    let result = match order.status {
        OrderStatus::Released => ledger.payout(order).await,
        OrderStatus::Cancelled => ledger.refund(order).await,
        _ => return,
    };
    if let Err(e) = result {
        tracing::error!(order_id = %order.id, status = %order.status, error = %e, "Escrow settlement failed");
    }
}

/// Reserve funds for a freshly created escrow order
pub(crate) async fn reserve(ledger: &dyn EscrowLedger, order: &Order) {
    if !order.is_escrow {
        return;
    }
    if let Err(e) = ledger.reserve(order).await {
        tracing::error!(order_id = %order.id, error = %e, "Escrow reserve failed");
    }
}
