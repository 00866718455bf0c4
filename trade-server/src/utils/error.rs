//! Service-layer error
//!
//! Every service operation returns [`TradeError`]. The HTTP layer converts it
//! into [`shared::error::AppError`] in exactly one place (`From` below).

use crate::store::StorageError;
use shared::error::AppError;
use shared::models::OrderStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("{0} not found")]
    NotFound(String),

    /// Role or ownership violation
    #[error("{0}")]
    Forbidden(String),

    /// Status or state precondition failed
    #[error("{0}")]
    InvalidState(String),

    /// A concurrent writer already changed the row
    #[error("{0}")]
    Conflict(String),

    /// Malformed input
    #[error("{0}")]
    Validation(String),

    /// Store or cache unreachable
    #[error("{0}")]
    Unavailable(String),
}

pub type TradeResult<T> = Result<T, TradeError>;

impl TradeError {
    pub fn order_not_found(order_id: &str) -> Self {
        Self::NotFound(format!("Order {order_id}"))
    }

    pub fn not_a_party() -> Self {
        Self::Forbidden("not a party to this order".to_string())
    }

    pub fn unexpected_status(actual: OrderStatus, expected: OrderStatus) -> Self {
        Self::InvalidState(format!("order is {actual}, expected {expected}"))
    }

    pub fn status_changed(order_id: &str) -> Self {
        Self::Conflict(format!("order {order_id} status changed concurrently"))
    }
}

impl From<StorageError> for TradeError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "Storage failure");
        Self::Unavailable(err.to_string())
    }
}

impl From<TradeError> for AppError {
    fn from(err: TradeError) -> Self {
        match err {
            TradeError::NotFound(resource) => AppError::not_found(resource),
            TradeError::Forbidden(msg) => AppError::forbidden(msg),
            TradeError::InvalidState(msg) => AppError::invalid_state(msg),
            TradeError::Conflict(msg) => AppError::conflict(msg),
            TradeError::Validation(msg) => AppError::validation(msg),
            TradeError::Unavailable(msg) => AppError::unavailable(msg),
        }
    }
}
