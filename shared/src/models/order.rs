//! Order Model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 订单状态
///
/// ```text
/// WAIT_PAYMENT ──► PAID ──────► RELEASED
///      │            │              ▲
///      │            ▼              │
///      │         DISPUTE ──────────┘
///      │            │
///      ▼            │
///  CANCELLED ◄──────┘
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    WaitPayment,
    Paid,
    Released,
    Dispute,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::WaitPayment,
        OrderStatus::Paid,
        OrderStatus::Released,
        OrderStatus::Dispute,
        OrderStatus::Cancelled,
    ];

    /// RELEASED and CANCELLED never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Released | OrderStatus::Cancelled)
    }

    /// Statuses reachable in one step
    pub fn successors(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::WaitPayment => &[OrderStatus::Paid, OrderStatus::Cancelled],
            OrderStatus::Paid => &[OrderStatus::Released, OrderStatus::Dispute],
            OrderStatus::Dispute => &[OrderStatus::Released, OrderStatus::Cancelled],
            OrderStatus::Released | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.successors().contains(&next)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::WaitPayment => "WAIT_PAYMENT",
            OrderStatus::Paid => "PAID",
            OrderStatus::Released => "RELEASED",
            OrderStatus::Dispute => "DISPUTE",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions a party can take on an order, as exposed to the UI
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum OrderAction {
    MarkPaid,
    Cancel,
    Dispute,
    Release,
    Resolve,
}

impl OrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::MarkPaid => "markPaid",
            OrderAction::Cancel => "cancel",
            OrderAction::Dispute => "dispute",
            OrderAction::Release => "release",
            OrderAction::Resolve => "resolve",
        }
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order entity (一笔交易)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub offer_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    /// 下单方
    pub author_id: String,
    /// 挂单方，买卖双方中与 author 相对的一方
    pub offer_owner_id: String,
    pub from_asset_id: String,
    pub to_asset_id: String,
    pub amount: Decimal,
    pub price: Decimal,
    pub client_payment_method_id: Option<String>,
    pub status: OrderStatus,
    pub is_escrow: bool,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub dispute_opened_at: Option<DateTime<Utc>>,
    pub dispute_reason: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether `client_id` is the author or the offer owner
    pub fn is_party(&self, client_id: &str) -> bool {
        self.author_id == client_id || self.offer_owner_id == client_id
    }

    /// Stamp the fields that belong to the target status.
    ///
    /// Graph validity is not checked here; callers only apply changes
    /// that passed the compare-and-set on the expected source status.
    pub fn apply(&mut self, change: &StatusChange) {
        match change.to {
            OrderStatus::Paid => self.paid_at = Some(change.paid_at.unwrap_or(change.at)),
            OrderStatus::Released => self.released_at = Some(change.at),
            OrderStatus::Dispute => {
                self.dispute_opened_at = Some(change.at);
                self.dispute_reason = change.reason.clone();
            }
            OrderStatus::Cancelled => self.cancel_reason = change.reason.clone(),
            OrderStatus::WaitPayment => {}
        }
        self.status = change.to;
        self.updated_at = change.at;
    }
}

/// A requested status change, applied under compare-and-set
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub to: OrderStatus,
    pub at: DateTime<Utc>,
    pub reason: Option<String>,
    /// Client-reported payment time (MarkPaid only)
    pub paid_at: Option<DateTime<Utc>>,
}

impl StatusChange {
    pub fn new(to: OrderStatus, at: DateTime<Utc>) -> Self {
        Self {
            to,
            at,
            reason: None,
            paid_at: None,
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason.filter(|r| !r.trim().is_empty());
        self
    }

    pub fn with_paid_at(mut self, paid_at: Option<DateTime<Utc>>) -> Self {
        self.paid_at = paid_at;
        self
    }
}

/// Create order payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreate {
    pub offer_id: String,
    pub amount: Decimal,
    #[serde(default)]
    pub client_payment_method_id: Option<String>,
}

/// Dispute resolution payload (`result` is `RELEASED` or `CANCELLED`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeResolve {
    pub result: OrderStatus,
    #[serde(default)]
    pub comment: Option<String>,
}
