//! Offer Model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 挂单方向：owner 买入还是卖出 from_asset
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OfferKind {
    Buy,
    Sell,
}

/// Offer entity (挂单)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: String,
    pub owner_id: String,
    pub kind: OfferKind,
    pub from_asset_id: String,
    pub to_asset_id: String,
    pub amount: Decimal,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub price: Decimal,
    pub conditions: Option<String>,
    /// Minutes a new order has before it expires
    pub order_expiration_timeout: i64,
    pub is_enabled: bool,
    pub enabled_at: Option<DateTime<Utc>>,
    pub disabled_at: Option<DateTime<Utc>>,
    /// Listing expiry
    pub ttl: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    /// Enabled and not past its TTL
    pub fn is_listed(&self, now: DateTime<Utc>) -> bool {
        self.is_enabled && self.ttl > now
    }

    pub fn accepts_amount(&self, amount: Decimal) -> bool {
        amount >= self.min_amount && amount <= self.max_amount
    }

    pub fn matches(&self, filter: &OfferFilter) -> bool {
        filter
            .from_asset_id
            .as_deref()
            .is_none_or(|id| id == self.from_asset_id)
            && filter
                .to_asset_id
                .as_deref()
                .is_none_or(|id| id == self.to_asset_id)
            && filter.kind.is_none_or(|k| k == self.kind)
            && filter.min_amount.is_none_or(|v| self.max_amount >= v)
            && filter.max_amount.is_none_or(|v| self.min_amount <= v)
    }
}

/// Create offer payload; an update replaces the same fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferCreate {
    pub kind: OfferKind,
    pub from_asset_id: String,
    pub to_asset_id: String,
    pub amount: Decimal,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub price: Decimal,
    #[serde(default)]
    pub conditions: Option<String>,
    #[serde(default)]
    pub order_expiration_timeout: Option<i64>,
}

/// Browse filter; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferFilter {
    pub from_asset_id: Option<String>,
    pub to_asset_id: Option<String>,
    pub kind: Option<OfferKind>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

/// Owner's own offers; `enabled` narrows to enabled or disabled ones
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OwnOffersQuery {
    pub enabled: Option<bool>,
}

/// Public offer feed event
///
/// Serialized as `{"type": "created" | "updated" | "deleted", "offer": {...}}`.
/// The feed mirrors the listing: an offer enters it with `created` when
/// enabled and leaves it with `deleted` when disabled or removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OfferEvent {
    Created { offer: Box<Offer> },
    Updated { offer: Box<Offer> },
    Deleted { offer: Box<Offer> },
}

impl OfferEvent {
    pub fn offer(&self) -> &Offer {
        match self {
            Self::Created { offer } | Self::Updated { offer } | Self::Deleted { offer } => offer,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Deleted { .. } => "deleted",
        }
    }
}
