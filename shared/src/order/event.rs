//! Order stream events

use super::OrderView;
use serde::{Deserialize, Serialize};

pub const ORDER_STATUS_CHANGED: &str = "order.status_changed";
pub const ORDER_CREATED: &str = "order.created";

/// Events pushed on the order status stream and the creation stream.
///
/// Serialized as `{"type": "...", "order": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum OrderStreamEvent {
    #[serde(rename = "order.status_changed")]
    StatusChanged { order: Box<OrderView> },
    #[serde(rename = "order.created")]
    Created { order: Box<OrderView> },
}

impl OrderStreamEvent {
    pub fn status_changed(order: OrderView) -> Self {
        Self::StatusChanged {
            order: Box::new(order),
        }
    }

    pub fn created(order: OrderView) -> Self {
        Self::Created {
            order: Box::new(order),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StatusChanged { .. } => ORDER_STATUS_CHANGED,
            Self::Created { .. } => ORDER_CREATED,
        }
    }

    pub fn order(&self) -> &OrderView {
        match self {
            Self::StatusChanged { order } | Self::Created { order } => order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    fn client(id: &str) -> Client {
        Client {
            id: id.into(),
            username: id.into(),
        }
    }

    fn sample_view() -> OrderView {
        let now = Utc::now();
        OrderView {
            order: Order {
                id: "ord-1".into(),
                offer_id: "offer-1".into(),
                buyer_id: "alice".into(),
                seller_id: "bob".into(),
                author_id: "alice".into(),
                offer_owner_id: "bob".into(),
                from_asset_id: "usdt".into(),
                to_asset_id: "eur".into(),
                amount: Decimal::new(100, 0),
                price: Decimal::new(92, 2),
                client_payment_method_id: None,
                status: OrderStatus::Paid,
                is_escrow: true,
                expires_at: now + Duration::minutes(15),
                paid_at: Some(now),
                released_at: None,
                dispute_opened_at: None,
                dispute_reason: None,
                cancel_reason: None,
                created_at: now,
                updated_at: now,
            },
            offer: Some(Offer {
                id: "offer-1".into(),
                owner_id: "bob".into(),
                kind: OfferKind::Sell,
                from_asset_id: "usdt".into(),
                to_asset_id: "eur".into(),
                amount: Decimal::new(1000, 0),
                min_amount: Decimal::new(10, 0),
                max_amount: Decimal::new(500, 0),
                price: Decimal::new(92, 2),
                conditions: None,
                order_expiration_timeout: 15,
                is_enabled: true,
                enabled_at: Some(now),
                disabled_at: None,
                ttl: now + Duration::days(30),
                created_at: now,
                updated_at: now,
            }),
            buyer: Some(client("alice")),
            seller: Some(client("bob")),
            author: Some(client("alice")),
            offer_owner: Some(client("bob")),
            from_asset: Some(Asset {
                id: "usdt".into(),
                name: "USDT".into(),
                kind: AssetKind::Crypto,
            }),
            to_asset: Some(Asset {
                id: "eur".into(),
                name: "EUR".into(),
                kind: AssetKind::Fiat,
            }),
            client_payment_method: None,
        }
    }

    #[test]
    fn test_status_event_shape() {
        let event = OrderStreamEvent::status_changed(sample_view());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "order.status_changed");
        assert_eq!(json["order"]["status"], "PAID");
        assert_eq!(json["order"]["id"], "ord-1");
        assert_eq!(json["order"]["offerOwner"]["id"], "bob");
        assert_eq!(json["order"]["fromAsset"]["kind"], "crypto");
    }

    #[test]
    fn test_created_event_type() {
        let event = OrderStreamEvent::created(sample_view());
        assert_eq!(event.event_type(), ORDER_CREATED);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "order.created");
    }

    #[test]
    fn test_bare_view_keeps_order_fields() {
        let view = OrderView::bare(sample_view().order);
        assert!(!view.is_complete());
        let json = serde_json::to_value(OrderStreamEvent::status_changed(view)).unwrap();
        assert_eq!(json["order"]["status"], "PAID");
        assert!(json["order"]["buyer"].is_null());
        assert!(sample_view().is_complete());
    }
}
