//! Seed data shared by unit tests

use super::Storage;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use shared::models::{
    Asset, AssetKind, Client, ClientPaymentMethod, Country, Offer, OfferKind, Order, OrderStatus,
    PaymentMethod,
};

pub(crate) fn client(id: &str) -> Client {
    Client {
        id: id.to_string(),
        username: format!("{id}_user"),
    }
}

pub(crate) fn offer_fixture(id: &str, owner: &str, now: DateTime<Utc>) -> Offer {
    Offer {
        id: id.to_string(),
        owner_id: owner.to_string(),
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
    }
}

/// alice buys from bob's sell offer `offer-1`
pub(crate) fn order_fixture(id: &str, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Order {
    Order {
        id: id.to_string(),
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
        status: OrderStatus::WaitPayment,
        is_escrow: true,
        expires_at,
        paid_at: None,
        released_at: None,
        dispute_opened_at: None,
        dispute_reason: None,
        cancel_reason: None,
        created_at: now,
        updated_at: now,
    }
}

/// Clients alice, bob, carol and judge; assets usdt, eur, usd; bob's listed `offer-1`;
/// alice's payment method `pm-alice`
pub(crate) fn seed_world(storage: &Storage, now: DateTime<Utc>) {
    for id in ["alice", "bob", "carol", "judge"] {
        storage.put_client(&client(id)).unwrap();
    }
    for (id, kind) in [
        ("usdt", AssetKind::Crypto),
        ("eur", AssetKind::Fiat),
        ("usd", AssetKind::Fiat),
    ] {
        storage
            .put_asset(&Asset {
                id: id.into(),
                name: id.to_uppercase(),
                kind,
            })
            .unwrap();
    }
    storage
        .put_payment_method(&ClientPaymentMethod {
            id: "pm-alice".into(),
            client_id: "alice".into(),
            name: "Alice SEPA".into(),
            details: Some("DE89 3704 0044 0532 0130 00".into()),
            country: Country {
                id: "de".into(),
                name: "Germany".into(),
            },
            payment_method: PaymentMethod {
                id: "sepa".into(),
                name: "SEPA".into(),
            },
        })
        .unwrap();
    storage
        .insert_offer(&offer_fixture("offer-1", "bob", now))
        .unwrap();
}
