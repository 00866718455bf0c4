//! Shared setup for integration tests
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use shared::models::{
    Asset, AssetKind, Client, ClientPaymentMethod, Country, Offer, OfferKind, Order, OrderCreate,
    OrderStatus, PaymentMethod,
};
use trade_server::chat::MemoryChatCache;
use trade_server::escrow::{EscrowLedger, LedgerError};
use trade_server::{Config, ManualClock, ServerState, Storage};

pub const ARBITER: &str = "judge";
pub const BUYER: &str = "alice";
pub const SELLER: &str = "bob";
pub const OUTSIDER: &str = "carol";
pub const OFFER_ID: &str = "offer-1";

/// Ledger that records every call as `"<op>:<order_id>"`
#[derive(Default)]
pub struct RecordingLedger {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingLedger {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl EscrowLedger for RecordingLedger {
    async fn reserve(&self, order: &Order) -> Result<(), LedgerError> {
        self.calls.lock().push(format!("reserve:{}", order.id));
        Ok(())
    }

    async fn payout(&self, order: &Order) -> Result<(), LedgerError> {
        self.calls.lock().push(format!("payout:{}", order.id));
        Ok(())
    }

    async fn refund(&self, order: &Order) -> Result<(), LedgerError> {
        self.calls.lock().push(format!("refund:{}", order.id));
        Ok(())
    }
}

pub struct World {
    pub state: ServerState,
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<RecordingLedger>,
}

impl World {
    pub fn storage(&self) -> &Storage {
        &self.state.storage
    }

    pub fn now(&self) -> DateTime<Utc> {
        use trade_server::Clock;
        self.clock.now()
    }

    /// alice orders 100 USDT from bob's sell offer
    pub async fn place_order(&self) -> Order {
        self.state
            .orders
            .create_order(
                BUYER,
                OrderCreate {
                    offer_id: OFFER_ID.into(),
                    amount: Decimal::new(100, 0),
                    client_payment_method_id: Some("pm-alice".into()),
                },
            )
            .await
            .expect("create order")
            .order
    }

    pub fn status_of(&self, order_id: &str) -> OrderStatus {
        self.storage()
            .get_order(order_id)
            .unwrap()
            .expect("order exists")
            .status
    }

    pub fn notification_count(&self, client_id: &str) -> usize {
        self.state
            .notifications
            .list(client_id, 100, 0)
            .unwrap()
            .len()
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn test_config() -> Config {
    let mut config = Config::with_overrides("/tmp/trade-server-tests", 0);
    config.arbiter_ids = HashSet::from([ARBITER.to_string()]);
    config
}

pub fn world() -> World {
    world_with(test_config())
}

pub fn world_with(config: Config) -> World {
    let now = start_time();
    let storage = Storage::open_in_memory().unwrap();
    seed(&storage, now);

    let clock = Arc::new(ManualClock::new(now));
    let ledger = Arc::new(RecordingLedger::default());
    let cache = Arc::new(MemoryChatCache::new(config.chat_cache_limit));
    let state = ServerState::assemble(config, storage, clock.clone(), ledger.clone(), cache);
    World {
        state,
        clock,
        ledger,
    }
}

pub fn sell_offer(id: &str, owner: &str, now: DateTime<Utc>) -> Offer {
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

fn seed(storage: &Storage, now: DateTime<Utc>) {
    for id in [BUYER, SELLER, OUTSIDER, ARBITER] {
        storage
            .put_client(&Client {
                id: id.into(),
                username: format!("{id}_user"),
            })
            .unwrap();
    }
    for (id, kind) in [("usdt", AssetKind::Crypto), ("eur", AssetKind::Fiat)] {
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
            client_id: BUYER.into(),
            name: "Alice SEPA".into(),
            details: None,
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
    storage.insert_offer(&sell_offer(OFFER_ID, SELLER, now)).unwrap();
}
