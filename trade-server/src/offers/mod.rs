//! Offer lifecycle
//!
//! Offers are created disabled. Enabling lists an offer for 30 days, subject
//! to the owner's active-offer quota; disabling pulls it from listings at
//! once by moving its TTL to now. Orders are never touched here.
//!
//! Listing changes go out on the public [`OfferFeed`]: `created` on enable,
//! `updated` when a listed offer is edited, `deleted` when a listed offer is
//! disabled or removed. Unlisted offers are invisible to the feed.

use crate::broadcast::{OfferFeed, Subscription};
use crate::store::{DeleteOutcome, EnableOutcome, Storage};
use crate::utils::{Clock, TradeError, TradeResult};
use chrono::Duration;
use rust_decimal::Decimal;
use shared::models::{Offer, OfferCreate, OfferEvent, OfferFilter, OwnOffersQuery};
use std::sync::Arc;

/// Listing lifetime granted by each enable
pub const LISTING_TTL_DAYS: i64 = 30;

/// Shortest order expiration an offer may set, in minutes; shorter requests are raised to it
pub const MIN_ORDER_TIMEOUT_MINUTES: i64 = 15;

/// Longest order expiration an offer may set, in minutes (7 days)
pub const MAX_ORDER_TIMEOUT_MINUTES: i64 = 7 * 24 * 60;

pub struct OfferService {
    storage: Storage,
    clock: Arc<dyn Clock>,
    max_active: usize,
    feed: OfferFeed,
}

impl OfferService {
    pub fn new(storage: Storage, clock: Arc<dyn Clock>, max_active: usize) -> Self {
        Self {
            storage,
            clock,
            max_active,
            feed: OfferFeed::new(),
        }
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    /// Check a create/update payload; returns the effective order timeout
    fn validate(&self, request: &OfferCreate) -> TradeResult<i64> {
        if request.from_asset_id == request.to_asset_id {
            return Err(TradeError::Validation("assets must differ".into()));
        }
        for asset_id in [&request.from_asset_id, &request.to_asset_id] {
            if self.storage.get_asset(asset_id)?.is_none() {
                return Err(TradeError::Validation(format!("unknown asset {asset_id}")));
            }
        }
        if request.amount <= Decimal::ZERO
            || request.min_amount <= Decimal::ZERO
            || request.max_amount <= Decimal::ZERO
        {
            return Err(TradeError::Validation("amounts must be positive".into()));
        }
        if request.min_amount > request.max_amount {
            return Err(TradeError::Validation(
                "minAmount must not exceed maxAmount".into(),
            ));
        }
        if request.price <= Decimal::ZERO {
            return Err(TradeError::Validation("price must be positive".into()));
        }

        let timeout = request
            .order_expiration_timeout
            .unwrap_or(MIN_ORDER_TIMEOUT_MINUTES)
            .max(MIN_ORDER_TIMEOUT_MINUTES);
        if timeout > MAX_ORDER_TIMEOUT_MINUTES {
            return Err(TradeError::Validation(format!(
                "orderExpirationTimeout must not exceed {MAX_ORDER_TIMEOUT_MINUTES} minutes"
            )));
        }
        Ok(timeout)
    }

    pub fn create_offer(&self, owner_id: &str, request: OfferCreate) -> TradeResult<Offer> {
        let timeout = self.validate(&request)?;

        let now = self.clock.now();
        let offer = Offer {
            id: shared::util::new_id(),
            owner_id: owner_id.to_string(),
            kind: request.kind,
            from_asset_id: request.from_asset_id,
            to_asset_id: request.to_asset_id,
            amount: request.amount,
            min_amount: request.min_amount,
            max_amount: request.max_amount,
            price: request.price,
            conditions: request.conditions.filter(|c| !c.trim().is_empty()),
            order_expiration_timeout: timeout,
            is_enabled: false,
            enabled_at: None,
            disabled_at: None,
            ttl: now,
            created_at: now,
            updated_at: now,
        };
        self.storage.insert_offer(&offer)?;
        tracing::info!(offer_id = %offer.id, owner = %owner_id, kind = ?offer.kind, "Offer created");
        Ok(offer)
    }

    /// Replace the trading terms; activation state and TTL are kept
    pub fn update_offer(
        &self,
        owner_id: &str,
        offer_id: &str,
        request: OfferCreate,
    ) -> TradeResult<Offer> {
        let timeout = self.validate(&request)?;
        let now = self.clock.now();
        let offer = self
            .storage
            .update_offer(offer_id, owner_id, |offer| {
                offer.kind = request.kind;
                offer.from_asset_id = request.from_asset_id;
                offer.to_asset_id = request.to_asset_id;
                offer.amount = request.amount;
                offer.min_amount = request.min_amount;
                offer.max_amount = request.max_amount;
                offer.price = request.price;
                offer.conditions = request.conditions.filter(|c| !c.trim().is_empty());
                offer.order_expiration_timeout = timeout;
                offer.updated_at = now;
            })?
            .ok_or_else(|| TradeError::NotFound(format!("Offer {offer_id}")))?;

        tracing::info!(offer_id = %offer_id, owner = %owner_id, "Offer updated");
        if offer.is_listed(now) {
            self.feed.updated(&offer);
        }
        Ok(offer)
    }

    /// Remove an offer no order refers to
    pub fn delete_offer(&self, owner_id: &str, offer_id: &str) -> TradeResult<Offer> {
        match self.storage.delete_offer(offer_id, owner_id)? {
            DeleteOutcome::Deleted(offer) => {
                tracing::info!(offer_id = %offer_id, owner = %owner_id, "Offer deleted");
                if offer.is_listed(self.clock.now()) {
                    self.feed.deleted(&offer);
                }
                Ok(offer)
            }
            DeleteOutcome::Missing => Err(TradeError::NotFound(format!("Offer {offer_id}"))),
            DeleteOutcome::Referenced { orders } => Err(TradeError::InvalidState(format!(
                "offer has {orders} order(s) and cannot be deleted"
            ))),
        }
    }

    pub fn get_offer(&self, offer_id: &str) -> TradeResult<Offer> {
        self.storage
            .get_offer(offer_id)?
            .ok_or_else(|| TradeError::NotFound(format!("Offer {offer_id}")))
    }

    /// The caller's own offers, listed or not
    pub fn list_own(&self, owner_id: &str, query: &OwnOffersQuery) -> TradeResult<Vec<Offer>> {
        Ok(self.storage.offers_of_owner(owner_id, query.enabled)?)
    }

    pub fn enable(&self, owner_id: &str, offer_id: &str) -> TradeResult<Offer> {
        let now = self.clock.now();
        let ttl = now + Duration::days(LISTING_TTL_DAYS);
        match self
            .storage
            .enable_offer(offer_id, owner_id, now, ttl, self.max_active)?
        {
            EnableOutcome::Updated(offer) => {
                tracing::info!(offer_id = %offer_id, owner = %owner_id, ttl = %offer.ttl, "Offer enabled");
                self.feed.created(&offer);
                Ok(offer)
            }
            EnableOutcome::Missing => Err(TradeError::NotFound(format!("Offer {offer_id}"))),
            EnableOutcome::Unchanged => {
                Err(TradeError::InvalidState("offer is already enabled".into()))
            }
            EnableOutcome::QuotaReached { active } => {
                tracing::debug!(owner = %owner_id, active, max = self.max_active, "Offer quota reached");
                Err(TradeError::InvalidState(format!(
                    "max active offers reached ({active}/{})",
                    self.max_active
                )))
            }
        }
    }

    /// Pull the offer from listings; disabling a disabled offer is allowed
    pub fn disable(&self, owner_id: &str, offer_id: &str) -> TradeResult<Offer> {
        let (offer, was_listed) = self
            .storage
            .disable_offer(offer_id, owner_id, self.clock.now())?
            .ok_or_else(|| TradeError::NotFound(format!("Offer {offer_id}")))?;

        tracing::info!(offer_id = %offer_id, owner = %owner_id, was_listed, "Offer disabled");
        if was_listed {
            self.feed.deleted(&offer);
        }
        Ok(offer)
    }

    /// Public listing
    pub fn browse(&self, filter: &OfferFilter) -> TradeResult<Vec<Offer>> {
        Ok(self.storage.listed_offers(filter, self.clock.now())?)
    }

    pub fn subscribe_feed(&self) -> Subscription<Arc<OfferEvent>> {
        self.feed.subscribe()
    }

    pub fn feed_subscribers(&self) -> usize {
        self.feed.total_subscribers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::seed_world;
    use crate::utils::ManualClock;
    use chrono::Utc;
    use shared::models::OfferKind;

    fn request() -> OfferCreate {
        OfferCreate {
            kind: OfferKind::Sell,
            from_asset_id: "usdt".into(),
            to_asset_id: "usd".into(),
            amount: Decimal::new(100, 0),
            min_amount: Decimal::new(10, 0),
            max_amount: Decimal::new(100, 0),
            price: Decimal::new(1, 0),
            conditions: None,
            order_expiration_timeout: Some(5),
        }
    }

    fn service(max_active: usize) -> (OfferService, Arc<ManualClock>) {
        let storage = Storage::open_in_memory().unwrap();
        let now = Utc::now();
        seed_world(&storage, now);
        let clock = Arc::new(ManualClock::new(now));
        (OfferService::new(storage, clock.clone(), max_active), clock)
    }

    #[test]
    fn test_new_offer_starts_disabled() {
        let (offers, _) = service(3);
        let offer = offers.create_offer("carol", request()).unwrap();
        assert!(!offer.is_enabled);
        assert_eq!(offer.order_expiration_timeout, MIN_ORDER_TIMEOUT_MINUTES);
        assert!(offers.browse(&OfferFilter::default()).unwrap().iter().all(|o| o.id != offer.id));
    }

    #[test]
    fn test_quota_of_one() {
        let (offers, clock) = service(1);
        let first = offers.create_offer("carol", request()).unwrap();
        let second = offers.create_offer("carol", request()).unwrap();

        let enabled = offers.enable("carol", &first.id).unwrap();
        assert_eq!(enabled.ttl, clock.now() + Duration::days(LISTING_TTL_DAYS));
        assert!(matches!(
            offers.enable("carol", &second.id),
            Err(TradeError::InvalidState(_))
        ));

        offers.disable("carol", &first.id).unwrap();
        offers.enable("carol", &second.id).unwrap();
    }

    #[test]
    fn test_enable_twice_and_foreign_offer() {
        let (offers, _) = service(3);
        let offer = offers.create_offer("carol", request()).unwrap();
        offers.enable("carol", &offer.id).unwrap();
        assert!(matches!(
            offers.enable("carol", &offer.id),
            Err(TradeError::InvalidState(_))
        ));
        assert!(matches!(
            offers.disable("alice", &offer.id),
            Err(TradeError::NotFound(_))
        ));
        offers.disable("carol", &offer.id).unwrap();
        let again = offers.disable("carol", &offer.id).unwrap();
        assert!(!again.is_enabled);
    }

    #[test]
    fn test_enable_refused_while_enabled_even_after_ttl() {
        let (offers, clock) = service(3);
        let offer = offers.create_offer("carol", request()).unwrap();
        let enabled = offers.enable("carol", &offer.id).unwrap();

        clock.advance(Duration::days(LISTING_TTL_DAYS + 1));
        assert!(matches!(
            offers.enable("carol", &offer.id),
            Err(TradeError::InvalidState(_))
        ));
        assert_eq!(offers.get_offer(&offer.id).unwrap().ttl, enabled.ttl);

        // the owner disables first, then re-lists
        offers.disable("carol", &offer.id).unwrap();
        let relisted = offers.enable("carol", &offer.id).unwrap();
        assert_eq!(relisted.ttl, clock.now() + Duration::days(LISTING_TTL_DAYS));
    }

    #[test]
    fn test_order_timeout_bounds() {
        let (offers, _) = service(3);
        let mut huge = request();
        huge.order_expiration_timeout = Some(i64::MAX);
        assert!(matches!(
            offers.create_offer("carol", huge),
            Err(TradeError::Validation(_))
        ));

        let mut week = request();
        week.order_expiration_timeout = Some(MAX_ORDER_TIMEOUT_MINUTES);
        let offer = offers.create_offer("carol", week).unwrap();
        assert_eq!(offer.order_expiration_timeout, MAX_ORDER_TIMEOUT_MINUTES);

        let mut negative = request();
        negative.order_expiration_timeout = Some(-10);
        let offer = offers.create_offer("carol", negative).unwrap();
        assert_eq!(offer.order_expiration_timeout, MIN_ORDER_TIMEOUT_MINUTES);

        let mut too_long = request();
        too_long.order_expiration_timeout = Some(MAX_ORDER_TIMEOUT_MINUTES + 1);
        assert!(matches!(
            offers.update_offer("carol", &offer.id, too_long),
            Err(TradeError::Validation(_))
        ));
    }

    #[test]
    fn test_feed_follows_listing() {
        let (offers, _) = service(3);
        let mut feed = offers.subscribe_feed();
        let offer = offers.create_offer("carol", request()).unwrap();

        // unlisted edits stay private
        let mut cheaper = request();
        cheaper.price = Decimal::new(2, 0);
        offers.update_offer("carol", &offer.id, cheaper.clone()).unwrap();
        assert!(feed.try_recv().is_none());

        offers.enable("carol", &offer.id).unwrap();
        let created = feed.try_recv().unwrap();
        assert_eq!(created.event_type(), "created");
        assert_eq!(created.offer().id, offer.id);

        cheaper.price = Decimal::new(3, 0);
        offers.update_offer("carol", &offer.id, cheaper).unwrap();
        let updated = feed.try_recv().unwrap();
        assert_eq!(updated.event_type(), "updated");
        assert_eq!(updated.offer().price, Decimal::new(3, 0));

        offers.disable("carol", &offer.id).unwrap();
        assert_eq!(feed.try_recv().unwrap().event_type(), "deleted");

        offers.delete_offer("carol", &offer.id).unwrap();
        assert!(feed.try_recv().is_none());
        assert!(matches!(
            offers.get_offer(&offer.id),
            Err(TradeError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_and_delete_are_owner_only() {
        let (offers, _) = service(3);
        let offer = offers.create_offer("carol", request()).unwrap();
        assert!(matches!(
            offers.update_offer("alice", &offer.id, request()),
            Err(TradeError::NotFound(_))
        ));
        assert!(matches!(
            offers.delete_offer("alice", &offer.id),
            Err(TradeError::NotFound(_))
        ));

        let mut edited = request();
        edited.conditions = Some("SEPA only".into());
        let updated = offers.update_offer("carol", &offer.id, edited).unwrap();
        assert_eq!(updated.conditions.as_deref(), Some("SEPA only"));
        assert!(!updated.is_enabled);
        assert_eq!(updated.created_at, offer.created_at);

        let own = offers.list_own("carol", &OwnOffersQuery::default()).unwrap();
        assert_eq!(own.len(), 1);
        let enabled_only = OwnOffersQuery {
            enabled: Some(true),
        };
        assert!(offers.list_own("carol", &enabled_only).unwrap().is_empty());
    }

    #[test]
    fn test_delete_refused_with_orders() {
        let (offers, clock) = service(3);
        let now = clock.now();
        offers
            .storage
            .insert_order(&crate::store::fixtures::order_fixture(
                "ord-1",
                now,
                now + Duration::minutes(15),
            ))
            .unwrap();
        assert!(matches!(
            offers.delete_offer("bob", "offer-1"),
            Err(TradeError::InvalidState(_))
        ));
        assert!(offers.get_offer("offer-1").is_ok());
    }

    #[test]
    fn test_expired_listing_frees_quota() {
        let (offers, clock) = service(1);
        let first = offers.create_offer("carol", request()).unwrap();
        let second = offers.create_offer("carol", request()).unwrap();
        offers.enable("carol", &first.id).unwrap();

        clock.advance(Duration::days(LISTING_TTL_DAYS + 1));
        offers.enable("carol", &second.id).unwrap();
    }

    #[test]
    fn test_validation() {
        let (offers, _) = service(3);
        let mut same_asset = request();
        same_asset.to_asset_id = "usdt".into();
        assert!(matches!(
            offers.create_offer("carol", same_asset),
            Err(TradeError::Validation(_))
        ));
        let mut inverted = request();
        inverted.min_amount = Decimal::new(200, 0);
        assert!(matches!(
            offers.create_offer("carol", inverted),
            Err(TradeError::Validation(_))
        ));
        let mut unknown = request();
        unknown.from_asset_id = "doge".into();
        assert!(matches!(
            offers.create_offer("carol", unknown),
            Err(TradeError::Validation(_))
        ));
    }

    #[test]
    fn test_browse_filters() {
        let (offers, _) = service(3);
        let listed = offers.browse(&OfferFilter::default()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "offer-1");

        let filter = OfferFilter {
            to_asset_id: Some("usd".into()),
            ..Default::default()
        };
        assert!(offers.browse(&filter).unwrap().is_empty());
    }
}
