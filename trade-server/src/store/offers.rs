//! Offer rows and the activation quota

use super::{OFFERS_TABLE, ORDERS_TABLE, Storage, StorageResult, decode};
use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use shared::models::{Offer, OfferFilter, Order};

/// Result of an enable attempt
#[derive(Debug, Clone, PartialEq)]
pub enum EnableOutcome {
    Updated(Offer),
    /// No such offer, or it belongs to someone else
    Missing,
    /// The offer is already enabled, listed or not
    Unchanged,
    /// Owner already has `active` listed offers
    QuotaReached { active: usize },
}

/// Result of a delete attempt
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted(Offer),
    Missing,
    /// Orders still point at the offer
    Referenced { orders: usize },
}

impl Storage {
    pub fn insert_offer(&self, offer: &Offer) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(OFFERS_TABLE)?;
            let value = serde_json::to_vec(offer)?;
            table.insert(offer.id.as_str(), value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_offer(&self, offer_id: &str) -> StorageResult<Option<Offer>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OFFERS_TABLE)?;
        match table.get(offer_id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Enable the owner's offer if the owner's listed count is below `max_active`.
    ///
    /// Counting and updating share one write transaction, so two concurrent
    /// enables cannot both slip under the quota.
    pub fn enable_offer(
        &self,
        offer_id: &str,
        owner_id: &str,
        now: DateTime<Utc>,
        ttl: DateTime<Utc>,
        max_active: usize,
    ) -> StorageResult<EnableOutcome> {
        let txn = self.db.begin_write()?;
        let outcome = {
            let mut table = txn.open_table(OFFERS_TABLE)?;

            let mut target = None;
            let mut active = 0usize;
            for entry in table.iter()? {
                let (_key, value) = entry?;
                let offer: Offer = decode(value.value())?;
                if offer.id == offer_id {
                    target = Some(offer);
                } else if offer.owner_id == owner_id && offer.is_listed(now) {
                    active += 1;
                }
            }

            match target {
                Some(offer) if offer.owner_id != owner_id => EnableOutcome::Missing,
                None => EnableOutcome::Missing,
                Some(offer) if offer.is_enabled => EnableOutcome::Unchanged,
                Some(_) if active >= max_active => EnableOutcome::QuotaReached { active },
                Some(mut offer) => {
                    offer.is_enabled = true;
                    offer.enabled_at = Some(now);
                    offer.disabled_at = None;
                    offer.ttl = ttl;
                    offer.updated_at = now;
                    let value = serde_json::to_vec(&offer)?;
                    table.insert(offer_id, value.as_slice())?;
                    EnableOutcome::Updated(offer)
                }
            }
        };

        match &outcome {
            EnableOutcome::Updated(_) => txn.commit()?,
            _ => txn.abort()?,
        }
        Ok(outcome)
    }

    /// Disable the owner's offer and pull it from listings immediately.
    ///
    /// Always writes, so disabling twice just moves `disabled_at`. Returns the
    /// stored offer and whether it was listed just before, or `None` when the
    /// offer is missing or foreign.
    pub fn disable_offer(
        &self,
        offer_id: &str,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<(Offer, bool)>> {
        let mut was_listed = false;
        let offer = self.update_offer(offer_id, owner_id, |offer| {
            was_listed = offer.is_listed(now);
            offer.is_enabled = false;
            offer.disabled_at = Some(now);
            offer.enabled_at = None;
            offer.ttl = now;
            offer.updated_at = now;
        })?;
        Ok(offer.map(|offer| (offer, was_listed)))
    }

    /// Apply `change` to the owner's offer in one write transaction.
    ///
    /// Returns the stored result, or `None` when the offer is missing or foreign.
    pub fn update_offer(
        &self,
        offer_id: &str,
        owner_id: &str,
        change: impl FnOnce(&mut Offer),
    ) -> StorageResult<Option<Offer>> {
        let txn = self.db.begin_write()?;
        let updated = {
            let mut table = txn.open_table(OFFERS_TABLE)?;
            let current: Option<Offer> = match table.get(offer_id)? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            match current {
                Some(mut offer) if offer.owner_id == owner_id => {
                    change(&mut offer);
                    let value = serde_json::to_vec(&offer)?;
                    table.insert(offer_id, value.as_slice())?;
                    Some(offer)
                }
                _ => None,
            }
        };

        if updated.is_some() {
            txn.commit()?;
        } else {
            txn.abort()?;
        }
        Ok(updated)
    }

    /// Remove the owner's offer unless any order references it
    pub fn delete_offer(&self, offer_id: &str, owner_id: &str) -> StorageResult<DeleteOutcome> {
        let txn = self.db.begin_write()?;
        let outcome = {
            let mut offers = txn.open_table(OFFERS_TABLE)?;
            let current: Option<Offer> = match offers.get(offer_id)? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            match current {
                Some(offer) if offer.owner_id == owner_id => {
                    let orders = txn.open_table(ORDERS_TABLE)?;
                    let mut referencing = 0usize;
                    for entry in orders.iter()? {
                        let (_key, value) = entry?;
                        let order: Order = decode(value.value())?;
                        if order.offer_id == offer_id {
                            referencing += 1;
                        }
                    }
                    if referencing > 0 {
                        DeleteOutcome::Referenced {
                            orders: referencing,
                        }
                    } else {
                        offers.remove(offer_id)?;
                        DeleteOutcome::Deleted(offer)
                    }
                }
                _ => DeleteOutcome::Missing,
            }
        };

        match &outcome {
            DeleteOutcome::Deleted(_) => txn.commit()?,
            _ => txn.abort()?,
        }
        Ok(outcome)
    }

    /// Every offer of one owner, optionally narrowed by `is_enabled`, newest first
    pub fn offers_of_owner(
        &self,
        owner_id: &str,
        enabled: Option<bool>,
    ) -> StorageResult<Vec<Offer>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OFFERS_TABLE)?;

        let mut offers = Vec::new();
        for entry in table.iter()? {
            let (_key, value) = entry?;
            let offer: Offer = decode(value.value())?;
            if offer.owner_id == owner_id && enabled.is_none_or(|e| e == offer.is_enabled) {
                offers.push(offer);
            }
        }
        offers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(offers)
    }

    /// Enabled, unexpired offers of one owner
    pub fn count_listed_offers(&self, owner_id: &str, now: DateTime<Utc>) -> StorageResult<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OFFERS_TABLE)?;

        let mut count = 0;
        for entry in table.iter()? {
            let (_key, value) = entry?;
            let offer: Offer = decode(value.value())?;
            if offer.owner_id == owner_id && offer.is_listed(now) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Public listing: enabled, unexpired and matching the filter, newest first
    pub fn listed_offers(&self, filter: &OfferFilter, now: DateTime<Utc>) -> StorageResult<Vec<Offer>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OFFERS_TABLE)?;

        let mut offers = Vec::new();
        for entry in table.iter()? {
            let (_key, value) = entry?;
            let offer: Offer = decode(value.value())?;
            if offer.is_listed(now) && offer.matches(filter) {
                offers.push(offer);
            }
        }
        offers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(offers)
    }
}
