use super::{SUBSCRIBER_BUFFER, SubscriberRegistry, Subscription};
use shared::models::{Offer, OfferEvent};
use std::sync::Arc;

/// The only feed key; every connection sees every listing change
const FEED: &str = "offers";

/// Public stream of listing changes
#[derive(Clone)]
pub struct OfferFeed {
    registry: SubscriberRegistry<Arc<OfferEvent>>,
}

impl OfferFeed {
    pub fn new() -> Self {
        Self {
            registry: SubscriberRegistry::new("offer_feed", SUBSCRIBER_BUFFER),
        }
    }

    pub fn subscribe(&self) -> Subscription<Arc<OfferEvent>> {
        self.registry.subscribe(FEED)
    }

    /// Offer entered the listing
    pub fn created(&self, offer: &Offer) -> usize {
        self.publish(OfferEvent::Created {
            offer: Box::new(offer.clone()),
        })
    }

    pub fn updated(&self, offer: &Offer) -> usize {
        self.publish(OfferEvent::Updated {
            offer: Box::new(offer.clone()),
        })
    }

    /// Offer left the listing
    pub fn deleted(&self, offer: &Offer) -> usize {
        self.publish(OfferEvent::Deleted {
            offer: Box::new(offer.clone()),
        })
    }

    fn publish(&self, event: OfferEvent) -> usize {
        let offer_id = event.offer().id.clone();
        let kind = event.event_type();
        let delivered = self.registry.publish(FEED, Arc::new(event));
        tracing::debug!(offer_id = %offer_id, event = kind, delivered, "Offer event published");
        delivered
    }

    pub fn total_subscribers(&self) -> usize {
        self.registry.total_subscribers()
    }
}

impl Default for OfferFeed {
    fn default() -> Self {
        Self::new()
    }
}
