use super::{SUBSCRIBER_BUFFER, SubscriberRegistry, Subscription};
use shared::order::{OrderStreamEvent, OrderView};
use std::sync::Arc;

/// Per-client stream of orders created against the client's offers.
///
/// Keyed by client id: the offer owner has no order id to subscribe to
/// until the order exists.
#[derive(Clone)]
pub struct CreationBroadcaster {
    registry: SubscriberRegistry<Arc<OrderStreamEvent>>,
}

impl CreationBroadcaster {
    pub fn new() -> Self {
        Self {
            registry: SubscriberRegistry::new("order_created", SUBSCRIBER_BUFFER),
        }
    }

    pub fn subscribe(&self, client_id: &str) -> Subscription<Arc<OrderStreamEvent>> {
        self.registry.subscribe(client_id)
    }

    /// Push `order.created` to the offer owner's live sessions
    pub fn publish(&self, view: &OrderView) -> usize {
        let owner = view.order.offer_owner_id.clone();
        let event = Arc::new(OrderStreamEvent::created(view.clone()));
        let delivered = self.registry.publish(&owner, event);
        tracing::debug!(order_id = %view.order.id, client_id = %owner, delivered, "Creation event published");
        delivered
    }

    pub fn total_subscribers(&self) -> usize {
        self.registry.total_subscribers()
    }
}

impl Default for CreationBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
