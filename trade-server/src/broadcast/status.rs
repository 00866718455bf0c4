use super::{SUBSCRIBER_BUFFER, SubscriberRegistry, Subscription};
use crate::utils::{TradeError, TradeResult};
use shared::models::Order;
use shared::order::{OrderStreamEvent, OrderView};
use std::sync::Arc;

/// Per-order status stream
#[derive(Clone)]
pub struct StatusBroadcaster {
    registry: SubscriberRegistry<Arc<OrderStreamEvent>>,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        Self {
            registry: SubscriberRegistry::new("order_status", SUBSCRIBER_BUFFER),
        }
    }

    /// Only the author and the offer owner may watch an order
    pub fn subscribe(
        &self,
        order: &Order,
        client_id: &str,
    ) -> TradeResult<Subscription<Arc<OrderStreamEvent>>> {
        if !order.is_party(client_id) {
            return Err(TradeError::not_a_party());
        }
        Ok(self.registry.subscribe(&order.id))
    }

    /// Push the new snapshot to every subscriber of the order
    pub fn publish(&self, view: &OrderView) -> usize {
        let order_id = view.order.id.clone();
        let status = view.order.status;
        let event = Arc::new(OrderStreamEvent::status_changed(view.clone()));
        let delivered = self.registry.publish(&order_id, event);
        tracing::debug!(order_id = %order_id, status = %status, delivered, "Status event published");
        delivered
    }

    pub fn subscriber_count(&self, order_id: &str) -> usize {
        self.registry.subscriber_count(order_id)
    }

    pub fn total_subscribers(&self) -> usize {
        self.registry.total_subscribers()
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
