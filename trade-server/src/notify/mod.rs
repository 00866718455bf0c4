//! Notification dispatcher
//!
//! Every applied transition persists one notification per party and tries
//! to push it to the recipient's live notification streams. `sent_at` is
//! stamped only when a push was accepted; anything left unsent is replayed
//! when the recipient next subscribes. There is no retry queue.

use crate::broadcast::{SUBSCRIBER_BUFFER, SubscriberRegistry, Subscription};
use crate::store::Storage;
use crate::utils::{Clock, TradeError, TradeResult};
use serde_json::{Value, json};
use shared::models::{Notification, Order};
use shared::order::{ORDER_CREATED, ORDER_STATUS_CHANGED};
use std::sync::Arc;

pub struct NotificationDispatcher {
    storage: Storage,
    clock: Arc<dyn Clock>,
    registry: SubscriberRegistry<Notification>,
}

impl NotificationDispatcher {
    pub fn new(storage: Storage, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            registry: SubscriberRegistry::new("notifications", SUBSCRIBER_BUFFER),
        }
    }

    /// One `order.status_changed` notice each for author and offer owner
    pub fn order_status_changed(&self, order: &Order) -> TradeResult<Vec<Notification>> {
        let payload = json!({ "orderId": order.id, "status": order.status });
        [&order.author_id, &order.offer_owner_id]
            .into_iter()
            .map(|recipient| self.notify(recipient, ORDER_STATUS_CHANGED, payload.clone()))
            .collect()
    }

    /// `order.created` notice for the offer owner
    pub fn order_created(&self, order: &Order) -> TradeResult<Notification> {
        self.notify(
            &order.offer_owner_id,
            ORDER_CREATED,
            json!({ "orderId": order.id }),
        )
    }

    fn notify(&self, recipient: &str, kind: &str, payload: Value) -> TradeResult<Notification> {
        let now = self.clock.now();
        let mut notification = self
            .storage
            .insert_notification(recipient, kind, payload, now)?;

        let delivered = self.registry.publish(recipient, notification.clone());
        if delivered > 0 && self.storage.mark_notification_sent(recipient, notification.id, now)? {
            notification.sent_at = Some(now);
        }

        tracing::debug!(
            client_id = %recipient,
            kind = %kind,
            notification_id = notification.id,
            delivered,
            "Notification dispatched"
        );
        Ok(notification)
    }

    /// Open a live stream, replaying unsent and unread notifications first
    pub fn subscribe(&self, recipient: &str) -> TradeResult<Subscription<Notification>> {
        let pending = self.storage.pending_notifications(recipient)?;
        let (subscription, queued) = self
            .registry
            .subscribe_with_backlog(recipient, pending.clone());

        let now = self.clock.now();
        for notification in pending.iter().take(queued) {
            self.storage
                .mark_notification_sent(recipient, notification.id, now)?;
        }
        if queued > 0 {
            tracing::info!(client_id = %recipient, replayed = queued, "Replayed pending notifications");
        }
        Ok(subscription)
    }

    pub fn list(&self, recipient: &str, limit: usize, offset: usize) -> TradeResult<Vec<Notification>> {
        Ok(self.storage.list_notifications(recipient, limit, offset)?)
    }

    pub fn mark_read(&self, recipient: &str, id: u64) -> TradeResult<Notification> {
        self.storage
            .mark_notification_read(recipient, id, self.clock.now())?
            .ok_or_else(|| TradeError::NotFound(format!("Notification {id}")))
    }

    pub fn mark_all_read(&self, recipient: &str) -> TradeResult<usize> {
        Ok(self
            .storage
            .mark_all_notifications_read(recipient, self.clock.now())?)
    }

    pub fn total_subscribers(&self) -> usize {
        self.registry.total_subscribers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::order_fixture;
    use crate::utils::ManualClock;
    use chrono::{Duration, Utc};

    fn dispatcher() -> (NotificationDispatcher, Storage) {
        let storage = Storage::open_in_memory().unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (NotificationDispatcher::new(storage.clone(), clock), storage)
    }

    #[tokio::test]
    async fn test_sent_only_when_pushed() {
        let (dispatcher, storage) = dispatcher();
        let now = Utc::now();
        let order = order_fixture("ord-1", now, now + Duration::minutes(15));

        let mut alice = dispatcher.subscribe("alice").unwrap();
        let created = dispatcher.order_status_changed(&order).unwrap();
        assert_eq!(created.len(), 2);

        let pushed = alice.recv().await.unwrap();
        assert_eq!(pushed.payload["orderId"], "ord-1");
        assert_eq!(pushed.payload["status"], "WAIT_PAYMENT");

        assert!(storage.pending_notifications("alice").unwrap().is_empty());
        // bob had no stream open
        assert_eq!(storage.pending_notifications("bob").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unsent_replayed_on_subscribe() {
        let (dispatcher, storage) = dispatcher();
        let now = Utc::now();
        let order = order_fixture("ord-1", now, now + Duration::minutes(15));
        dispatcher.order_status_changed(&order).unwrap();
        dispatcher.order_created(&order).unwrap();

        let mut bob = dispatcher.subscribe("bob").unwrap();
        let first = bob.recv().await.unwrap();
        let second = bob.recv().await.unwrap();
        assert_eq!(first.kind, ORDER_STATUS_CHANGED);
        assert_eq!(second.kind, ORDER_CREATED);
        assert!(storage.pending_notifications("bob").unwrap().is_empty());

        // a second session has nothing left to replay
        let mut again = dispatcher.subscribe("bob").unwrap();
        assert!(again.try_recv().is_none());
    }

    #[test]
    fn test_read_notifications_are_not_replayed() {
        let (dispatcher, _storage) = dispatcher();
        let now = Utc::now();
        let order = order_fixture("ord-1", now, now + Duration::minutes(15));
        dispatcher.order_status_changed(&order).unwrap();
        assert_eq!(dispatcher.mark_all_read("bob").unwrap(), 1);

        let mut bob = dispatcher.subscribe("bob").unwrap();
        assert!(bob.try_recv().is_none());
        assert!(matches!(
            dispatcher.mark_read("bob", 999),
            Err(TradeError::NotFound(_))
        ));
    }
}
