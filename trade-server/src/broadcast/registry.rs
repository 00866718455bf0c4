use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

pub type SubscriberId = u64;

struct RegistryInner<E> {
    name: &'static str,
    capacity: usize,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<String, HashMap<SubscriberId, mpsc::Sender<E>>>>,
}

/// Keyed set of live subscriber channels behind a single lock.
///
/// Cloning shares the same registry.
pub struct SubscriberRegistry<E> {
    inner: Arc<RegistryInner<E>>,
}

impl<E> Clone for SubscriberRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Clone + Send + 'static> SubscriberRegistry<E> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                name,
                capacity: capacity.max(1),
                next_id: AtomicU64::new(1),
                subscribers: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self, key: &str) -> Subscription<E> {
        self.subscribe_with_backlog(key, Vec::new()).0
    }

    /// Register a subscriber whose channel is pre-filled with `backlog`.
    ///
    /// The backlog is queued under the registry lock, so no live event can
    /// overtake it. Returns the subscription and how many backlog items fit
    /// into the channel; the rest were dropped.
    pub fn subscribe_with_backlog(&self, key: &str, backlog: Vec<E>) -> (Subscription<E>, usize) {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let mut queued = 0;
        {
            let mut subscribers = self.inner.subscribers.lock();
            for item in backlog {
                if tx.try_send(item).is_err() {
                    break;
                }
                queued += 1;
            }
            subscribers
                .entry(key.to_string())
                .or_default()
                .insert(id, tx);
        }

        tracing::debug!(registry = self.inner.name, key = %key, subscriber = id, "Subscriber registered");

        let subscription = Subscription {
            id,
            key: key.to_string(),
            receiver: rx,
            registry: Arc::downgrade(&self.inner),
        };
        (subscription, queued)
    }

    pub fn unsubscribe(&self, key: &str, id: SubscriberId) {
        remove(&self.inner, key, id);
    }

    /// Push `event` to every subscriber of `key`; returns how many accepted it.
    ///
    /// A subscriber whose channel is full or closed is removed; dropping its
    /// sender ends the connection's writer loop.
    pub fn publish(&self, key: &str, event: E) -> usize {
        let mut subscribers = self.inner.subscribers.lock();
        let Some(set) = subscribers.get_mut(key) else {
            return 0;
        };

        let mut delivered = 0;
        set.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(e) => {
                tracing::info!(
                    registry = self.inner.name,
                    key = %key,
                    subscriber = *id,
                    reason = %e,
                    "Dropping subscriber after failed push"
                );
                false
            }
        });
        if set.is_empty() {
            subscribers.remove(key);
        }
        delivered
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner
            .subscribers
            .lock()
            .get(key)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Total number of live subscribers across all keys
    pub fn total_subscribers(&self) -> usize {
        self.inner.subscribers.lock().values().map(HashMap::len).sum()
    }
}

fn remove<E>(inner: &RegistryInner<E>, key: &str, id: SubscriberId) {
    let mut subscribers = inner.subscribers.lock();
    if let Some(set) = subscribers.get_mut(key) {
        if set.remove(&id).is_some() {
            tracing::debug!(registry = inner.name, key = %key, subscriber = id, "Subscriber removed");
        }
        if set.is_empty() {
            subscribers.remove(key);
        }
    }
}

/// Receiving end of one registration; unregisters itself on drop
pub struct Subscription<E> {
    id: SubscriberId,
    key: String,
    receiver: mpsc::Receiver<E>,
    registry: Weak<RegistryInner<E>>,
}

impl<E> Subscription<E> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Next event; `None` once the registry dropped this subscriber
    pub async fn recv(&mut self) -> Option<E> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<E> {
        self.receiver.try_recv().ok()
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            remove(&inner, &self.key, self.id);
        }
    }
}

impl<E> std::fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber_of_key() {
        let registry = SubscriberRegistry::<u32>::new("test", 8);
        let mut a = registry.subscribe("order-1");
        let mut b = registry.subscribe("order-1");
        let mut other = registry.subscribe("order-2");

        assert_eq!(registry.publish("order-1", 7), 2);
        assert_eq!(a.recv().await, Some(7));
        assert_eq!(b.recv().await, Some(7));
        assert_eq!(other.try_recv(), None);
        assert_eq!(registry.publish("nobody", 1), 0);
    }

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let registry = SubscriberRegistry::<u32>::new("test", 8);
        let mut sub = registry.subscribe("k");
        for n in 1..=5 {
            registry.publish("k", n);
        }
        for n in 1..=5 {
            assert_eq!(sub.recv().await, Some(n));
        }
    }

    #[tokio::test]
    async fn test_full_subscriber_is_pruned_and_closed() {
        let registry = SubscriberRegistry::<u32>::new("test", 1);
        let mut slow = registry.subscribe("k");
        let mut fast = registry.subscribe("k");

        assert_eq!(registry.publish("k", 1), 2);
        assert_eq!(fast.recv().await, Some(1));
        // slow never drained its single slot
        assert_eq!(registry.publish("k", 2), 1);
        assert_eq!(registry.subscriber_count("k"), 1);

        assert_eq!(slow.recv().await, Some(1));
        assert_eq!(slow.recv().await, None);
        assert_eq!(fast.recv().await, Some(2));
    }

    #[test]
    fn test_drop_unregisters() {
        let registry = SubscriberRegistry::<u32>::new("test", 4);
        let sub = registry.subscribe("k");
        let _keep = registry.subscribe("k");
        assert_eq!(registry.subscriber_count("k"), 2);
        drop(sub);
        assert_eq!(registry.subscriber_count("k"), 1);
        assert_eq!(registry.total_subscribers(), 1);
    }

    #[tokio::test]
    async fn test_backlog_precedes_live_events() {
        let registry = SubscriberRegistry::<u32>::new("test", 3);
        let (mut sub, queued) = registry.subscribe_with_backlog("k", vec![1, 2, 3, 4]);
        assert_eq!(queued, 3);
        assert_eq!(sub.recv().await, Some(1));
        registry.publish("k", 9);
        assert_eq!(sub.recv().await, Some(2));
        assert_eq!(sub.recv().await, Some(3));
        assert_eq!(sub.recv().await, Some(9));
    }
}
