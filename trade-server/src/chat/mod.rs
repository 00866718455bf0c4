//! 订单聊天
//!
//! 每个订单最多一个会话，首次读写时创建。消息只追加，按创建顺序编号。
//! 只有 author 与 offer owner 可以读写。
//!
//! 写入顺序：持久化日志 → 缓存（失败只记日志）→ 推送给在线订阅者。
//! 同一会话的写入与订阅共用一把锁，新订阅者的历史快照与实时推送之间不会漏消息。

pub mod cache;

pub use cache::{CacheError, ChatCache, MemoryChatCache};

use crate::broadcast::{SUBSCRIBER_BUFFER, SubscriberRegistry, Subscription};
use crate::store::Storage;
use crate::utils::{Clock, TradeError, TradeResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::models::{ChatMessage, MessageCreate, MessageType, Order, OrderChat};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Largest page returned by [`ChatService::list_messages`]
pub const MAX_PAGE: usize = 50;

/// Message listing query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePage {
    /// Return messages with id greater than this
    pub cursor: Option<u64>,
    /// Return messages created after this instant
    pub after: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

const LOCK_STRIPES: usize = 64;

/// Striped per-chat locks, held across await points (cache calls)
struct ChatLocks {
    stripes: Vec<Mutex<()>>,
}

impl ChatLocks {
    fn new(count: usize) -> Self {
        Self {
            stripes: (0..count.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    async fn lock(&self, chat_id: &str) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        chat_id.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.stripes.len();
        self.stripes[idx].lock().await
    }
}

pub struct ChatService {
    storage: Storage,
    clock: Arc<dyn Clock>,
    cache: Arc<dyn ChatCache>,
    registry: SubscriberRegistry<ChatMessage>,
    locks: ChatLocks,
}

impl ChatService {
    /// `history_limit` is the cache capacity; the per-subscriber buffer is
    /// sized so a full history replay always fits.
    pub fn new(
        storage: Storage,
        clock: Arc<dyn Clock>,
        cache: Arc<dyn ChatCache>,
        history_limit: usize,
    ) -> Self {
        Self {
            storage,
            clock,
            cache,
            registry: SubscriberRegistry::new("order_chat", history_limit + SUBSCRIBER_BUFFER),
            locks: ChatLocks::new(LOCK_STRIPES),
        }
    }

    /// Load the order and refuse anyone who is not a party
    fn member_order(&self, client_id: &str, order_id: &str) -> TradeResult<Order> {
        let order = self
            .storage
            .get_order(order_id)?
            .ok_or_else(|| TradeError::order_not_found(order_id))?;
        if !order.is_party(client_id) {
            tracing::warn!(order_id = %order_id, client_id = %client_id, "Chat access refused");
            return Err(TradeError::not_a_party());
        }
        Ok(order)
    }

    fn chat_for(&self, client_id: &str, order_id: &str) -> TradeResult<(Order, OrderChat)> {
        let order = self.member_order(client_id, order_id)?;
        let chat = self.storage.get_or_create_chat(order_id, self.clock.now())?;
        Ok((order, chat))
    }

    pub fn list_messages(
        &self,
        client_id: &str,
        order_id: &str,
        page: &MessagePage,
    ) -> TradeResult<Vec<ChatMessage>> {
        let (_, chat) = self.chat_for(client_id, order_id)?;
        let limit = page.limit.unwrap_or(MAX_PAGE).clamp(1, MAX_PAGE);
        Ok(self
            .storage
            .list_messages(&chat.id, page.cursor, page.after, limit)?)
    }

    pub async fn post_message(
        &self,
        client_id: &str,
        order_id: &str,
        request: MessageCreate,
    ) -> TradeResult<ChatMessage> {
        let content = request.content.trim();
        if content.is_empty() {
            return Err(TradeError::Validation("content must not be empty".into()));
        }
        if request.kind == MessageType::System {
            return Err(TradeError::Validation(
                "system messages cannot be posted by clients".into(),
            ));
        }

        let (_, chat) = self.chat_for(client_id, order_id)?;
        let _guard = self.locks.lock(&chat.id).await;
        let message = self.storage.append_message(
            &chat.id,
            client_id,
            request.kind,
            content,
            self.clock.now(),
        )?;

        if let Err(e) = self.cache.append(&chat.id, &message).await {
            tracing::warn!(chat_id = %chat.id, error = %e, "Chat cache append failed");
        }
        self.registry.publish(&chat.id, message.clone());

        tracing::debug!(order_id = %order_id, chat_id = %chat.id, message_id = message.id, "Chat message posted");
        Ok(message)
    }

    /// Read receipt; only the recipient of a message can mark it
    pub async fn mark_read(
        &self,
        client_id: &str,
        order_id: &str,
        message_id: u64,
        read_at: Option<DateTime<Utc>>,
    ) -> TradeResult<ChatMessage> {
        let (_, chat) = self.chat_for(client_id, order_id)?;
        let message = self
            .storage
            .get_message(&chat.id, message_id)?
            .ok_or_else(|| TradeError::NotFound(format!("Message {message_id}")))?;
        if message.client_id == client_id {
            return Err(TradeError::Forbidden(
                "cannot mark your own message as read".into(),
            ));
        }

        let at = read_at.unwrap_or_else(|| self.clock.now());
        let _guard = self.locks.lock(&chat.id).await;
        let message = self
            .storage
            .mark_message_read(&chat.id, message_id, at)?
            .ok_or_else(|| TradeError::NotFound(format!("Message {message_id}")))?;

        if let Err(e) = self.cache.refresh(&chat.id, &message).await {
            tracing::warn!(chat_id = %chat.id, error = %e, "Chat cache refresh failed");
        }
        self.registry.publish(&chat.id, message.clone());
        Ok(message)
    }

    /// Open the order's chat stream with cached history queued first.
    ///
    /// Snapshot and registration happen under the chat lock, so every message
    /// lands either in the history or on the live stream, exactly once.
    /// A failing cache yields an empty history, never an error.
    pub async fn subscribe(
        &self,
        client_id: &str,
        order_id: &str,
    ) -> TradeResult<Subscription<ChatMessage>> {
        let (_, chat) = self.chat_for(client_id, order_id)?;
        let _guard = self.locks.lock(&chat.id).await;
        let history = match self.cache.history(&chat.id).await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(chat_id = %chat.id, error = %e, "Chat history unavailable");
                Vec::new()
            }
        };
        let (subscription, replayed) = self.registry.subscribe_with_backlog(&chat.id, history);
        tracing::debug!(order_id = %order_id, client_id = %client_id, replayed, "Chat subscriber joined");
        Ok(subscription)
    }

    pub fn total_subscribers(&self) -> usize {
        self.registry.total_subscribers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::{order_fixture, seed_world};
    use crate::utils::ManualClock;
    use async_trait::async_trait;
    use chrono::Duration;

    struct BrokenCache;

    #[async_trait]
    impl ChatCache for BrokenCache {
        async fn append(&self, _: &str, _: &ChatMessage) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn history(&self, _: &str) -> Result<Vec<ChatMessage>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    fn service(cache: Arc<dyn ChatCache>, limit: usize) -> ChatService {
        let storage = Storage::open_in_memory().unwrap();
        let now = Utc::now();
        seed_world(&storage, now);
        storage
            .insert_order(&order_fixture("ord-1", now, now + Duration::minutes(15)))
            .unwrap();
        ChatService::new(storage, Arc::new(ManualClock::new(now)), cache, limit)
    }

    fn text(content: &str) -> MessageCreate {
        MessageCreate {
            content: content.into(),
            kind: MessageType::Text,
        }
    }

    #[tokio::test]
    async fn test_outsider_refused_everywhere() {
        let chat = service(Arc::new(MemoryChatCache::new(50)), 50);
        let page = MessagePage::default();
        assert!(matches!(
            chat.list_messages("carol", "ord-1", &page),
            Err(TradeError::Forbidden(_))
        ));
        assert!(matches!(
            chat.post_message("carol", "ord-1", text("hi")).await,
            Err(TradeError::Forbidden(_))
        ));
        assert!(matches!(
            chat.subscribe("carol", "ord-1").await,
            Err(TradeError::Forbidden(_))
        ));
        assert!(matches!(
            chat.list_messages("alice", "missing", &page),
            Err(TradeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_history_replay_then_live() {
        let chat = service(Arc::new(MemoryChatCache::new(2)), 2);
        for content in ["one", "two", "three"] {
            chat.post_message("alice", "ord-1", text(content)).await.unwrap();
        }

        let mut bob = chat.subscribe("bob", "ord-1").await.unwrap();
        assert_eq!(bob.recv().await.unwrap().content, "two");
        assert_eq!(bob.recv().await.unwrap().content, "three");

        let posted = chat.post_message("bob", "ord-1", text("four")).await.unwrap();
        assert_eq!(bob.recv().await.unwrap(), posted);

        // the durable log keeps everything
        let all = chat
            .list_messages("alice", "ord-1", &MessagePage::default())
            .unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_cache_failure_never_blocks_posting() {
        let chat = service(Arc::new(BrokenCache), 50);
        let posted = chat.post_message("alice", "ord-1", text("hello")).await.unwrap();
        let mut bob = chat.subscribe("bob", "ord-1").await.unwrap();
        assert!(bob.try_recv().is_none());

        let all = chat
            .list_messages("bob", "ord-1", &MessagePage::default())
            .unwrap();
        assert_eq!(all, vec![posted]);
    }

    #[tokio::test]
    async fn test_validation_and_read_receipts() {
        let chat = service(Arc::new(MemoryChatCache::new(50)), 50);
        assert!(matches!(
            chat.post_message("alice", "ord-1", text("   ")).await,
            Err(TradeError::Validation(_))
        ));
        let system = MessageCreate {
            content: "forged".into(),
            kind: MessageType::System,
        };
        assert!(matches!(
            chat.post_message("alice", "ord-1", system).await,
            Err(TradeError::Validation(_))
        ));

        let msg = chat.post_message("alice", "ord-1", text("paid")).await.unwrap();
        assert!(matches!(
            chat.mark_read("alice", "ord-1", msg.id, None).await,
            Err(TradeError::Forbidden(_))
        ));
        let read = chat.mark_read("bob", "ord-1", msg.id, None).await.unwrap();
        assert!(read.read_at.is_some());
    }

    /// Holds `history` until the test opens the gate
    struct GatedCache {
        inner: MemoryChatCache,
        gate: tokio::sync::Semaphore,
    }

    #[async_trait]
    impl ChatCache for GatedCache {
        async fn append(&self, chat_id: &str, message: &ChatMessage) -> Result<(), CacheError> {
            self.inner.append(chat_id, message).await
        }
        async fn history(&self, chat_id: &str) -> Result<Vec<ChatMessage>, CacheError> {
            let _permit = self.gate.acquire().await.unwrap();
            self.inner.history(chat_id).await
        }
    }

    #[tokio::test]
    async fn test_message_posted_during_subscribe_is_not_lost() {
        let cache = Arc::new(GatedCache {
            inner: MemoryChatCache::new(50),
            gate: tokio::sync::Semaphore::new(0),
        });
        let chat = Arc::new(service(cache.clone(), 50));

        let joining = tokio::spawn({
            let chat = chat.clone();
            async move { chat.subscribe("bob", "ord-1").await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let posting = tokio::spawn({
            let chat = chat.clone();
            async move { chat.post_message("alice", "ord-1", text("mid-join")).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!posting.is_finished());

        cache.gate.add_permits(1);
        let mut bob = joining.await.unwrap().unwrap();
        let posted = posting.await.unwrap().unwrap();

        let received = tokio::time::timeout(std::time::Duration::from_secs(1), bob.recv())
            .await
            .expect("message delivered")
            .unwrap();
        assert_eq!(received, posted);
        assert!(bob.try_recv().is_none());
    }
}
