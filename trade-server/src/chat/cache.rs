//! Recent-history cache for chat replay
//!
//! Holds at most N messages per chat, evicting oldest-first. The durable
//! message log is the source of truth; the cache only speeds up the history
//! a new chat subscriber receives.

use async_trait::async_trait;
use dashmap::DashMap;
use shared::models::ChatMessage;
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("chat cache unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ChatCache: Send + Sync {
    /// Append and trim to capacity
    async fn append(&self, chat_id: &str, message: &ChatMessage) -> Result<(), CacheError>;

    /// Cached messages, oldest first
    async fn history(&self, chat_id: &str) -> Result<Vec<ChatMessage>, CacheError>;

    /// Replace a cached copy after it changed (read receipts)
    async fn refresh(&self, _chat_id: &str, _message: &ChatMessage) -> Result<(), CacheError> {
        Ok(())
    }
}

/// In-process cache, one bounded queue per chat
#[derive(Debug)]
pub struct MemoryChatCache {
    capacity: usize,
    chats: DashMap<String, VecDeque<ChatMessage>>,
}

impl MemoryChatCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            chats: DashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[async_trait]
impl ChatCache for MemoryChatCache {
    async fn append(&self, chat_id: &str, message: &ChatMessage) -> Result<(), CacheError> {
        if self.capacity == 0 {
            return Ok(());
        }
        let mut queue = self.chats.entry(chat_id.to_string()).or_default();
        queue.push_back(message.clone());
        while queue.len() > self.capacity {
            queue.pop_front();
        }
        Ok(())
    }

    async fn history(&self, chat_id: &str) -> Result<Vec<ChatMessage>, CacheError> {
        Ok(self
            .chats
            .get(chat_id)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn refresh(&self, chat_id: &str, message: &ChatMessage) -> Result<(), CacheError> {
        if let Some(mut queue) = self.chats.get_mut(chat_id)
            && let Some(cached) = queue.iter_mut().find(|m| m.id == message.id)
        {
            *cached = message.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::models::MessageType;

    fn message(id: u64) -> ChatMessage {
        ChatMessage {
            id,
            chat_id: "chat-1".into(),
            client_id: "alice".into(),
            kind: MessageType::Text,
            content: format!("m{id}"),
            created_at: Utc::now(),
            read_at: None,
        }
    }

    #[tokio::test]
    async fn test_keeps_last_n_in_insertion_order() {
        let cache = MemoryChatCache::new(3);
        for id in 1..=7 {
            cache.append("chat-1", &message(id)).await.unwrap();
        }
        let ids: Vec<u64> = cache
            .history("chat-1")
            .await
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![5, 6, 7]);
        assert!(cache.history("chat-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_under_capacity_keeps_everything() {
        let cache = MemoryChatCache::new(50);
        for id in 1..=2 {
            cache.append("chat-1", &message(id)).await.unwrap();
        }
        assert_eq!(cache.history("chat-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_replaces_cached_copy() {
        let cache = MemoryChatCache::new(5);
        cache.append("chat-1", &message(1)).await.unwrap();
        let mut read = message(1);
        read.read_at = Some(Utc::now());
        cache.refresh("chat-1", &read).await.unwrap();
        assert_eq!(cache.history("chat-1").await.unwrap()[0].read_at, read.read_at);
    }
}
