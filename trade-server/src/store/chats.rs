//! Order chats and the append-only message log

use super::{CHATS_TABLE, MESSAGE_SEQ, MESSAGES_TABLE, Storage, StorageResult, decode};
use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use shared::models::{ChatMessage, MessageType, OrderChat};

impl Storage {
    pub fn find_chat(&self, order_id: &str) -> StorageResult<Option<OrderChat>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHATS_TABLE)?;
        match table.get(order_id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// The order's chat, created on first use
    pub fn get_or_create_chat(&self, order_id: &str, now: DateTime<Utc>) -> StorageResult<OrderChat> {
        if let Some(chat) = self.find_chat(order_id)? {
            return Ok(chat);
        }

        let txn = self.db.begin_write()?;
        let chat = {
            let mut table = txn.open_table(CHATS_TABLE)?;
            // 另一个写者可能已经抢先创建
            let existing: Option<OrderChat> = match table.get(order_id)? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            match existing {
                Some(chat) => chat,
                None => {
                    let chat = OrderChat {
                        id: shared::util::new_id(),
                        order_id: order_id.to_string(),
                        created_at: now,
                    };
                    let value = serde_json::to_vec(&chat)?;
                    table.insert(order_id, value.as_slice())?;
                    chat
                }
            }
        };
        txn.commit()?;
        Ok(chat)
    }

    pub fn append_message(
        &self,
        chat_id: &str,
        client_id: &str,
        kind: MessageType,
        content: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<ChatMessage> {
        let txn = self.db.begin_write()?;
        let message = {
            let id = self.next_sequence(&txn, MESSAGE_SEQ)?;
            let message = ChatMessage {
                id,
                chat_id: chat_id.to_string(),
                client_id: client_id.to_string(),
                kind,
                content: content.to_string(),
                created_at: now,
                read_at: None,
            };
            let mut table = txn.open_table(MESSAGES_TABLE)?;
            let value = serde_json::to_vec(&message)?;
            table.insert((chat_id, id), value.as_slice())?;
            message
        };
        txn.commit()?;
        Ok(message)
    }

    pub fn get_message(&self, chat_id: &str, message_id: u64) -> StorageResult<Option<ChatMessage>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MESSAGES_TABLE)?;
        match table.get((chat_id, message_id))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Messages after `cursor` (exclusive id) and created after `after`, oldest first
    pub fn list_messages(
        &self,
        chat_id: &str,
        cursor: Option<u64>,
        after: Option<DateTime<Utc>>,
        limit: usize,
    ) -> StorageResult<Vec<ChatMessage>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MESSAGES_TABLE)?;
        let start = cursor.map(|c| c.saturating_add(1)).unwrap_or(0);

        let mut messages = Vec::new();
        for entry in table.range((chat_id, start)..=(chat_id, u64::MAX))? {
            if messages.len() >= limit {
                break;
            }
            let (_key, value) = entry?;
            let message: ChatMessage = decode(value.value())?;
            if after.is_none_or(|after| message.created_at > after) {
                messages.push(message);
            }
        }
        Ok(messages)
    }

    /// Set `read_at` once; later calls keep the first timestamp
    pub fn mark_message_read(
        &self,
        chat_id: &str,
        message_id: u64,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<ChatMessage>> {
        let txn = self.db.begin_write()?;
        let updated = {
            let mut table = txn.open_table(MESSAGES_TABLE)?;
            let current: Option<ChatMessage> = match table.get((chat_id, message_id))? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            match current {
                Some(mut message) => {
                    if message.read_at.is_none() {
                        message.read_at = Some(at);
                        let value = serde_json::to_vec(&message)?;
                        table.insert((chat_id, message_id), value.as_slice())?;
                    }
                    Some(message)
                }
                None => None,
            }
        };
        txn.commit()?;
        Ok(updated)
    }
}
