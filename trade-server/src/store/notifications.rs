//! Per-recipient notification rows

use super::{NOTIFICATION_SEQ, NOTIFICATIONS_TABLE, Storage, StorageResult, decode};
use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde_json::Value;
use shared::models::Notification;

impl Storage {
    pub fn insert_notification(
        &self,
        client_id: &str,
        kind: &str,
        payload: Value,
        now: DateTime<Utc>,
    ) -> StorageResult<Notification> {
        let txn = self.db.begin_write()?;
        let notification = {
            let id = self.next_sequence(&txn, NOTIFICATION_SEQ)?;
            let notification = Notification {
                id,
                client_id: client_id.to_string(),
                kind: kind.to_string(),
                payload,
                sent_at: None,
                read_at: None,
                created_at: now,
            };
            let mut table = txn.open_table(NOTIFICATIONS_TABLE)?;
            let value = serde_json::to_vec(&notification)?;
            table.insert((client_id, id), value.as_slice())?;
            notification
        };
        txn.commit()?;
        Ok(notification)
    }

    /// Stamp `sent_at`; returns false if the notification no longer exists
    pub fn mark_notification_sent(
        &self,
        client_id: &str,
        id: u64,
        at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        self.update_notification(client_id, id, |n| n.sent_at = Some(at))
            .map(|n| n.is_some())
    }

    /// NotFound is reported as `None`, including for another recipient's id
    pub fn mark_notification_read(
        &self,
        client_id: &str,
        id: u64,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<Notification>> {
        self.update_notification(client_id, id, |n| {
            if n.read_at.is_none() {
                n.read_at = Some(at);
            }
        })
    }

    fn update_notification(
        &self,
        client_id: &str,
        id: u64,
        update: impl FnOnce(&mut Notification),
    ) -> StorageResult<Option<Notification>> {
        let txn = self.db.begin_write()?;
        let updated = {
            let mut table = txn.open_table(NOTIFICATIONS_TABLE)?;
            let current: Option<Notification> = match table.get((client_id, id))? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            match current {
                Some(mut notification) => {
                    update(&mut notification);
                    let value = serde_json::to_vec(&notification)?;
                    table.insert((client_id, id), value.as_slice())?;
                    Some(notification)
                }
                None => None,
            }
        };
        txn.commit()?;
        Ok(updated)
    }

    /// Mark every unread notification of the recipient; returns how many changed
    pub fn mark_all_notifications_read(
        &self,
        client_id: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<usize> {
        let txn = self.db.begin_write()?;
        let count = {
            let mut table = txn.open_table(NOTIFICATIONS_TABLE)?;
            let mut unread = Vec::new();
            for entry in table.range((client_id, 0u64)..=(client_id, u64::MAX))? {
                let (_key, value) = entry?;
                let notification: Notification = decode(value.value())?;
                if notification.read_at.is_none() {
                    unread.push(notification);
                }
            }
            for mut notification in unread.iter().cloned() {
                notification.read_at = Some(at);
                let value = serde_json::to_vec(&notification)?;
                table.insert((client_id, notification.id), value.as_slice())?;
            }
            unread.len()
        };
        txn.commit()?;
        Ok(count)
    }

    /// Neither sent nor read, oldest first
    pub fn pending_notifications(&self, client_id: &str) -> StorageResult<Vec<Notification>> {
        Ok(self
            .notifications_for(client_id)?
            .into_iter()
            .filter(Notification::is_pending)
            .collect())
    }

    /// Newest first
    pub fn list_notifications(
        &self,
        client_id: &str,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<Notification>> {
        Ok(self
            .notifications_for(client_id)?
            .into_iter()
            .rev()
            .skip(offset)
            .take(limit)
            .collect())
    }

    fn notifications_for(&self, client_id: &str) -> StorageResult<Vec<Notification>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(NOTIFICATIONS_TABLE)?;

        let mut notifications = Vec::new();
        for entry in table.range((client_id, 0u64)..=(client_id, u64::MAX))? {
            let (_key, value) = entry?;
            notifications.push(decode(value.value())?);
        }
        Ok(notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pending_until_sent_or_read() {
        let storage = Storage::open_in_memory().unwrap();
        let now = Utc::now();
        let a = storage
            .insert_notification("alice", "order.status_changed", json!({"orderId": "o1"}), now)
            .unwrap();
        let b = storage
            .insert_notification("alice", "order.status_changed", json!({"orderId": "o2"}), now)
            .unwrap();
        let c = storage
            .insert_notification("alice", "order.created", json!({"orderId": "o3"}), now)
            .unwrap();
        storage
            .insert_notification("bob", "order.status_changed", json!({"orderId": "o1"}), now)
            .unwrap();

        assert!(storage.mark_notification_sent("alice", a.id, now).unwrap());
        storage.mark_notification_read("alice", b.id, now).unwrap();

        let pending = storage.pending_notifications("alice").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, c.id);
    }

    #[test]
    fn test_list_newest_first_with_paging() {
        let storage = Storage::open_in_memory().unwrap();
        let now = Utc::now();
        let ids: Vec<u64> = (0..5)
            .map(|i| {
                storage
                    .insert_notification("alice", "order.created", json!({ "n": i }), now)
                    .unwrap()
                    .id
            })
            .collect();

        let page = storage.list_notifications("alice", 2, 1).unwrap();
        let got: Vec<u64> = page.iter().map(|n| n.id).collect();
        assert_eq!(got, vec![ids[3], ids[2]]);
    }

    #[test]
    fn test_read_is_scoped_to_recipient() {
        let storage = Storage::open_in_memory().unwrap();
        let now = Utc::now();
        let n = storage
            .insert_notification("alice", "order.created", json!({}), now)
            .unwrap();
        assert!(storage.mark_notification_read("bob", n.id, now).unwrap().is_none());
        assert_eq!(storage.mark_all_notifications_read("alice", now).unwrap(), 1);
        assert_eq!(storage.mark_all_notifications_read("alice", now).unwrap(), 0);
    }
}
