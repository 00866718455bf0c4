//! redb-based storage for the trading engine
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` | Order rows |
//! | `open_orders` | `(expires_at_ms, order_id)` | `()` | WAIT_PAYMENT / PAID orders by deadline |
//! | `offers` | `offer_id` | `Offer` | Offers |
//! | `clients` | `client_id` | `Client` | Reference data |
//! | `assets` | `asset_id` | `Asset` | Reference data |
//! | `payment_methods` | `id` | `ClientPaymentMethod` | Reference data |
//! | `notifications` | `(client_id, id)` | `Notification` | Per-recipient notifications |
//! | `chats` | `order_id` | `OrderChat` | One chat per order |
//! | `messages` | `(chat_id, id)` | `ChatMessage` | Append-only chat log |
//! | `sequences` | name | `u64` | Id counters |
//!
//! Values are JSON-encoded.
//!
//! # Concurrency
//!
//! redb admits one write transaction at a time, so a read-compare-write
//! inside a single write transaction is atomic with respect to every other
//! writer. [`Storage::transition_order`] relies on this for compare-and-set.

mod chats;
mod notifications;
mod offers;
mod orders;
mod reference;

pub use offers::{DeleteOutcome, EnableOutcome};
pub use orders::CasOutcome;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// 按截止时间排序的未结订单索引，供过期扫描使用
const OPEN_ORDERS_TABLE: TableDefinition<(i64, &str), ()> = TableDefinition::new("open_orders");

const OFFERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("offers");

const CLIENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("clients");

const ASSETS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("assets");

const PAYMENT_METHODS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("payment_methods");

const NOTIFICATIONS_TABLE: TableDefinition<(&str, u64), &[u8]> =
    TableDefinition::new("notifications");

const CHATS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("chats");

const MESSAGES_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("messages");

const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequences");

const NOTIFICATION_SEQ: &str = "notification";
const MESSAGE_SEQ: &str = "message";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Trading storage backed by redb
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
}

impl Storage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests and ephemeral runs)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(OPEN_ORDERS_TABLE)?;
            let _ = write_txn.open_table(OFFERS_TABLE)?;
            let _ = write_txn.open_table(CLIENTS_TABLE)?;
            let _ = write_txn.open_table(ASSETS_TABLE)?;
            let _ = write_txn.open_table(PAYMENT_METHODS_TABLE)?;
            let _ = write_txn.open_table(NOTIFICATIONS_TABLE)?;
            let _ = write_txn.open_table(CHATS_TABLE)?;
            let _ = write_txn.open_table(MESSAGES_TABLE)?;
            let _ = write_txn.open_table(SEQUENCE_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Increment and return the named counter
    fn next_sequence(&self, txn: &WriteTransaction, name: &str) -> StorageResult<u64> {
        let mut table = txn.open_table(SEQUENCE_TABLE)?;
        let current = table.get(name)?.map(|guard| guard.value()).unwrap_or(0);
        let next = current + 1;
        table.insert(name, next)?;
        Ok(next)
    }

    /// Row counts per table, for the health endpoint
    pub fn stats(&self) -> StorageResult<StorageStats> {
        use redb::ReadableTableMetadata;

        let read_txn = self.db.begin_read()?;
        Ok(StorageStats {
            orders: read_txn.open_table(ORDERS_TABLE)?.len()?,
            open_orders: read_txn.open_table(OPEN_ORDERS_TABLE)?.len()?,
            offers: read_txn.open_table(OFFERS_TABLE)?.len()?,
            notifications: read_txn.open_table(NOTIFICATIONS_TABLE)?.len()?,
            messages: read_txn.open_table(MESSAGES_TABLE)?.len()?,
        })
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct StorageStats {
    pub orders: u64,
    pub open_orders: u64,
    pub offers: u64,
    pub notifications: u64,
    pub messages: u64,
}

/// Decode a JSON value stored in a `&[u8]` column
fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
pub(crate) mod fixtures;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_reopen_keeps_rows_and_deadline_index() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("trade.redb");
        let now = Utc::now();

        {
            let storage = Storage::open(&path).unwrap();
            fixtures::seed_world(&storage, now);
            storage
                .insert_order(&fixtures::order_fixture("ord-1", now, now + Duration::minutes(15)))
                .unwrap();
        }

        let storage = Storage::open(&path).unwrap();
        assert!(storage.get_order("ord-1").unwrap().is_some());
        let due = storage
            .find_expired_orders(now + Duration::minutes(16), 10)
            .unwrap();
        assert_eq!(due.len(), 1);

        let stats = storage.stats().unwrap();
        assert_eq!(stats.orders, 1);
        assert_eq!(stats.open_orders, 1);
        assert_eq!(stats.offers, 1);
    }
}
