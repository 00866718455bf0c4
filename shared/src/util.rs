//! Small helpers shared by server and clients

use chrono::{DateTime, Utc};

/// Random resource id for orders, offers and chats
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Millisecond key for ordered storage indexes
pub fn millis_of(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}
