//! Notification Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 持久化的通知
///
/// `sent_at` 只在成功推送后写入；未推送的通知会在下次订阅时补发。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: u64,
    /// Recipient
    pub client_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
    pub sent_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Neither pushed nor read yet
    pub fn is_pending(&self) -> bool {
        self.sent_at.is_none() && self.read_at.is_none()
    }
}
