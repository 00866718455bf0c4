//! Order chat models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 每个订单最多一个聊天，首次读写时创建
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderChat {
    pub id: String,
    pub order_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    Text,
    File,
    System,
}

/// Chat message as stored and as pushed on the chat stream.
///
/// `id` grows with creation order and doubles as the pagination cursor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: u64,
    pub chat_id: String,
    pub client_id: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Post message payload; also the frame a client sends on the chat stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCreate {
    pub content: String,
    #[serde(default, rename = "type")]
    pub kind: MessageType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let msg = ChatMessage {
            id: 7,
            chat_id: "chat-1".into(),
            client_id: "alice".into(),
            kind: MessageType::Text,
            content: "hello".into(),
            created_at: Utc::now(),
            read_at: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        for key in ["id", "chatId", "clientId", "type", "content", "createdAt", "readAt"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["type"], "TEXT");
        assert!(json["readAt"].is_null());
    }

    #[test]
    fn test_message_create_defaults_to_text() {
        let req: MessageCreate = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert_eq!(req.kind, MessageType::Text);
    }
}
