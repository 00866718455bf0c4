//! Notification API Module
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/notifications | GET | 我的通知 (`limit`, `offset`) |
//! | /api/notifications/{id}/read | POST | 标记已读 |
//! | /api/notifications/read-all | POST | 全部已读 |

mod handler;

use axum::{Router, routing::{get, post}};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/notifications", get(handler::list))
        .route("/api/notifications/read-all", post(handler::mark_all_read))
        .route("/api/notifications/{id}/read", post(handler::mark_read))
}
