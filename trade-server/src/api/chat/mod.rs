//! Order Chat API Module
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/orders/{id}/messages | GET | 历史消息 (`cursor`, `after`, `limit`) |
//! | /api/orders/{id}/messages | POST | 发送消息 |
//! | /api/orders/{id}/messages/{msg_id}/read | POST | 已读回执 |

mod handler;

use axum::{Router, routing::{get, post}};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route(
            "/api/orders/{id}/messages",
            get(handler::list).post(handler::post),
        )
        .route(
            "/api/orders/{id}/messages/{msg_id}/read",
            post(handler::mark_read),
        )
}
