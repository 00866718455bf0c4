//! Order API Module
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/orders | POST | 下单 |
//! | /api/orders | GET | 我的订单 (`role`, `limit`, `offset`) |
//! | /api/orders/{id} | GET | 订单详情 (双方 + 仲裁员) |
//! | /api/orders/{id}/actions | GET | 当前可执行的操作 |
//! | /api/orders/{id}/paid | POST | 标记已付款 |
//! | /api/orders/{id}/cancel | POST | 取消 |
//! | /api/orders/{id}/dispute | POST | 发起争议 |
//! | /api/orders/{id}/release | POST | 放币 |
//! | /api/orders/{id}/dispute/resolve | POST | 仲裁 |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create).get(handler::list))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/actions", get(handler::actions))
        .route("/{id}/paid", post(handler::mark_paid))
        .route("/{id}/cancel", post(handler::cancel))
        .route("/{id}/dispute", post(handler::open_dispute))
        .route("/{id}/release", post(handler::release))
        .route("/{id}/dispute/resolve", post(handler::resolve_dispute))
}
