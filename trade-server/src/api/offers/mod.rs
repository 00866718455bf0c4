//! Offer API Module
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /api/offers | GET | 浏览上架挂单 | 无 |
//! | /api/offers/{id} | GET | 挂单详情 | 无 |
//! | /api/offers | POST | 创建挂单 (默认下架) | 需要 |
//! | /api/offers/mine | GET | 我的挂单 (`?enabled=`) | 需要 |
//! | /api/offers/{id} | PUT | 修改交易条款 | 需要 |
//! | /api/offers/{id} | DELETE | 删除 (无关联订单时) | 需要 |
//! | /api/offers/{id}/enable | POST | 上架 | 需要 |
//! | /api/offers/{id}/disable | POST | 下架 | 需要 |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/offers", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::browse).post(handler::create))
        .route("/mine", get(handler::list_mine))
        .route(
            "/{id}",
            get(handler::get_by_id)
                .put(handler::update)
                .delete(handler::delete),
        )
        .route("/{id}/enable", post(handler::enable))
        .route("/{id}/disable", post(handler::disable))
}
