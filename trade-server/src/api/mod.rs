//! HTTP / WebSocket API
//!
//! 每个资源一个子模块，各自提供 `router()`，在 [`build_router`] 中合并。
//! 认证由 [`CurrentClient`](crate::auth::CurrentClient) 提取器按 handler 完成，
//! 不带它的路由 (health, offer 浏览) 是公开的。

use axum::Router;
use axum::routing::get;
use http::{HeaderName, HeaderValue};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::core::ServerState;

pub mod chat;
pub mod health;
pub mod notifications;
pub mod offers;
pub mod orders;
pub mod ws;

#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

fn ws_router() -> Router<ServerState> {
    Router::new()
        .route("/ws/orders", get(ws::order_created_ws))
        .route("/ws/orders/{id}/status", get(ws::order_status_ws))
        .route("/ws/orders/{id}/chat", get(ws::order_chat_ws))
        .route("/ws/notifications", get(ws::notifications_ws))
        .route("/ws/offers", get(ws::offers_ws))
}

/// Build the application with all routes, middleware and state
pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .merge(orders::router())
        .merge(chat::router())
        .merge(offers::router())
        .merge(notifications::router())
        .merge(ws_router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static("x-request-id"),
            XRequestId,
        ))
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            "x-request-id",
        )))
        .with_state(state)
}
