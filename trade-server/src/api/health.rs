//! Health check endpoint

use axum::Json;
use axum::extract::State;

use crate::core::ServerState;

pub async fn health_check(State(state): State<ServerState>) -> Json<serde_json::Value> {
    let storage = match state.storage.stats() {
        Ok(stats) => serde_json::json!(stats),
        Err(e) => {
            tracing::warn!(error = %e, "Storage stats unavailable");
            serde_json::Value::Null
        }
    };

    Json(serde_json::json!({
        "status": if storage.is_null() { "degraded" } else { "ok" },
        "service": "trade-server",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "storage": storage,
        "subscribers": {
            "orders": state.orders.total_stream_subscribers(),
            "chat": state.chat.total_subscribers(),
            "notifications": state.notifications.total_subscribers(),
            "offers": state.offers.feed_subscribers(),
        },
    }))
}
