//! Order Chat API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::error::{ApiResponse, AppResult};
use shared::models::{ChatMessage, MessageCreate};

use crate::auth::CurrentClient;
use crate::chat::MessagePage;
use crate::core::ServerState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub read_at: Option<DateTime<Utc>>,
}

pub async fn list(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(order_id): Path<String>,
    Query(page): Query<MessagePage>,
) -> AppResult<ApiResponse<Vec<ChatMessage>>> {
    let messages = state.chat.list_messages(&client.id, &order_id, &page)?;
    Ok(ApiResponse::success(messages))
}

pub async fn post(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(order_id): Path<String>,
    Json(payload): Json<MessageCreate>,
) -> AppResult<ApiResponse<ChatMessage>> {
    let message = state.chat.post_message(&client.id, &order_id, payload).await?;
    Ok(ApiResponse::success(message))
}

pub async fn mark_read(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path((order_id, message_id)): Path<(String, u64)>,
    payload: Option<Json<ReadReceipt>>,
) -> AppResult<ApiResponse<ChatMessage>> {
    let read_at = payload.and_then(|Json(p)| p.read_at);
    let message = state
        .chat
        .mark_read(&client.id, &order_id, message_id, read_at)
        .await?;
    Ok(ApiResponse::success(message))
}
