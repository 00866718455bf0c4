//! Notification API Handlers

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use shared::error::{ApiResponse, AppResult};
use shared::models::Notification;

use crate::auth::CurrentClient;
use crate::core::ServerState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MarkedCount {
    pub updated: usize,
}

pub async fn list(
    State(state): State<ServerState>,
    client: CurrentClient,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<Notification>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let notifications =
        state
            .notifications
            .list(&client.id, limit, query.offset.unwrap_or(0))?;
    Ok(ApiResponse::success(notifications))
}

pub async fn mark_read(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(id): Path<u64>,
) -> AppResult<ApiResponse<Notification>> {
    Ok(ApiResponse::success(state.notifications.mark_read(&client.id, id)?))
}

pub async fn mark_all_read(
    State(state): State<ServerState>,
    client: CurrentClient,
) -> AppResult<ApiResponse<MarkedCount>> {
    let updated = state.notifications.mark_all_read(&client.id)?;
    Ok(ApiResponse::success(MarkedCount { updated }))
}
