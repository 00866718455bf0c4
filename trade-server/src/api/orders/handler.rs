//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::error::{ApiResponse, AppResult};
use shared::models::{DisputeResolve, Order, OrderAction, OrderCreate};
use shared::order::OrderView;

use crate::auth::CurrentClient;
use crate::core::ServerState;
use crate::orders::OrderListQuery;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPaidRequest {
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

pub async fn create(
    State(state): State<ServerState>,
    client: CurrentClient,
    Json(payload): Json<OrderCreate>,
) -> AppResult<ApiResponse<OrderView>> {
    let view = state.orders.create_order(&client.id, payload).await?;
    Ok(ApiResponse::success(view))
}

pub async fn list(
    State(state): State<ServerState>,
    client: CurrentClient,
    Query(query): Query<OrderListQuery>,
) -> AppResult<ApiResponse<Vec<Order>>> {
    let orders = state.orders.list_orders(&client.id, &query)?;
    Ok(ApiResponse::success(orders))
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<OrderView>> {
    Ok(ApiResponse::success(state.orders.get_order(&client.id, &id)?))
}

pub async fn actions(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<OrderAction>>> {
    Ok(ApiResponse::success(state.orders.get_actions(&client.id, &id)?))
}

pub async fn mark_paid(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(id): Path<String>,
    payload: Option<Json<MarkPaidRequest>>,
) -> AppResult<ApiResponse<OrderView>> {
    let paid_at = payload.and_then(|Json(p)| p.paid_at);
    let view = state.orders.mark_paid(&client.id, &id, paid_at).await?;
    Ok(ApiResponse::success(view))
}

pub async fn cancel(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(id): Path<String>,
    payload: Option<Json<ReasonRequest>>,
) -> AppResult<ApiResponse<OrderView>> {
    let reason = payload.and_then(|Json(p)| p.reason);
    let view = state.orders.cancel(&client.id, &id, reason).await?;
    Ok(ApiResponse::success(view))
}

pub async fn open_dispute(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(id): Path<String>,
    payload: Option<Json<ReasonRequest>>,
) -> AppResult<ApiResponse<OrderView>> {
    let reason = payload.and_then(|Json(p)| p.reason);
    let view = state.orders.open_dispute(&client.id, &id, reason).await?;
    Ok(ApiResponse::success(view))
}

pub async fn release(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<OrderView>> {
    let view = state.orders.release(&client.id, &id).await?;
    Ok(ApiResponse::success(view))
}

pub async fn resolve_dispute(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(id): Path<String>,
    Json(payload): Json<DisputeResolve>,
) -> AppResult<ApiResponse<OrderView>> {
    let view = state.orders.resolve_dispute(&client.id, &id, payload).await?;
    Ok(ApiResponse::success(view))
}
