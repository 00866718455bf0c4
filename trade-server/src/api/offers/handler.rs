//! Offer API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use shared::error::{ApiResponse, AppResult};
use shared::models::{Offer, OfferCreate, OfferFilter, OwnOffersQuery};

use crate::auth::CurrentClient;
use crate::core::ServerState;

pub async fn browse(
    State(state): State<ServerState>,
    Query(filter): Query<OfferFilter>,
) -> AppResult<ApiResponse<Vec<Offer>>> {
    Ok(ApiResponse::success(state.offers.browse(&filter)?))
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Offer>> {
    Ok(ApiResponse::success(state.offers.get_offer(&id)?))
}

pub async fn create(
    State(state): State<ServerState>,
    client: CurrentClient,
    Json(payload): Json<OfferCreate>,
) -> AppResult<ApiResponse<Offer>> {
    Ok(ApiResponse::success(state.offers.create_offer(&client.id, payload)?))
}

/// GET /api/offers/mine?enabled=
pub async fn list_mine(
    State(state): State<ServerState>,
    client: CurrentClient,
    Query(query): Query<OwnOffersQuery>,
) -> AppResult<ApiResponse<Vec<Offer>>> {
    Ok(ApiResponse::success(state.offers.list_own(&client.id, &query)?))
}

pub async fn update(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(id): Path<String>,
    Json(payload): Json<OfferCreate>,
) -> AppResult<ApiResponse<Offer>> {
    Ok(ApiResponse::success(
        state.offers.update_offer(&client.id, &id, payload)?,
    ))
}

pub async fn delete(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Offer>> {
    Ok(ApiResponse::success(state.offers.delete_offer(&client.id, &id)?))
}

pub async fn enable(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Offer>> {
    Ok(ApiResponse::success(state.offers.enable(&client.id, &id)?))
}

pub async fn disable(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Offer>> {
    Ok(ApiResponse::success(state.offers.disable(&client.id, &id)?))
}
