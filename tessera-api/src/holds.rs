use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tessera_hold::{Hold, ReleaseReceipt};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct AcquireHoldRequest {
    owner_token: String,
    /// unit_id -> quantity
    unit_refs: BTreeMap<Uuid, u32>,
    ttl_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RenewHoldRequest {
    owner_token: Option<String>,
    ttl_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ReleaseHoldParams {
    owner_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct HoldResponse {
    hold: Hold,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/holds", post(acquire_hold))
        .route("/v1/holds/{hold_id}/renew", post(renew_hold))
        .route("/v1/holds/{hold_id}/consume", post(consume_hold))
        .route("/v1/holds/{hold_id}", delete(release_hold))
}

async fn acquire_hold(
    State(state): State<AppState>,
    Json(req): Json<AcquireHoldRequest>,
) -> Result<(StatusCode, Json<HoldResponse>), ApiError> {
    let ttl = req.ttl_seconds.map(Duration::seconds);
    let hold = state.holds.acquire(&req.owner_token, req.unit_refs, ttl)?;
    Ok((StatusCode::CREATED, Json(HoldResponse { hold })))
}

async fn renew_hold(
    State(state): State<AppState>,
    Path(hold_id): Path<Uuid>,
    Json(req): Json<RenewHoldRequest>,
) -> Result<Json<HoldResponse>, ApiError> {
    let ttl = req.ttl_seconds.map(Duration::seconds);
    let hold = match req.owner_token {
        Some(owner) => state.holds.renew_owned(hold_id, &owner, ttl)?,
        None => state.holds.renew(hold_id, ttl)?,
    };
    Ok(Json(HoldResponse { hold }))
}

async fn release_hold(
    State(state): State<AppState>,
    Path(hold_id): Path<Uuid>,
    Query(params): Query<ReleaseHoldParams>,
) -> Result<Json<ReleaseReceipt>, ApiError> {
    let receipt = match params.owner_token {
        Some(owner) => state.holds.release_owned(hold_id, &owner)?,
        None => state.holds.release(hold_id)?,
    };
    Ok(Json(receipt))
}

async fn consume_hold(
    State(state): State<AppState>,
    Path(hold_id): Path<Uuid>,
    Json(req): Json<RenewHoldRequest>,
) -> Result<Json<HoldResponse>, ApiError> {
    let hold = match req.owner_token {
        Some(owner) => state.holds.consume_owned(hold_id, &owner)?,
        None => state.holds.consume(hold_id)?,
    };
    Ok(Json(HoldResponse { hold }))
}
