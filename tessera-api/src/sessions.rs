use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use tessera_session::{CheckoutPayload, SelectionPatch, SessionSnapshot};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    owner_token: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/sessions", post(create_session))
        .route(
            "/v1/sessions/{session_id}",
            get(get_session).delete(abandon_session),
        )
        .route("/v1/sessions/{session_id}/advance", post(advance_session))
        .route("/v1/sessions/{session_id}/retreat", post(retreat_session))
        .route("/v1/sessions/{session_id}/selection", patch(mutate_selection))
        .route("/v1/sessions/{session_id}/checkout", post(checkout_session))
}

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> (StatusCode, Json<SessionSnapshot>) {
    let session = state.sessions.create(&req.owner_token);
    (StatusCode::CREATED, Json(session))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state.sessions.get(session_id).await?;
    Ok(Json(session))
}

async fn advance_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state.sessions.advance(session_id).await?;
    Ok(Json(session))
}

async fn retreat_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state.sessions.retreat(session_id).await?;
    Ok(Json(session))
}

async fn mutate_selection(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(patch): Json<SelectionPatch>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state.sessions.mutate_selection(session_id, patch).await?;
    Ok(Json(session))
}

async fn checkout_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<CheckoutPayload>, ApiError> {
    let payload = state.sessions.checkout(session_id).await?;
    Ok(Json(payload))
}

async fn abandon_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.sessions.abandon(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
