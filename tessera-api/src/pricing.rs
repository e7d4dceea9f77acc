use crate::error::ApiError;
use crate::state::AppState;
use axum::{extract::State, routing::post, Json, Router};
use tessera_catalog::{PricingBreakdown, PricingRequest};

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/pricing/quote", post(quote))
}

async fn quote(
    State(state): State<AppState>,
    Json(request): Json<PricingRequest>,
) -> Result<Json<PricingBreakdown>, ApiError> {
    let breakdown = state.pricing.calculate(&request).await?;
    Ok(Json(breakdown))
}
