use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tessera_catalog::{
    DiscountRule, InventoryUnit, Modifier, OptionDef, UnitPricing, VehicleClass,
};
use tessera_shared::ProductType;
use uuid::Uuid;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct RegisterUnitRequest {
    unit_id: Option<Uuid>,
    product_type: ProductType,
    parent_id: Uuid,
    total_capacity: u32,
    unit_price: i64,
    currency: Option<String>,
    #[serde(default)]
    is_premium: bool,
    #[serde(default)]
    is_accessible: bool,
    pricing: UnitPricing,
    #[serde(default)]
    options: Vec<OptionDef>,
    /// For transfer units: the route + vehicle this cell answers for
    route: Option<RouteBinding>,
}

#[derive(Debug, Deserialize)]
struct RouteBinding {
    route_id: Uuid,
    vehicle: VehicleClass,
}

#[derive(Debug, Deserialize)]
struct RegisterDiscountRequest {
    code: String,
    modifier: Modifier,
    valid_until: Option<DateTime<Utc>>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/units", post(register_unit))
        .route("/v1/admin/discounts", post(register_discount))
}

/// Seed a sellable cell: ledger counts plus the catalog entry pricing
/// resolves against. Re-registering an existing unit replaces both.
async fn register_unit(
    State(state): State<AppState>,
    Json(req): Json<RegisterUnitRequest>,
) -> Result<(StatusCode, Json<InventoryUnit>), ApiError> {
    let unit = InventoryUnit {
        unit_id: req.unit_id.unwrap_or_else(Uuid::new_v4),
        product_type: req.product_type,
        parent_id: req.parent_id,
        total_capacity: req.total_capacity,
        reserved_capacity: 0,
        sold_capacity: 0,
        unit_price: req.unit_price,
        currency: req
            .currency
            .unwrap_or_else(|| state.business_rules.currency.clone()),
        is_premium: req.is_premium,
        is_accessible: req.is_accessible,
        version: 0,
    };

    state.ledger.insert_unit(unit.clone());
    state
        .catalog
        .register_unit(unit.unit_id, req.pricing, req.options);
    if let Some(route) = req.route {
        state
            .catalog
            .register_transfer_route(route.route_id, route.vehicle, unit.unit_id);
    }

    tracing::info!(unit_id = %unit.unit_id, product = ?unit.product_type, "unit registered");
    Ok((StatusCode::CREATED, Json(unit)))
}

async fn register_discount(
    State(state): State<AppState>,
    Json(req): Json<RegisterDiscountRequest>,
) -> Result<StatusCode, ApiError> {
    state.rules.add_discount(DiscountRule {
        code: req.code,
        modifier: req.modifier,
        valid_until: req.valid_until,
    });
    Ok(StatusCode::CREATED)
}
