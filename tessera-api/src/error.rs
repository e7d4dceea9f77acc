use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tessera_catalog::{CapacityError, PricingError};
use tessera_hold::HoldError;
use tessera_session::SessionError;

#[derive(Debug)]
pub enum ApiError {
    Hold(HoldError),
    Pricing(PricingError),
    Session(SessionError),
    Capacity(CapacityError),
    Anyhow(anyhow::Error),
}

impl From<HoldError> for ApiError {
    fn from(err: HoldError) -> Self {
        Self::Hold(err)
    }
}

impl From<PricingError> for ApiError {
    fn from(err: PricingError) -> Self {
        Self::Pricing(err)
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

impl From<CapacityError> for ApiError {
    fn from(err: CapacityError) -> Self {
        Self::Capacity(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Hold(err) => hold_response(err),
            ApiError::Pricing(err) => pricing_response(err),
            ApiError::Session(err) => session_response(err),
            ApiError::Capacity(err) => capacity_response(err),
            ApiError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

fn hold_response(err: HoldError) -> (StatusCode, serde_json::Value) {
    match &err {
        HoldError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": err.to_string() })),
        HoldError::AlreadyExpired(_) => (StatusCode::GONE, json!({ "error": err.to_string() })),
        HoldError::PartiallyUnavailable {
            unit_id,
            requested,
            available,
        } => (
            StatusCode::CONFLICT,
            json!({
                "error": err.to_string(),
                "unit_id": unit_id,
                "requested": requested,
                "available": available,
            }),
        ),
        HoldError::OwnerMismatch(_) => {
            (StatusCode::FORBIDDEN, json!({ "error": err.to_string() }))
        }
        HoldError::UnknownUnit(_) => (StatusCode::NOT_FOUND, json!({ "error": err.to_string() })),
        HoldError::InvalidRequest(_) => {
            (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() }))
        }
        HoldError::Capacity(inner) => capacity_response_ref(inner, err.to_string()),
    }
}

fn pricing_response(err: PricingError) -> (StatusCode, serde_json::Value) {
    match &err {
        PricingError::InvalidQuantity(_) => {
            (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() }))
        }
        PricingError::UnknownUnit(_) | PricingError::UnknownRoute { .. } => {
            (StatusCode::NOT_FOUND, json!({ "error": err.to_string() }))
        }
        PricingError::InsufficientCapacity {
            unit_id,
            requested,
            available,
        } => (
            StatusCode::CONFLICT,
            json!({
                "error": err.to_string(),
                "unit_id": unit_id,
                "requested": requested,
                "available": available,
            }),
        ),
        PricingError::UnknownOption(_) => {
            (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() }))
        }
        PricingError::OptionQuantityExceeded {
            option_id,
            requested,
            max,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "error": err.to_string(),
                "option_id": option_id,
                "requested": requested,
                "max_quantity": max,
            }),
        ),
        PricingError::InvalidDiscount(code) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": err.to_string(), "code": code }),
        ),
    }
}

fn session_response(err: SessionError) -> (StatusCode, serde_json::Value) {
    match err {
        SessionError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": err.to_string() })),
        SessionError::InvalidTransition { ref missing, .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": err.to_string(), "missing": missing }),
        ),
        SessionError::StaleHold => (StatusCode::CONFLICT, json!({ "error": err.to_string() })),
        SessionError::Hold(inner) => hold_response(inner),
        SessionError::Pricing(inner) => pricing_response(inner),
    }
}

fn capacity_response(err: CapacityError) -> (StatusCode, serde_json::Value) {
    let message = err.to_string();
    capacity_response_ref(&err, message)
}

fn capacity_response_ref(err: &CapacityError, message: String) -> (StatusCode, serde_json::Value) {
    match err {
        CapacityError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": message })),
        CapacityError::Insufficient {
            unit_id,
            requested,
            available,
        } => (
            StatusCode::CONFLICT,
            json!({
                "error": message,
                "unit_id": unit_id,
                "requested": requested,
                "available": available,
            }),
        ),
        CapacityError::InvalidAdjustment { .. } => {
            (StatusCode::BAD_REQUEST, json!({ "error": message }))
        }
    }
}
