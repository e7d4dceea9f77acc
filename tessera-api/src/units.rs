use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tessera_catalog::InventoryUnit;
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct UnitResponse {
    #[serde(flatten)]
    unit: InventoryUnit,
    available_capacity: u32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/units/{unit_id}", get(get_unit))
        .route("/v1/units/{unit_id}/stream", get(stream_unit_events))
}

async fn get_unit(
    State(state): State<AppState>,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<UnitResponse>, ApiError> {
    let unit = state.ledger.get(unit_id)?;
    let available_capacity = unit.available_capacity();
    Ok(Json(UnitResponse {
        unit,
        available_capacity,
    }))
}

/// Server-sent stream of hold events touching one unit, so availability
/// views update without polling the ledger.
async fn stream_unit_events(
    State(state): State<AppState>,
    Path(unit_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.holds.subscribe();

    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(move |result| {
        async move {
            match result {
                Ok(event) => {
                    if event.unit_ids().any(|id| *id == unit_id) {
                        let data = serde_json::to_string(&event).ok()?;
                        Some(Ok(Event::default().event("hold_update").data(data)))
                    } else {
                        None
                    }
                }
                Err(_) => None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
