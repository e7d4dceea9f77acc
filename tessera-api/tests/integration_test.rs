use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tessera_api::app_config::BusinessRules;
use tessera_api::{app, AppState};
use tower::util::ServiceExt;
use uuid::Uuid;

fn test_state() -> AppState {
    AppState::build(BusinessRules {
        hold_ttl_seconds: 600,
        sweep_interval_seconds: 15,
        tax_rate: 0.0,
        booking_fee: 0,
        currency: "USD".to_string(),
    })
}

async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register_event_unit(state: &AppState, total_capacity: u32, unit_price: i64) -> Uuid {
    let (status, body) = send(
        state,
        "POST",
        "/v1/admin/units",
        Some(json!({
            "product_type": "EVENT",
            "parent_id": Uuid::new_v4(),
            "total_capacity": total_capacity,
            "unit_price": unit_price,
            "pricing": { "product": "EVENT", "ticket_modifier": 1.0 },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["unit_id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_health() {
    let state = test_state();
    let (status, _) = send(&state, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_hold_acquire_conflict_release() {
    let state = test_state();
    let unit_id = register_event_unit(&state, 3, 5000).await;

    // acquire 2 of 3
    let (status, body) = send(
        &state,
        "POST",
        "/v1/holds",
        Some(json!({
            "owner_token": "client-a",
            "unit_refs": { (unit_id.to_string()): 2 },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let hold_id = body["hold"]["hold_id"].as_str().unwrap().to_string();

    let (status, body) = send(&state, "GET", &format!("/v1/units/{unit_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available_capacity"], 1);

    // a second client asking for 2 more gets a structured conflict
    let (status, body) = send(
        &state,
        "POST",
        "/v1/holds",
        Some(json!({
            "owner_token": "client-b",
            "unit_refs": { (unit_id.to_string()): 2 },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["available"], 1);
    assert_eq!(body["requested"], 2);

    // release restores availability; repeating it is harmless
    let (status, body) = send(&state, "DELETE", &format!("/v1/holds/{hold_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released_count"], 2);

    let (_, body) = send(&state, "DELETE", &format!("/v1/holds/{hold_id}"), None).await;
    assert_eq!(body["released_count"], 0);

    let (_, body) = send(&state, "GET", &format!("/v1/units/{unit_id}"), None).await;
    assert_eq!(body["available_capacity"], 3);
}

#[tokio::test]
async fn test_owner_mismatch_is_forbidden() {
    let state = test_state();
    let unit_id = register_event_unit(&state, 3, 5000).await;

    let (_, body) = send(
        &state,
        "POST",
        "/v1/holds",
        Some(json!({
            "owner_token": "client-a",
            "unit_refs": { (unit_id.to_string()): 1 },
        })),
    )
    .await;
    let hold_id = body["hold"]["hold_id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &state,
        "DELETE",
        &format!("/v1/holds/{hold_id}?owner_token=client-b"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_round_trip_transfer_quote() {
    let state = test_state();
    let route_id = Uuid::new_v4();

    let (status, _) = send(
        &state,
        "POST",
        "/v1/admin/units",
        Some(json!({
            "product_type": "TRANSFER",
            "parent_id": route_id,
            "total_capacity": 5,
            "unit_price": 10000,
            "pricing": {
                "product": "TRANSFER",
                "brackets": [
                    { "start_hour": 6, "end_hour": 11, "surcharge_pct": 10.0 },
                    { "start_hour": 16, "end_hour": 21, "surcharge_pct": 15.0 },
                ],
                "round_trip_discount_pct": 20.0,
            },
            "route": { "route_id": route_id, "vehicle": "VAN" },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // resolved through the route + vehicle selector
    let (status, body) = send(
        &state,
        "POST",
        "/v1/pricing/quote",
        Some(json!({
            "selector": { "route_id": route_id, "vehicle": "VAN" },
            "quantity": 3,
            "trip_type": "ROUND_TRIP",
            "outbound_hour": 9,
            "return_hour": 18,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // 100 + 10% outbound, 100 + 15% return, combined 225 minus 20% -> 180
    assert_eq!(body["final_price"], 18000);
    assert_eq!(body["base_price"], 20000);
}

#[tokio::test]
async fn test_invalid_discount_rejected() {
    let state = test_state();
    let unit_id = register_event_unit(&state, 10, 5000).await;

    let (status, body) = send(
        &state,
        "POST",
        "/v1/pricing/quote",
        Some(json!({
            "selector": { "unit_id": unit_id },
            "quantity": 1,
            "discount_code": "BOGUS",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "BOGUS");
}

#[tokio::test]
async fn test_session_flow_over_http() {
    let state = test_state();
    let parent_id = Uuid::new_v4();

    let (_, body) = send(
        &state,
        "POST",
        "/v1/admin/units",
        Some(json!({
            "product_type": "EVENT",
            "parent_id": parent_id,
            "total_capacity": 10,
            "unit_price": 8000,
            "pricing": { "product": "EVENT", "ticket_modifier": 1.0 },
        })),
    )
    .await;
    let unit_id = body["unit_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &state,
        "POST",
        "/v1/sessions",
        Some(json!({ "owner_token": "client-a" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = body["session_id"].as_str().unwrap().to_string();

    // advancing without a product reports the missing field
    let (status, body) = send(
        &state,
        "POST",
        &format!("/v1/sessions/{session_id}/advance"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["missing"][0], "product_type");

    for patch in [
        json!({ "field": "PRODUCT", "value": "EVENT" }),
        json!({ "field": "PARENT", "value": parent_id }),
        json!({ "field": "UNIT", "value": unit_id }),
    ] {
        let (status, _) = send(
            &state,
            "PATCH",
            &format!("/v1/sessions/{session_id}/selection"),
            Some(patch),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(
        &state,
        "PATCH",
        &format!("/v1/sessions/{session_id}/selection"),
        Some(json!({ "field": "QUANTITY", "value": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["active_hold_id"].is_string());
    assert_eq!(body["last_breakdown"]["final_price"], 16000);

    // abandoning returns the capacity
    let (status, _) = send(
        &state,
        "DELETE",
        &format!("/v1/sessions/{session_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&state, "GET", &format!("/v1/units/{unit_id}"), None).await;
    assert_eq!(body["available_capacity"], 10);
}
