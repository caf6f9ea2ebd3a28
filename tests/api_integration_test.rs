mod common;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Utc};
use common::{body_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn health_reports_database_up() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn created_order_round_trips_start_in_utc() {
    let app = TestApp::new().await;
    let product = app.seed_product("Gearbox", 10, &[]).await;
    let line = app.seed_line("Line A", 2.0).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "productId": product.id,
                "quantity": 5,
                "productionLineId": line.id,
                "startDate": "2025-03-14T10:00:00+02:00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["status"], "Pending");

    let id = created["id"].as_i64().unwrap();
    let fetched = body_json(
        app.request(Method::GET, &format!("/api/orders/{}", id), None)
            .await,
    )
    .await;

    let start: DateTime<Utc> = fetched["startDate"].as_str().unwrap().parse().unwrap();
    let end: DateTime<Utc> = fetched["estimatedEndDate"].as_str().unwrap().parse().unwrap();
    assert_eq!(start, "2025-03-14T08:00:00Z".parse::<DateTime<Utc>>().unwrap());
    assert_eq!(end, "2025-03-14T09:40:00Z".parse::<DateTime<Utc>>().unwrap());
}

#[tokio::test]
async fn unzoned_start_is_read_as_utc() {
    let app = TestApp::new().await;
    let product = app.seed_product("Gearbox", 1, &[]).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "productId": product.id,
                "quantity": 1,
                "startDate": "2025-03-14T10:00:00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    let start: DateTime<Utc> = body["startDate"].as_str().unwrap().parse().unwrap();
    assert_eq!(start, "2025-03-14T10:00:00Z".parse::<DateTime<Utc>>().unwrap());
}

#[tokio::test]
async fn invalid_quantity_is_a_field_error() {
    let app = TestApp::new().await;
    let product = app.seed_product("Gearbox", 1, &[]).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "productId": product.id, "quantity": 0 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["errors"][0]["field"], "quantity");
    assert!(body["requestId"].is_string());
}

#[tokio::test]
async fn insufficient_material_is_a_bad_request() {
    let app = TestApp::new().await;
    let steel = app.seed_material("Steel", dec!(1), dec!(0)).await;
    let product = app.seed_product("Frame", 1, &[(steel.id, dec!(3))]).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "productId": product.id, "quantity": 1 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let listed = body_json(app.request(Method::GET, "/api/orders", None).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn missing_work_order_is_not_found() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/orders/999", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn active_filter_excludes_finished_orders() {
    let app = TestApp::new().await;
    let product = app.seed_product("Gearbox", 1, &[]).await;

    for _ in 0..2 {
        app.request(
            Method::POST,
            "/api/orders",
            Some(json!({ "productId": product.id, "quantity": 1 })),
        )
        .await;
    }
    let cancel = app.request(Method::POST, "/api/orders/1/cancel", None).await;
    assert_eq!(cancel.status(), StatusCode::OK);

    let active = body_json(app.request(Method::GET, "/api/orders?status=active", None).await).await;
    assert_eq!(active.as_array().unwrap().len(), 1);
    assert_eq!(active[0]["id"], 2);

    let cancelled =
        body_json(app.request(Method::GET, "/api/orders?status=Cancelled", None).await).await;
    assert_eq!(cancelled.as_array().unwrap().len(), 1);

    let bad = app.request(Method::GET, "/api/orders?status=paused", None).await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn line_status_accepts_only_exact_names() {
    let app = TestApp::new().await;
    let line = app.seed_line("Line A", 1.0).await;
    let uri = format!("/api/lines/{}/status", line.id);

    let ok = app.request(Method::PUT, &uri, Some(json!("Active"))).await;
    assert_eq!(ok.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.line(line.id).await.status.to_string(), "Active");

    let bad = app.request(Method::PUT, &uri, Some(json!("Running"))).await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    let missing = app
        .request(Method::PUT, "/api/lines/999/status", Some(json!("Stopped")))
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn available_lines_are_active_and_free() {
    let app = TestApp::new().await;
    let free = app.seed_line("Free", 1.0).await;
    app.seed_line("Idle", 1.0).await;
    app.request(
        Method::PUT,
        &format!("/api/lines/{}/status", free.id),
        Some(json!("Active")),
    )
    .await;

    let body = body_json(app.request(Method::GET, "/api/lines?available=true", None).await).await;
    let lines = body.as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["name"], "Free");
    assert_eq!(lines[0]["isAvailable"], true);
}

#[tokio::test]
async fn efficiency_outside_bounds_is_rejected() {
    let app = TestApp::new().await;
    let line = app.seed_line("Line A", 1.0).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/lines/{}/efficiency", line.id),
            Some(json!({ "efficiencyFactor": 2.5 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stale_line_version_is_a_conflict() {
    let app = TestApp::new().await;
    let line = app.seed_line("Line A", 1.0).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/lines/{}/efficiency", line.id),
            Some(json!({ "efficiencyFactor": 1.5, "version": line.version + 7 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn stock_updates_and_low_stock_filter() {
    let app = TestApp::new().await;
    let steel = app.seed_material("Steel", dec!(5), dec!(10)).await;
    app.seed_material("Copper", dec!(50), dec!(10)).await;

    let low = body_json(app.request(Method::GET, "/api/materials?low_stock=true", None).await).await;
    assert_eq!(low.as_array().unwrap().len(), 1);
    assert_eq!(low[0]["name"], "Steel");

    let negative = app
        .request(
            Method::PUT,
            &format!("/api/materials/{}/stock", steel.id),
            Some(json!(-1)),
        )
        .await;
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);

    let set = app
        .request(
            Method::PUT,
            &format!("/api/materials/{}/stock", steel.id),
            Some(json!(12.5)),
        )
        .await;
    assert_eq!(set.status(), StatusCode::OK);
    assert_eq!(app.material(steel.id).await.quantity, dec!(12.5));

    let missing = app
        .request(Method::PUT, "/api/materials/999/stock", Some(json!(1)))
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn replenish_defaults_to_fifty() {
    let app = TestApp::new().await;
    let steel = app.seed_material("Steel", dec!(5), dec!(10)).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/materials/{}/replenish", steel.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.material(steel.id).await.quantity, dec!(55));

    let zero = app
        .request(
            Method::POST,
            &format!("/api/materials/{}/replenish", steel.id),
            Some(json!({ "amount": 0 })),
        )
        .await;
    assert_eq!(zero.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn product_without_bom_has_no_materials() {
    let app = TestApp::new().await;
    let bare = app.seed_product("Bare", 1, &[]).await;
    let steel = app.seed_material("Steel", dec!(5), dec!(0)).await;
    let framed = app.seed_product("Framed", 1, &[(steel.id, dec!(2))]).await;

    let none = app
        .request(Method::GET, &format!("/api/products/{}/materials", bare.id), None)
        .await;
    assert_eq!(none.status(), StatusCode::NOT_FOUND);

    let some = body_json(
        app.request(Method::GET, &format!("/api/products/{}/materials", framed.id), None)
            .await,
    )
    .await;
    assert_eq!(some[0]["materialName"], "Steel");
}

#[tokio::test]
async fn product_search_is_case_insensitive() {
    let app = TestApp::new().await;
    app.seed_product("Steel Frame", 1, &[]).await;
    app.seed_product("Gearbox", 1, &[]).await;

    let body = body_json(app.request(Method::GET, "/api/products?search=FRAME", None).await).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "Steel Frame");
}

#[tokio::test]
async fn calculate_reports_untruncated_minutes() {
    let app = TestApp::new().await;
    let steel = app.seed_material("Steel", dec!(100), dec!(0)).await;
    let product = app.seed_product("Frame", 3, &[(steel.id, dec!(2))]).await;
    let line = app.seed_line("Line A", 0.75).await;

    let response = app
        .request(
            Method::POST,
            "/api/calculate/production",
            Some(json!({ "productId": product.id, "quantity": 1, "productionLineId": line.id })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["totalProductionTimeInMinutes"], 2.25);
    assert_eq!(body["materials"][0]["isSufficient"], true);
}

#[tokio::test]
async fn calculate_rejects_bad_requests() {
    let app = TestApp::new().await;
    let steel = app.seed_material("Steel", dec!(1), dec!(0)).await;
    let product = app.seed_product("Frame", 3, &[(steel.id, dec!(2))]).await;

    let zero = app
        .request(
            Method::POST,
            "/api/calculate/production",
            Some(json!({ "productId": product.id, "quantity": 0 })),
        )
        .await;
    assert_eq!(zero.status(), StatusCode::BAD_REQUEST);

    let missing = app
        .request(
            Method::POST,
            "/api/calculate/production",
            Some(json!({ "productId": 999, "quantity": 1 })),
        )
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let short = app
        .request(
            Method::POST,
            "/api/calculate/production",
            Some(json!({ "productId": product.id, "quantity": 1 })),
        )
        .await;
    assert_eq!(short.status(), StatusCode::BAD_REQUEST);
    let body = body_json(short).await;
    assert!(body["message"].as_str().unwrap().contains("Steel"));
}

#[tokio::test]
async fn dashboard_shows_running_line() {
    let app = TestApp::new().await;
    let product = app.seed_product("Gearbox", 30, &[]).await;
    let line = app.seed_line("Line A", 1.0).await;

    let started = app
        .request(
            Method::POST,
            &format!("/api/lines/{}/start", line.id),
            Some(json!({ "productId": product.id, "quantity": 2 })),
        )
        .await;
    assert_eq!(started.status(), StatusCode::CREATED);

    let body = body_json(app.request(Method::GET, "/api/dashboard", None).await).await;
    assert_eq!(body["lines"][0]["line"]["status"], "Active");
    assert_eq!(body["lines"][0]["currentOrder"]["productName"], "Gearbox");
    assert_eq!(body["statusCounts"]["inProgress"], 1);
    assert_eq!(body["reconciledOrders"], 0);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["paths"]["/api/dashboard"].is_object());
}

#[tokio::test]
async fn reschedule_normalises_the_new_start_to_utc() {
    let app = TestApp::new().await;
    let product = app.seed_product("Pump", 10, &[]).await;
    let line = app.seed_line("Line A", 1.5).await;

    let created = body_json(
        app.request(
            Method::POST,
            "/api/orders",
            Some(json!({ "productId": product.id, "quantity": 2, "productionLineId": line.id })),
        )
        .await,
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/orders/{}/reschedule", id),
            Some(json!({ "startDate": "2025-06-01T12:00:00-04:00" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let start: DateTime<Utc> = body["startDate"].as_str().unwrap().parse().unwrap();
    let end: DateTime<Utc> = body["estimatedEndDate"].as_str().unwrap().parse().unwrap();
    assert_eq!(start, "2025-06-01T16:00:00Z".parse::<DateTime<Utc>>().unwrap());
    assert_eq!(end, "2025-06-01T16:30:00Z".parse::<DateTime<Utc>>().unwrap());
}

#[tokio::test]
async fn malformed_start_body_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("Pump", 10, &[]).await;
    let line = app.seed_line("Line A", 1.0).await;
    let order = app
        .state
        .services
        .work_orders
        .create(production_console::services::work_orders::CreateWorkOrderRequest {
            product_id: product.id,
            quantity: 1,
            production_line_id: Some(line.id),
            start_date: None,
        })
        .await
        .unwrap();

    let response = app
        .request_raw(
            Method::POST,
            &format!("/api/orders/{}/start", order.id),
            r#"{"productionLineId": "#,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.order(order.id).await.status.to_string(), "Pending");
    assert_eq!(app.line(line.id).await.current_work_order_id, None);

    let started = app
        .request(Method::POST, &format!("/api/orders/{}/start", order.id), None)
        .await;
    assert_eq!(started.status(), StatusCode::OK);
}

#[tokio::test]
async fn material_edit_moves_the_low_stock_threshold() {
    let app = TestApp::new().await;
    let steel = app.seed_material("Steel", dec!(20), dec!(5)).await;

    let before = body_json(app.request(Method::GET, "/api/materials?low_stock=true", None).await).await;
    assert_eq!(before.as_array().unwrap().len(), 0);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/materials/{}", steel.id),
            Some(json!({ "name": "Sheet steel", "unitOfMeasure": "t", "minimalStock": 25 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "Sheet steel");
    assert_eq!(body["isLowStock"], true);

    let material = app.material(steel.id).await;
    assert_eq!(material.quantity, dec!(20));
    assert_eq!(material.minimal_stock, dec!(25));
    assert_eq!(material.unit_of_measure, "t");

    let after = body_json(app.request(Method::GET, "/api/materials?low_stock=true", None).await).await;
    assert_eq!(after[0]["id"], steel.id);

    let invalid = app
        .request(
            Method::PUT,
            &format!("/api/materials/{}", steel.id),
            Some(json!({ "name": "Steel", "unitOfMeasure": "kg", "minimalStock": -1 })),
        )
        .await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    let body = body_json(invalid).await;
    assert_eq!(body["errors"][0]["field"], "minimalStock");
}

#[tokio::test]
async fn line_rename_is_version_guarded() {
    let app = TestApp::new().await;
    let line = app.seed_line("Line A", 1.0).await;
    let uri = format!("/api/lines/{}", line.id);

    let renamed = app
        .request(
            Method::PUT,
            &uri,
            Some(json!({ "name": "Assembly 1", "version": line.version })),
        )
        .await;
    assert_eq!(renamed.status(), StatusCode::OK);
    let body = body_json(renamed).await;
    assert_eq!(body["name"], "Assembly 1");
    assert_eq!(body["version"], line.version + 1);

    let stale = app
        .request(
            Method::PUT,
            &uri,
            Some(json!({ "name": "Assembly 2", "version": line.version })),
        )
        .await;
    assert_eq!(stale.status(), StatusCode::CONFLICT);
    assert_eq!(app.line(line.id).await.name, "Assembly 1");

    let missing = app
        .request(Method::PUT, "/api/lines/999", Some(json!({ "name": "Ghost" })))
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
