#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::{DateTime, Utc};
use production_console::{
    config::AppConfig,
    db::{self, DbConfig},
    entities::{material, product, production_line, work_order},
    events::{self, EventSender},
    services::{
        materials::CreateMaterialRequest,
        production_lines::CreateLineRequest,
        products::{BomEntryInput, ProductRequest},
    },
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;

/// Application state and router over a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_with_config(&DbConfig::in_memory())
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx));
        let router = production_console::app_router(state.clone(), CorsLayer::permissive());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Send a request against the router, with an optional JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send a request whose body is sent verbatim as JSON.
    pub async fn request_raw(&self, method: Method, uri: &str, body: &str) -> axum::response::Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_material(&self, name: &str, quantity: Decimal, minimal: Decimal) -> material::Model {
        self.state
            .services
            .materials
            .create(CreateMaterialRequest {
                name: name.to_string(),
                quantity,
                unit_of_measure: "kg".to_string(),
                minimal_stock: minimal,
            })
            .await
            .expect("seed material")
    }

    /// A product whose BOM lists `(material_id, per-unit quantity)` pairs.
    pub async fn seed_product(
        &self,
        name: &str,
        minutes_per_unit: i32,
        bom: &[(i32, Decimal)],
    ) -> product::Model {
        self.state
            .services
            .products
            .create(ProductRequest {
                name: name.to_string(),
                description: None,
                specifications: None,
                category: "Assemblies".to_string(),
                minimal_stock: 0,
                production_time_per_unit: minutes_per_unit,
                materials: bom
                    .iter()
                    .map(|(material_id, quantity_needed)| BomEntryInput {
                        material_id: *material_id,
                        quantity_needed: *quantity_needed,
                    })
                    .collect(),
            })
            .await
            .expect("seed product")
    }

    pub async fn seed_line(&self, name: &str, efficiency: f64) -> production_line::Model {
        self.state
            .services
            .production_lines
            .create(CreateLineRequest {
                name: name.to_string(),
                efficiency_factor: Some(efficiency),
            })
            .await
            .expect("seed line")
    }

    pub async fn line(&self, id: i32) -> production_line::Model {
        production_line::Entity::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("query line")
            .expect("line exists")
    }

    pub async fn order(&self, id: i32) -> work_order::Model {
        work_order::Entity::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("query work order")
            .expect("work order exists")
    }

    pub async fn material(&self, id: i32) -> material::Model {
        material::Entity::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("query material")
            .expect("material exists")
    }

    /// Moves an order's estimated end, e.g. into the past.
    pub async fn set_estimated_end(&self, order_id: i32, end: DateTime<Utc>) {
        let order = self.order(order_id).await;
        let mut active: work_order::ActiveModel = order.into();
        active.estimated_end_date = Set(end);
        active
            .update(&*self.state.db)
            .await
            .expect("move estimated end");
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
