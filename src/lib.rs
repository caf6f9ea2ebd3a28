//! Production console library
//!
//! Materials, products and their bills of materials, production lines and the
//! work orders scheduled on them, served as a JSON API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{routing::get, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer};

use crate::middleware_helpers::request_id_middleware;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: services::AppServices,
}

impl AppState {
    /// Wires every service over one connection and event channel.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let factory =
            services::ServiceFactory::new(db.clone(), event_sender.clone(), config.replenish_amount);
        let services = services::AppServices::new(&factory);
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

/// Builds the application router: `/api`, `/health` and the OpenAPI UI,
/// wrapped in tracing, compression, CORS and request-id propagation.
pub fn app_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .nest("/api", handlers::api_routes())
        .route("/health", get(handlers::health::health_check))
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}
