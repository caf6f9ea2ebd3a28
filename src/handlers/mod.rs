pub mod calculate;
pub mod common;
pub mod dashboard;
pub mod health;
pub mod lines;
pub mod materials;
pub mod orders;
pub mod products;

use axum::Router;

use crate::AppState;

/// Every `/api` route, relative to the `/api` prefix
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/calculate", calculate::calculate_routes())
        .nest("/lines", lines::lines_routes())
        .nest("/orders", orders::orders_routes())
        .nest("/materials", materials::materials_routes())
        .nest("/products", products::products_routes())
        .nest("/dashboard", dashboard::dashboard_routes())
}
