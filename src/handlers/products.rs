use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    entities::{material, product, product_material},
    errors::ServiceError,
    handlers::common::{created_response, map_all, success_response, validate_input},
    services::products::{ProductQuery, ProductRequest},
    AppState,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub specifications: Option<String>,
    pub category: String,
    pub minimal_stock: i32,
    pub production_time_per_unit: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            specifications: model.specifications,
            category: model.category,
            minimal_stock: model.minimal_stock,
            production_time_per_unit: model.production_time_per_unit,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// One bill-of-materials line with the material's current stock
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BomEntryResponse {
    pub product_id: i32,
    pub material_id: i32,
    pub material_name: String,
    pub unit_of_measure: String,
    pub quantity_needed: Decimal,
    pub available_quantity: Decimal,
}

impl From<(product_material::Model, material::Model)> for BomEntryResponse {
    fn from((entry, material): (product_material::Model, material::Model)) -> Self {
        Self {
            product_id: entry.product_id,
            material_id: entry.material_id,
            material_name: material.name,
            unit_of_measure: material.unit_of_measure,
            quantity_needed: entry.quantity_needed,
            available_quantity: material.quantity,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductFilters {
    /// Exact category
    pub category: Option<String>,
    /// Case-insensitive substring of the name
    pub search: Option<String>,
}

pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product).put(update_product))
        .route("/:id/materials", get(product_materials))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductFilters),
    responses((status = 200, description = "Products listed", body = [ProductResponse])),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filters): Query<ProductFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let products = state
        .services
        .products
        .list(ProductQuery {
            category: filters.category,
            search: filters.search,
        })
        .await?;
    Ok(success_response(map_all::<_, ProductResponse>(products)))
}

/// Create a product with its bill of materials
#[utoipa::path(
    post,
    path = "/api/products",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown material in the BOM", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<ProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let product = state.services.products.create(payload).await?;
    Ok(created_response(ProductResponse::from(product)))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product found", body = ProductResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.products.get(id).await?;
    Ok(success_response(ProductResponse::from(product)))
}

/// Replace a product and its bill of materials
#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = i32, Path, description = "Product id")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product or material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<ProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let product = state.services.products.update(id, payload).await?;
    Ok(success_response(ProductResponse::from(product)))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}/materials",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Bill of materials", body = [BomEntryResponse]),
        (status = 404, description = "Product missing or without materials", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn product_materials(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let entries = state.services.products.materials(id).await?;
    Ok(success_response(map_all::<_, BomEntryResponse>(entries)))
}
