use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    entities::material,
    errors::ServiceError,
    handlers::common::{created_response, map_all, success_response, validate_input, OptionalJson},
    services::materials::{CreateMaterialRequest, ReplenishRequest, UpdateMaterialRequest},
    AppState,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialResponse {
    pub id: i32,
    pub name: String,
    pub quantity: Decimal,
    pub unit_of_measure: String,
    pub minimal_stock: Decimal,
    pub is_low_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<material::Model> for MaterialResponse {
    fn from(model: material::Model) -> Self {
        Self {
            is_low_stock: model.is_low_stock(),
            id: model.id,
            name: model.name,
            quantity: model.quantity,
            unit_of_measure: model.unit_of_measure,
            minimal_stock: model.minimal_stock,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MaterialFilters {
    /// Only materials below their minimal stock
    pub low_stock: Option<bool>,
}

pub fn materials_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_materials).post(create_material))
        .route("/:id", get(get_material).put(update_material))
        .route("/:id/stock", put(set_stock))
        .route("/:id/replenish", post(replenish))
}

/// List materials
#[utoipa::path(
    get,
    path = "/api/materials",
    params(MaterialFilters),
    responses((status = 200, description = "Materials listed", body = [MaterialResponse])),
    tag = "materials"
)]
pub async fn list_materials(
    State(state): State<AppState>,
    Query(filters): Query<MaterialFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let materials = state
        .services
        .materials
        .list(filters.low_stock.unwrap_or(false))
        .await?;
    Ok(success_response(map_all::<_, MaterialResponse>(materials)))
}

#[utoipa::path(
    post,
    path = "/api/materials",
    request_body = CreateMaterialRequest,
    responses(
        (status = 201, description = "Material created", body = MaterialResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn create_material(
    State(state): State<AppState>,
    Json(payload): Json<CreateMaterialRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let material = state.services.materials.create(payload).await?;
    Ok(created_response(MaterialResponse::from(material)))
}

#[utoipa::path(
    get,
    path = "/api/materials/{id}",
    params(("id" = i32, Path, description = "Material id")),
    responses(
        (status = 200, description = "Material found", body = MaterialResponse),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn get_material(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let material = state.services.materials.get(id).await?;
    Ok(success_response(MaterialResponse::from(material)))
}

/// Edit name, unit of measure and minimal stock
#[utoipa::path(
    put,
    path = "/api/materials/{id}",
    params(("id" = i32, Path, description = "Material id")),
    request_body = UpdateMaterialRequest,
    responses(
        (status = 200, description = "Material updated", body = MaterialResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn update_material(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateMaterialRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let material = state.services.materials.update(id, payload).await?;
    Ok(success_response(MaterialResponse::from(material)))
}

/// Overwrite the on-hand quantity with the raw decimal body
#[utoipa::path(
    put,
    path = "/api/materials/{id}/stock",
    params(("id" = i32, Path, description = "Material id")),
    request_body(content = Decimal, description = "New absolute quantity"),
    responses(
        (status = 200, description = "Stock set", body = MaterialResponse),
        (status = 400, description = "Negative quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn set_stock(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(quantity): Json<Decimal>,
) -> Result<impl IntoResponse, ServiceError> {
    let material = state.services.materials.set_stock(id, quantity).await?;
    Ok(success_response(MaterialResponse::from(material)))
}

/// Add stock; the amount defaults to the configured replenish amount
#[utoipa::path(
    post,
    path = "/api/materials/{id}/replenish",
    params(("id" = i32, Path, description = "Material id")),
    request_body(content = ReplenishRequest, description = "Optional amount"),
    responses(
        (status = 200, description = "Stock replenished", body = MaterialResponse),
        (status = 400, description = "Amount not positive", body = crate::errors::ErrorResponse),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn replenish(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    OptionalJson(payload): OptionalJson<ReplenishRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let amount = payload.and_then(|body| body.amount);
    let material = state.services.materials.replenish(id, amount).await?;
    Ok(success_response(MaterialResponse::from(material)))
}
