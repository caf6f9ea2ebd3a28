use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    entities::production_line::{self, LineStatus},
    errors::ServiceError,
    handlers::{
        common::{created_response, map_all, no_content_response, success_response, validate_input},
        orders::WorkOrderResponse,
    },
    services::production_lines::{
        CreateLineRequest, EfficiencyRequest, RenameLineRequest, StartLineRequest,
    },
    AppState,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineResponse {
    pub id: i32,
    pub name: String,
    pub status: LineStatus,
    pub efficiency_factor: f64,
    pub current_work_order_id: Option<i32>,
    pub is_available: bool,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<production_line::Model> for LineResponse {
    fn from(model: production_line::Model) -> Self {
        Self {
            is_available: model.is_available(),
            current_work_order_id: model.current_order(),
            id: model.id,
            name: model.name,
            status: model.status,
            efficiency_factor: model.efficiency_factor,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LineFilters {
    /// Only Active lines with no current order
    pub available: Option<bool>,
}

pub fn lines_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_lines).post(create_line))
        .route("/:id", get(get_line).put(rename_line))
        .route("/:id/status", put(set_line_status))
        .route("/:id/schedule", get(line_schedule))
        .route("/:id/start", post(start_line))
        .route("/:id/stop", post(stop_line))
        .route("/:id/efficiency", put(update_efficiency))
}

/// List production lines
#[utoipa::path(
    get,
    path = "/api/lines",
    params(LineFilters),
    responses((status = 200, description = "Lines listed", body = [LineResponse])),
    tag = "lines"
)]
pub async fn list_lines(
    State(state): State<AppState>,
    Query(filters): Query<LineFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let lines = state
        .services
        .production_lines
        .list(filters.available.unwrap_or(false))
        .await?;
    Ok(success_response(map_all::<_, LineResponse>(lines)))
}

/// Create a production line
#[utoipa::path(
    post,
    path = "/api/lines",
    request_body = CreateLineRequest,
    responses(
        (status = 201, description = "Line created", body = LineResponse),
        (status = 400, description = "Invalid name or efficiency", body = crate::errors::ErrorResponse)
    ),
    tag = "lines"
)]
pub async fn create_line(
    State(state): State<AppState>,
    Json(payload): Json<CreateLineRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let line = state.services.production_lines.create(payload).await?;
    Ok(created_response(LineResponse::from(line)))
}

/// Get a production line
#[utoipa::path(
    get,
    path = "/api/lines/{id}",
    params(("id" = i32, Path, description = "Line id")),
    responses(
        (status = 200, description = "Line found", body = LineResponse),
        (status = 404, description = "Line not found", body = crate::errors::ErrorResponse)
    ),
    tag = "lines"
)]
pub async fn get_line(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let line = state.services.production_lines.get(id).await?;
    Ok(success_response(LineResponse::from(line)))
}

/// Rename a production line
#[utoipa::path(
    put,
    path = "/api/lines/{id}",
    params(("id" = i32, Path, description = "Line id")),
    request_body = RenameLineRequest,
    responses(
        (status = 200, description = "Line renamed", body = LineResponse),
        (status = 400, description = "Invalid name", body = crate::errors::ErrorResponse),
        (status = 404, description = "Line not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Stale version", body = crate::errors::ErrorResponse)
    ),
    tag = "lines"
)]
pub async fn rename_line(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<RenameLineRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let line = state.services.production_lines.rename(id, payload).await?;
    Ok(success_response(LineResponse::from(line)))
}

/// Set a line's status from a raw string body
#[utoipa::path(
    put,
    path = "/api/lines/{id}/status",
    params(("id" = i32, Path, description = "Line id")),
    request_body(content = String, description = "\"Active\" or \"Stopped\""),
    responses(
        (status = 204, description = "Status set"),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Line not found", body = crate::errors::ErrorResponse)
    ),
    tag = "lines"
)]
pub async fn set_line_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(status): Json<String>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.production_lines.set_status(id, &status).await?;
    Ok(no_content_response())
}

/// Work orders that reference the line
#[utoipa::path(
    get,
    path = "/api/lines/{id}/schedule",
    params(("id" = i32, Path, description = "Line id")),
    responses(
        (status = 200, description = "Schedule returned", body = [WorkOrderResponse]),
        (status = 404, description = "Line not found", body = crate::errors::ErrorResponse)
    ),
    tag = "lines"
)]
pub async fn line_schedule(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.production_lines.schedule(id).await?;
    Ok(success_response(map_all::<_, WorkOrderResponse>(orders)))
}

/// Start a new run on the line, preempting its current order
#[utoipa::path(
    post,
    path = "/api/lines/{id}/start",
    params(("id" = i32, Path, description = "Line id")),
    request_body = StartLineRequest,
    responses(
        (status = 201, description = "Run started", body = WorkOrderResponse),
        (status = 400, description = "Invalid quantity or insufficient material", body = crate::errors::ErrorResponse),
        (status = 404, description = "Line or product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent modification", body = crate::errors::ErrorResponse)
    ),
    tag = "lines"
)]
pub async fn start_line(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<StartLineRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let order = state.services.production_lines.start_line(id, payload).await?;
    Ok(created_response(WorkOrderResponse::from(order)))
}

/// Cancel the current run and stop the line
#[utoipa::path(
    post,
    path = "/api/lines/{id}/stop",
    params(("id" = i32, Path, description = "Line id")),
    responses(
        (status = 200, description = "Line stopped", body = LineResponse),
        (status = 404, description = "Line not found", body = crate::errors::ErrorResponse)
    ),
    tag = "lines"
)]
pub async fn stop_line(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let line = state.services.production_lines.stop_line(id).await?;
    Ok(success_response(LineResponse::from(line)))
}

/// Change the efficiency factor and re-estimate live orders
#[utoipa::path(
    put,
    path = "/api/lines/{id}/efficiency",
    params(("id" = i32, Path, description = "Line id")),
    request_body = EfficiencyRequest,
    responses(
        (status = 200, description = "Efficiency updated", body = LineResponse),
        (status = 400, description = "Factor outside 0.5..=2.0", body = crate::errors::ErrorResponse),
        (status = 404, description = "Line not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Stale version", body = crate::errors::ErrorResponse)
    ),
    tag = "lines"
)]
pub async fn update_efficiency(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<EfficiencyRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let line = state
        .services
        .production_lines
        .update_efficiency(id, payload)
        .await?;
    Ok(success_response(LineResponse::from(line)))
}
