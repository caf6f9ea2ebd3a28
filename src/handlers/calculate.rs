use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};

use crate::{
    errors::ServiceError,
    handlers::common::success_response,
    services::calculator::{ProductionEstimate, ProductionEstimateRequest},
    AppState,
};

pub fn calculate_routes() -> Router<AppState> {
    Router::new().route("/production", post(calculate_production))
}

/// Estimate duration and material needs without touching stock
#[utoipa::path(
    post,
    path = "/api/calculate/production",
    request_body = ProductionEstimateRequest,
    responses(
        (status = 200, description = "Estimate computed", body = ProductionEstimate),
        (status = 400, description = "Quantity not positive or material insufficient", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product or line not found", body = crate::errors::ErrorResponse)
    ),
    tag = "calculate"
)]
pub async fn calculate_production(
    State(state): State<AppState>,
    Json(payload): Json<ProductionEstimateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let estimate = state.services.calculator.estimate(payload).await?;
    Ok(success_response(estimate))
}
