use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

use crate::{
    entities::work_order::{self, WorkOrderStatus},
    errors::ServiceError,
    handlers::common::{created_response, map_all, success_response, validate_input, OptionalJson},
    services::work_orders::{
        CreateWorkOrderRequest, ProgressRequest, RescheduleRequest, StartWorkOrderRequest,
        StatusFilter, UpdateWorkOrderRequest, WorkOrderQuery,
    },
    AppState,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderResponse {
    pub id: i32,
    pub product_id: i32,
    pub production_line_id: Option<i32>,
    pub quantity: i32,
    pub start_date: DateTime<Utc>,
    pub estimated_end_date: DateTime<Utc>,
    pub status: WorkOrderStatus,
    pub progress: i32,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<work_order::Model> for WorkOrderResponse {
    fn from(model: work_order::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            production_line_id: model.production_line_id,
            quantity: model.quantity,
            start_date: model.start_date,
            estimated_end_date: model.estimated_end_date,
            status: model.status,
            progress: model.progress,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WorkOrderFilters {
    /// `active` (Pending or InProgress) or a status name
    pub status: Option<String>,
    /// `today` or a `YYYY-MM-DD` UTC day
    pub date: Option<String>,
}

impl WorkOrderFilters {
    fn into_query(self, today: NaiveDate) -> Result<WorkOrderQuery, ServiceError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) if raw.eq_ignore_ascii_case("active") => Some(StatusFilter::Active),
            Some(raw) => Some(StatusFilter::Exact(WorkOrderStatus::from_str(raw).map_err(
                |_| ServiceError::ValidationError(format!("unknown work order status '{}'", raw)),
            )?)),
        };

        let start_day = match self.date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) if raw.eq_ignore_ascii_case("today") => Some(today),
            Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                ServiceError::ValidationError(format!("'{}' is not a date", raw))
            })?),
        };

        Ok(WorkOrderQuery { status, start_day })
    }
}

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_work_orders).post(create_work_order))
        .route("/:id", get(get_work_order).put(update_work_order))
        .route("/:id/progress", put(update_progress))
        .route("/:id/start", post(start_work_order))
        .route("/:id/cancel", post(cancel_work_order))
        .route("/:id/reschedule", put(reschedule_work_order))
}

/// List work orders
#[utoipa::path(
    get,
    path = "/api/orders",
    params(WorkOrderFilters),
    responses(
        (status = 200, description = "Work orders listed", body = [WorkOrderResponse]),
        (status = 400, description = "Unknown status or date filter", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn list_work_orders(
    State(state): State<AppState>,
    Query(filters): Query<WorkOrderFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let query = filters.into_query(Utc::now().date_naive())?;
    let orders = state.services.work_orders.list(query).await?;
    Ok(success_response(map_all::<_, WorkOrderResponse>(orders)))
}

/// Get a work order
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = i32, Path, description = "Work order id")),
    responses(
        (status = 200, description = "Work order found", body = WorkOrderResponse),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_work_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.work_orders.get(id).await?;
    Ok(success_response(WorkOrderResponse::from(order)))
}

/// Schedule a work order
#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateWorkOrderRequest,
    responses(
        (status = 201, description = "Work order created", body = WorkOrderResponse),
        (status = 400, description = "Invalid input, insufficient material or line taken", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product or line not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn create_work_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let order = state.services.work_orders.create(payload).await?;
    Ok(created_response(WorkOrderResponse::from(order)))
}

/// Edit a work order
#[utoipa::path(
    put,
    path = "/api/orders/{id}",
    params(("id" = i32, Path, description = "Work order id")),
    request_body = UpdateWorkOrderRequest,
    responses(
        (status = 200, description = "Work order updated", body = WorkOrderResponse),
        (status = 400, description = "Invalid input or business rule violated", body = crate::errors::ErrorResponse),
        (status = 404, description = "Work order, product or line not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Stale version", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn update_work_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateWorkOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let order = state.services.work_orders.update(id, payload).await?;
    Ok(success_response(WorkOrderResponse::from(order)))
}

/// Report progress; 100 completes the order
#[utoipa::path(
    put,
    path = "/api/orders/{id}/progress",
    params(("id" = i32, Path, description = "Work order id")),
    request_body = ProgressRequest,
    responses(
        (status = 200, description = "Progress recorded", body = WorkOrderResponse),
        (status = 400, description = "Out of range, decreasing or not running", body = crate::errors::ErrorResponse),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn update_progress(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<ProgressRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let order = state.services.work_orders.update_progress(id, payload).await?;
    Ok(success_response(WorkOrderResponse::from(order)))
}

/// Start a pending work order, preempting its line
#[utoipa::path(
    post,
    path = "/api/orders/{id}/start",
    params(("id" = i32, Path, description = "Work order id")),
    request_body(content = StartWorkOrderRequest, description = "Optional target line"),
    responses(
        (status = 200, description = "Work order started", body = WorkOrderResponse),
        (status = 400, description = "Not pending or insufficient material", body = crate::errors::ErrorResponse),
        (status = 404, description = "Work order or line not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent modification", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn start_work_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    OptionalJson(payload): OptionalJson<StartWorkOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = payload.unwrap_or_default();
    let order = state.services.work_orders.start(id, request).await?;
    Ok(success_response(WorkOrderResponse::from(order)))
}

/// Cancel a work order
#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(("id" = i32, Path, description = "Work order id")),
    responses(
        (status = 200, description = "Work order cancelled", body = WorkOrderResponse),
        (status = 400, description = "Already finished", body = crate::errors::ErrorResponse),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn cancel_work_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.work_orders.cancel(id).await?;
    Ok(success_response(WorkOrderResponse::from(order)))
}

/// Move a work order's start
#[utoipa::path(
    put,
    path = "/api/orders/{id}/reschedule",
    params(("id" = i32, Path, description = "Work order id")),
    request_body = RescheduleRequest,
    responses(
        (status = 200, description = "Work order rescheduled", body = WorkOrderResponse),
        (status = 400, description = "Finished order or bad timestamp", body = crate::errors::ErrorResponse),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn reschedule_work_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<RescheduleRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.work_orders.reschedule(id, payload).await?;
    Ok(success_response(WorkOrderResponse::from(order)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn active_and_today_filters() {
        let filters = WorkOrderFilters {
            status: Some("active".into()),
            date: Some("today".into()),
        };
        let query = filters.into_query(day()).unwrap();
        assert_eq!(query.status, Some(StatusFilter::Active));
        assert_eq!(query.start_day, Some(day()));
    }

    #[rstest]
    #[case("pending", WorkOrderStatus::Pending)]
    #[case("inprogress", WorkOrderStatus::InProgress)]
    #[case("COMPLETED", WorkOrderStatus::Completed)]
    #[case("Cancelled", WorkOrderStatus::Cancelled)]
    fn status_names_are_case_insensitive(#[case] raw: &str, #[case] expected: WorkOrderStatus) {
        let filters = WorkOrderFilters {
            status: Some(raw.into()),
            date: None,
        };
        assert_eq!(
            filters.into_query(day()).unwrap().status,
            Some(StatusFilter::Exact(expected))
        );
    }

    #[test]
    fn unknown_status_is_rejected() {
        let filters = WorkOrderFilters {
            status: Some("paused".into()),
            date: None,
        };
        assert_matches!(
            filters.into_query(day()),
            Err(ServiceError::ValidationError(_))
        );
    }
}
