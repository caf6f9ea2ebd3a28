use axum::{extract::State, response::IntoResponse, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    errors::ServiceError,
    handlers::{
        common::{map_all, success_response},
        lines::LineResponse,
        materials::MaterialResponse,
    },
    services::dashboard::{DashboardSnapshot, LineSnapshot, StatusCounts},
    AppState,
};

/// What a line is running right now
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentOrderSummary {
    pub work_order_id: i32,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub progress: i32,
    pub estimated_end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineBoardEntry {
    pub line: LineResponse,
    pub current_order: Option<CurrentOrderSummary>,
}

impl From<LineSnapshot> for LineBoardEntry {
    fn from(snapshot: LineSnapshot) -> Self {
        let product_name = snapshot.product_name;
        Self {
            current_order: snapshot.current_order.map(|order| CurrentOrderSummary {
                work_order_id: order.id,
                product_name,
                quantity: order.quantity,
                progress: order.progress,
                estimated_end_date: order.estimated_end_date,
            }),
            line: LineResponse::from(snapshot.line),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub lines: Vec<LineBoardEntry>,
    pub low_stock_materials: Vec<MaterialResponse>,
    pub status_counts: StatusCounts,
    /// Orders completed by the reconciliation run of this request
    pub reconciled_orders: usize,
    pub generated_at: DateTime<Utc>,
}

impl From<DashboardSnapshot> for DashboardResponse {
    fn from(snapshot: DashboardSnapshot) -> Self {
        Self {
            lines: map_all(snapshot.lines),
            low_stock_materials: map_all(snapshot.low_stock),
            status_counts: snapshot.status_counts,
            reconciled_orders: snapshot.reconciled,
            generated_at: Utc::now(),
        }
    }
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/", get(get_dashboard))
}

/// Reconcile overdue orders, then summarise lines, stock and order counts
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Dashboard returned", body = DashboardResponse),
        (status = 409, description = "Concurrent modification during reconciliation", body = crate::errors::ErrorResponse)
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let snapshot = state.services.dashboard.overview().await?;
    Ok(success_response(DashboardResponse::from(snapshot)))
}
