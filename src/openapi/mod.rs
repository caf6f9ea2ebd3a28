use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Production Console API",
        version = "0.1.0",
        description = r#"
# Production Console API

Plans and runs manufacturing work orders against production lines.

- **Materials**: raw-material stock with minimum thresholds
- **Products**: catalog entries with a bill of materials and a per-unit build time
- **Lines**: production lines with an efficiency factor and at most one running order
- **Orders**: work orders from Pending through InProgress to Completed or Cancelled
- **Dashboard**: reconciled view of lines, low stock and order counts

## Timestamps

Timestamps are returned in UTC. Values submitted without a zone are read as UTC.

## Errors

Failures share one body:

```json
{
  "error": "Bad Request",
  "message": "Insufficient material 'Steel': required 10, available 4",
  "requestId": "4f1c...",
  "timestamp": "2025-01-01T00:00:00Z"
}
```

Stale `version` values and lost update races return 409; retry after re-reading.
        "#
    ),
    tags(
        (name = "orders", description = "Work order scheduling"),
        (name = "lines", description = "Production lines"),
        (name = "materials", description = "Raw material stock"),
        (name = "products", description = "Products and bills of materials"),
        (name = "calculate", description = "Duration and material estimates"),
        (name = "dashboard", description = "Reconciled overview"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        // Orders
        crate::handlers::orders::list_work_orders,
        crate::handlers::orders::get_work_order,
        crate::handlers::orders::create_work_order,
        crate::handlers::orders::update_work_order,
        crate::handlers::orders::update_progress,
        crate::handlers::orders::start_work_order,
        crate::handlers::orders::cancel_work_order,
        crate::handlers::orders::reschedule_work_order,

        // Lines
        crate::handlers::lines::list_lines,
        crate::handlers::lines::create_line,
        crate::handlers::lines::get_line,
        crate::handlers::lines::rename_line,
        crate::handlers::lines::set_line_status,
        crate::handlers::lines::line_schedule,
        crate::handlers::lines::start_line,
        crate::handlers::lines::stop_line,
        crate::handlers::lines::update_efficiency,

        // Materials
        crate::handlers::materials::list_materials,
        crate::handlers::materials::create_material,
        crate::handlers::materials::get_material,
        crate::handlers::materials::update_material,
        crate::handlers::materials::set_stock,
        crate::handlers::materials::replenish,

        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::create_product,
        crate::handlers::products::get_product,
        crate::handlers::products::update_product,
        crate::handlers::products::product_materials,

        // Calculate, dashboard, health
        crate::handlers::calculate::calculate_production,
        crate::handlers::dashboard::get_dashboard,
        crate::handlers::health::health_check
    ),
    components(
        schemas(
            // Order types
            crate::handlers::orders::WorkOrderResponse,
            crate::services::work_orders::CreateWorkOrderRequest,
            crate::services::work_orders::UpdateWorkOrderRequest,
            crate::services::work_orders::StartWorkOrderRequest,
            crate::services::work_orders::ProgressRequest,
            crate::services::work_orders::RescheduleRequest,
            crate::entities::work_order::WorkOrderStatus,

            // Line types
            crate::handlers::lines::LineResponse,
            crate::services::production_lines::CreateLineRequest,
            crate::services::production_lines::StartLineRequest,
            crate::services::production_lines::RenameLineRequest,
            crate::services::production_lines::EfficiencyRequest,
            crate::entities::production_line::LineStatus,

            // Catalog types
            crate::handlers::materials::MaterialResponse,
            crate::services::materials::CreateMaterialRequest,
            crate::services::materials::ReplenishRequest,
            crate::services::materials::UpdateMaterialRequest,
            crate::handlers::products::ProductResponse,
            crate::handlers::products::BomEntryResponse,
            crate::services::products::ProductRequest,
            crate::services::products::BomEntryInput,

            // Calculate and dashboard types
            crate::services::calculator::ProductionEstimateRequest,
            crate::services::calculator::ProductionEstimate,
            crate::services::calculator::MaterialAvailability,
            crate::handlers::dashboard::DashboardResponse,
            crate::handlers::dashboard::LineBoardEntry,
            crate::handlers::dashboard::CurrentOrderSummary,
            crate::services::dashboard::StatusCounts,
            crate::handlers::health::HealthResponse,

            // Error types
            crate::errors::ErrorResponse,
            crate::errors::FieldViolation
        )
    )
)]
pub struct ApiDoc;

/// Swagger UI at `/swagger-ui`, document at `/api-docs/openapi.json`
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/orders",
            "/api/orders/{id}/start",
            "/api/lines/{id}/status",
            "/api/materials/{id}/stock",
            "/api/products/{id}/materials",
            "/api/calculate/production",
            "/api/dashboard",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
