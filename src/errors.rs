use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldViolation {
    #[schema(example = "efficiencyFactor")]
    pub field: String,
    #[schema(example = "must be between 0.5 and 2.0")]
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "error": "Bad Request",
    "message": "Insufficient material 'Steel sheet': required 12.5, available 4",
    "requestId": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    #[schema(example = "Bad Request")]
    pub error: String,
    /// Human-readable error description
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Field-level validation failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldViolation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "req-abc123xyz")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Validation failed for {} field(s)", .0.len())]
    FieldValidation(Vec<FieldViolation>),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient material '{material}': required {required}, available {available}")]
    InsufficientMaterial {
        material: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Production line {line_id} is already assigned to work order {work_order_id}")]
    LineAlreadyAssigned { line_id: i32, work_order_id: i32 },

    #[error("Invalid status transition: {0}")]
    InvalidStatusTransition(String),

    #[error("Concurrent modification of {entity} {id}")]
    ConcurrentModification { entity: &'static str, id: i32 },

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// `production_line_id` -> `productionLineId`, matching the JSON bodies.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut violations: Vec<FieldViolation> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    FieldViolation::new(camel_case(field), message)
                })
            })
            .collect();
        violations.sort_by(|a, b| a.field.cmp(&b.field));
        ServiceError::FieldValidation(violations)
    }
}

impl ServiceError {
    pub fn not_found(entity: &str, id: i32) -> Self {
        ServiceError::NotFound(format!("{} {} not found", entity, id))
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::FieldValidation(_)
            | Self::InvalidInput(_)
            | Self::InsufficientMaterial { .. }
            | Self::LineAlreadyAssigned { .. }
            | Self::InvalidStatusTransition(_) => StatusCode::BAD_REQUEST,
            Self::ConcurrentModification { .. } => StatusCode::CONFLICT,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let errors = match &self {
            Self::FieldValidation(violations) => Some(violations.clone()),
            _ => None,
        };

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            errors,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::body::to_bytes;
    use rust_decimal_macros::dec;
    use validator::Validate;

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::not_found("Work order", 7).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.message, "Not found: Work order 7 not found");
    }

    #[test]
    fn business_rule_violations_are_client_errors() {
        let insufficient = ServiceError::InsufficientMaterial {
            material: "Steel".into(),
            required: dec!(10),
            available: dec!(4.5),
        };
        assert_eq!(insufficient.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            insufficient.response_message(),
            "Insufficient material 'Steel': required 10, available 4.5"
        );

        assert_eq!(
            ServiceError::LineAlreadyAssigned {
                line_id: 1,
                work_order_id: 2
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InvalidStatusTransition("Completed -> InProgress".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn stale_writes_map_to_conflict() {
        let err = ServiceError::ConcurrentModification {
            entity: "production line",
            id: 3,
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.response_message(), "Concurrent modification of production line 3");
    }

    #[test]
    fn internal_errors_hide_details() {
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("pool exhausted".into())).response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::Other(anyhow::anyhow!("secret")).response_message(),
            "Internal server error"
        );
    }

    #[derive(Validate)]
    struct QuantityInput {
        #[validate(range(min = 1, message = "must be positive"))]
        quantity: i32,
        #[validate(range(min = 0.5, max = 2.0, message = "out of range"))]
        efficiency_factor: f64,
    }

    #[tokio::test]
    async fn validation_errors_carry_field_messages() {
        let input = QuantityInput {
            quantity: 0,
            efficiency_factor: 1.0,
        };
        let err: ServiceError = input.validate().unwrap_err().into();
        assert_matches!(&err, ServiceError::FieldValidation(v) if v.len() == 1);

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        let errors = payload.errors.unwrap();
        assert_eq!(errors[0], FieldViolation::new("quantity", "must be positive"));
    }

    #[test]
    fn field_names_follow_the_json_casing() {
        let input = QuantityInput {
            quantity: 1,
            efficiency_factor: 3.0,
        };
        let err: ServiceError = input.validate().unwrap_err().into();
        assert_matches!(
            err,
            ServiceError::FieldValidation(v) if v[0].field == "efficiencyFactor"
        );
        assert_eq!(camel_case("production_line_id"), "productionLineId");
        assert_eq!(camel_case("name"), "name");
    }
}
