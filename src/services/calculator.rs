use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    errors::ServiceError,
    services::{
        bom::{self, MaterialRequirement},
        line_claims, scheduling,
    },
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductionEstimateRequest {
    pub product_id: i32,
    pub quantity: i32,
    pub production_line_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialAvailability {
    pub material_id: i32,
    pub material_name: String,
    pub required_quantity: Decimal,
    pub available_quantity: Decimal,
    pub is_sufficient: bool,
}

impl From<&MaterialRequirement> for MaterialAvailability {
    fn from(r: &MaterialRequirement) -> Self {
        Self {
            material_id: r.material_id,
            material_name: r.material_name.clone(),
            required_quantity: r.required_quantity,
            available_quantity: r.available_quantity,
            is_sufficient: r.is_sufficient(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductionEstimate {
    pub total_production_time_in_minutes: f64,
    pub materials: Vec<MaterialAvailability>,
}

/// Read-only duration and material estimate for a prospective run
#[derive(Clone)]
pub struct CalculatorService {
    db: Arc<DbPool>,
}

impl CalculatorService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(product_id = request.product_id, quantity = request.quantity))]
    pub async fn estimate(
        &self,
        request: ProductionEstimateRequest,
    ) -> Result<ProductionEstimate, ServiceError> {
        if request.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be greater than 0".into(),
            ));
        }

        let db = &*self.db;
        let product = line_claims::load_product(db, request.product_id).await?;
        let efficiency = match request.production_line_id {
            Some(line_id) => Some(line_claims::load_line(db, line_id).await?.efficiency_factor),
            None => None,
        };

        let minutes = scheduling::production_minutes(
            product.production_time_per_unit,
            request.quantity,
            efficiency,
        );

        let requirements = bom::assess_requirements(db, product.id, request.quantity).await?;
        bom::ensure_sufficient(&requirements)?;

        Ok(ProductionEstimate {
            total_production_time_in_minutes: minutes,
            materials: requirements.iter().map(MaterialAvailability::from).collect(),
        })
    }
}
