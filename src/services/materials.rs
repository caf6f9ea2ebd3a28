use std::sync::Arc;

use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set, TransactionTrait};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{
    db::DbPool,
    entities::material,
    errors::ServiceError,
    events::{Event, EventSender},
};

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("value cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMaterialRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[validate(custom = "validate_non_negative")]
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 20, message = "unitOfMeasure must be 1-20 characters"))]
    pub unit_of_measure: String,
    #[serde(default)]
    #[validate(custom = "validate_non_negative")]
    pub minimal_stock: Decimal,
}

/// Editable catalog fields; stock moves through the stock and replenish calls
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMaterialRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 20, message = "unitOfMeasure must be 1-20 characters"))]
    pub unit_of_measure: String,
    #[validate(custom = "validate_non_negative")]
    pub minimal_stock: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReplenishRequest {
    /// Defaults to the configured replenish amount
    pub amount: Option<Decimal>,
}

/// Raw material ledger
#[derive(Clone)]
pub struct MaterialService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    default_replenish: Decimal,
}

impl MaterialService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, default_replenish: Decimal) -> Self {
        Self {
            db,
            event_sender,
            default_replenish,
        }
    }

    /// All materials, or only those under their minimum when `low_stock_only`.
    #[instrument(skip(self))]
    pub async fn list(&self, low_stock_only: bool) -> Result<Vec<material::Model>, ServiceError> {
        let materials = material::Entity::find()
            .order_by_asc(material::Column::Name)
            .all(&*self.db)
            .await?;

        // Decimal comparison stays in Rust; SQLite stores these as text.
        Ok(if low_stock_only {
            materials.into_iter().filter(|m| m.is_low_stock()).collect()
        } else {
            materials
        })
    }

    pub async fn get(&self, id: i32) -> Result<material::Model, ServiceError> {
        material::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material", id))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(
        &self,
        request: CreateMaterialRequest,
    ) -> Result<material::Model, ServiceError> {
        request.validate()?;

        let created = material::ActiveModel {
            name: Set(request.name.trim().to_string()),
            quantity: Set(request.quantity),
            unit_of_measure: Set(request.unit_of_measure.trim().to_string()),
            minimal_stock: Set(request.minimal_stock),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(material_id = created.id, "Material created");
        Ok(created)
    }

    /// Changes name, unit and minimum threshold; the quantity is untouched.
    #[instrument(skip(self, request), fields(material_id = id))]
    pub async fn update(
        &self,
        id: i32,
        request: UpdateMaterialRequest,
    ) -> Result<material::Model, ServiceError> {
        request.validate()?;

        let existing = self.get(id).await?;
        let mut active: material::ActiveModel = existing.into();
        active.name = Set(request.name.trim().to_string());
        active.unit_of_measure = Set(request.unit_of_measure.trim().to_string());
        active.minimal_stock = Set(request.minimal_stock);
        let updated = active.update(&*self.db).await?;

        info!(material_id = id, "Material updated");
        Ok(updated)
    }

    /// Overwrites the on-hand quantity.
    #[instrument(skip(self))]
    pub async fn set_stock(&self, id: i32, quantity: Decimal) -> Result<material::Model, ServiceError> {
        if validate_non_negative(&quantity).is_err() {
            return Err(ServiceError::ValidationError(format!(
                "stock quantity cannot be negative: {}",
                quantity
            )));
        }
        self.write_quantity(id, |_| Ok(quantity)).await
    }

    /// Adds `amount` (or the configured default) to the on-hand quantity.
    #[instrument(skip(self))]
    pub async fn replenish(
        &self,
        id: i32,
        amount: Option<Decimal>,
    ) -> Result<material::Model, ServiceError> {
        let amount = amount.unwrap_or(self.default_replenish);
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "replenish amount must be greater than 0, got {}",
                amount
            )));
        }
        counter!("production_materials.replenished", 1);
        self.write_quantity(id, |current| Ok(current + amount)).await
    }

    async fn write_quantity<F>(&self, id: i32, next: F) -> Result<material::Model, ServiceError>
    where
        F: FnOnce(Decimal) -> Result<Decimal, ServiceError>,
    {
        let txn = self.db.begin().await?;

        let existing = material::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material", id))?;
        let old_quantity = existing.quantity;
        let new_quantity = next(old_quantity)?;

        let mut active: material::ActiveModel = existing.into();
        active.quantity = Set(new_quantity);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(
            material_id = id,
            old_quantity = %old_quantity,
            new_quantity = %new_quantity,
            "Material stock updated"
        );
        self.event_sender
            .publish_all(vec![Event::MaterialStockChanged {
                material_id: id,
                old_quantity,
                new_quantity,
            }])
            .await;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn negative_quantities_fail_validation() {
        let request = CreateMaterialRequest {
            name: "Copper wire".into(),
            quantity: dec!(-1),
            unit_of_measure: "m".into(),
            minimal_stock: dec!(0),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("quantity"));
    }

    #[test]
    fn zero_stock_is_allowed() {
        assert!(validate_non_negative(&dec!(0)).is_ok());
        assert!(validate_non_negative(&dec!(-0.0)).is_ok());
    }
}
