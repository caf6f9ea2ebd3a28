use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;

use crate::{
    entities::{material, product_material},
    errors::ServiceError,
};

/// What one product run needs of a single material
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRequirement {
    pub material_id: i32,
    pub material_name: String,
    pub unit_of_measure: String,
    pub quantity_per_unit: Decimal,
    pub required_quantity: Decimal,
    pub available_quantity: Decimal,
}

impl MaterialRequirement {
    pub fn is_sufficient(&self) -> bool {
        self.available_quantity >= self.required_quantity
    }

    pub fn shortage(&self) -> Decimal {
        (self.required_quantity - self.available_quantity).max(Decimal::ZERO)
    }
}

/// BOM entries of a product joined with their materials
pub async fn entries_for_product<C: ConnectionTrait>(
    db: &C,
    product_id: i32,
) -> Result<Vec<(product_material::Model, material::Model)>, ServiceError> {
    let rows = product_material::Entity::find()
        .filter(product_material::Column::ProductId.eq(product_id))
        .order_by_asc(product_material::Column::MaterialId)
        .find_also_related(material::Entity)
        .all(db)
        .await?;

    rows.into_iter()
        .map(|(entry, material)| {
            material.map(|m| (entry.clone(), m)).ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "BOM entry for product {} references missing material {}",
                    product_id, entry.material_id
                ))
            })
        })
        .collect()
}

/// Requirements of `quantity` units of a product against current stock.
/// Read-only; never fails on a shortage.
#[instrument(skip(db))]
pub async fn assess_requirements<C: ConnectionTrait>(
    db: &C,
    product_id: i32,
    quantity: i32,
) -> Result<Vec<MaterialRequirement>, ServiceError> {
    let requested = Decimal::from(quantity);

    let requirements: Vec<MaterialRequirement> = entries_for_product(db, product_id)
        .await?
        .into_iter()
        .map(|(entry, material)| MaterialRequirement {
            material_id: material.id,
            material_name: material.name,
            unit_of_measure: material.unit_of_measure,
            quantity_per_unit: entry.quantity_needed,
            required_quantity: entry.quantity_needed * requested,
            available_quantity: material.quantity,
        })
        .collect();

    debug!(lines = requirements.len(), "Assessed material requirements");
    Ok(requirements)
}

/// Fails with the first material that falls short.
pub fn ensure_sufficient(requirements: &[MaterialRequirement]) -> Result<(), ServiceError> {
    match requirements.iter().find(|r| !r.is_sufficient()) {
        Some(short) => {
            warn!(
                material_id = short.material_id,
                required = %short.required_quantity,
                available = %short.available_quantity,
                "Insufficient material"
            );
            Err(ServiceError::InsufficientMaterial {
                material: short.material_name.clone(),
                required: short.required_quantity,
                available: short.available_quantity,
            })
        }
        None => Ok(()),
    }
}

/// Assessment followed by the sufficiency guard
pub async fn check_sufficiency<C: ConnectionTrait>(
    db: &C,
    product_id: i32,
    quantity: i32,
) -> Result<Vec<MaterialRequirement>, ServiceError> {
    let requirements = assess_requirements(db, product_id, quantity).await?;
    ensure_sufficient(&requirements)?;
    Ok(requirements)
}

/// Deducts each requirement from stock. Re-reads every material so a
/// concurrent change cannot drive a quantity below zero.
pub async fn consume<C: ConnectionTrait>(
    db: &C,
    requirements: &[MaterialRequirement],
) -> Result<(), ServiceError> {
    for requirement in requirements {
        if requirement.required_quantity.is_zero() {
            continue;
        }

        let material = material::Entity::find_by_id(requirement.material_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material", requirement.material_id))?;

        if material.quantity < requirement.required_quantity {
            return Err(ServiceError::InsufficientMaterial {
                material: material.name,
                required: requirement.required_quantity,
                available: material.quantity,
            });
        }

        let remaining = material.quantity - requirement.required_quantity;
        let mut active: material::ActiveModel = material.into();
        active.quantity = Set(remaining);
        active.update(db).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn requirement(name: &str, required: Decimal, available: Decimal) -> MaterialRequirement {
        MaterialRequirement {
            material_id: 1,
            material_name: name.into(),
            unit_of_measure: "kg".into(),
            quantity_per_unit: dec!(1),
            required_quantity: required,
            available_quantity: available,
        }
    }

    #[test]
    fn exact_stock_is_sufficient() {
        let r = requirement("Resin", dec!(12.5), dec!(12.5));
        assert!(r.is_sufficient());
        assert_eq!(r.shortage(), Decimal::ZERO);
    }

    #[test]
    fn first_shortage_is_reported() {
        let reqs = vec![
            requirement("Resin", dec!(1), dec!(5)),
            requirement("Steel", dec!(10), dec!(4)),
            requirement("Paint", dec!(10), dec!(0)),
        ];
        assert_matches!(
            ensure_sufficient(&reqs),
            Err(ServiceError::InsufficientMaterial { material, required, available })
                if material == "Steel" && required == dec!(10) && available == dec!(4)
        );
        assert_eq!(reqs[1].shortage(), dec!(6));
    }

    #[test]
    fn empty_bom_always_passes() {
        assert!(ensure_sufficient(&[]).is_ok());
    }
}
