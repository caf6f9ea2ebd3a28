use std::{collections::HashSet, sync::Arc};

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{material, product, product_material},
    errors::ServiceError,
    services::{bom, line_claims},
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BomEntryInput {
    pub material_id: i32,
    pub quantity_needed: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub specifications: Option<String>,
    #[validate(length(min = 1, max = 50, message = "category must be 1-50 characters"))]
    pub category: String,
    #[serde(default)]
    #[validate(range(min = 0, message = "minimalStock cannot be negative"))]
    pub minimal_stock: i32,
    #[validate(range(min = 1, message = "productionTimePerUnit must be at least 1 minute"))]
    pub production_time_per_unit: i32,
    /// Bill of materials; entries with a zero quantity are dropped
    #[serde(default)]
    pub materials: Vec<BomEntryInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Clone)]
pub struct ProductService {
    db: Arc<DbPool>,
}

impl ProductService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Products filtered by exact category and a case-insensitive name match
    #[instrument(skip(self))]
    pub async fn list(&self, query: ProductQuery) -> Result<Vec<product::Model>, ServiceError> {
        let mut select = product::Entity::find();
        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            select = select.filter(product::Column::Category.eq(category));
        }

        let products = select
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?;

        Ok(match query.search.map(|s| s.trim().to_lowercase()) {
            Some(needle) if !needle.is_empty() => products
                .into_iter()
                .filter(|p| p.name.to_lowercase().contains(&needle))
                .collect(),
            _ => products,
        })
    }

    pub async fn get(&self, id: i32) -> Result<product::Model, ServiceError> {
        line_claims::load_product(&*self.db, id).await
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(&self, request: ProductRequest) -> Result<product::Model, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;

        let created = product::ActiveModel {
            name: Set(request.name.trim().to_string()),
            description: Set(request.description.clone()),
            specifications: Set(request.specifications.clone()),
            category: Set(request.category.trim().to_string()),
            minimal_stock: Set(request.minimal_stock),
            production_time_per_unit: Set(request.production_time_per_unit),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        write_bom(&txn, created.id, &request.materials).await?;
        txn.commit().await?;

        info!(product_id = created.id, "Product created");
        Ok(created)
    }

    /// Replaces the product's fields and its whole bill of materials.
    #[instrument(skip(self, request), fields(product_id = id))]
    pub async fn update(
        &self,
        id: i32,
        request: ProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;

        let existing = line_claims::load_product(&txn, id).await?;
        let mut active: product::ActiveModel = existing.into();
        active.name = Set(request.name.trim().to_string());
        active.description = Set(request.description.clone());
        active.specifications = Set(request.specifications.clone());
        active.category = Set(request.category.trim().to_string());
        active.minimal_stock = Set(request.minimal_stock);
        active.production_time_per_unit = Set(request.production_time_per_unit);
        let updated = active.update(&txn).await?;

        product_material::Entity::delete_many()
            .filter(product_material::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        write_bom(&txn, id, &request.materials).await?;

        txn.commit().await?;

        info!(product_id = id, "Product updated");
        Ok(updated)
    }

    /// The product's BOM joined with its materials; 404 when there is none.
    pub async fn materials(
        &self,
        product_id: i32,
    ) -> Result<Vec<(product_material::Model, material::Model)>, ServiceError> {
        line_claims::load_product(&*self.db, product_id).await?;

        let entries = bom::entries_for_product(&*self.db, product_id).await?;
        if entries.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "Product {} has no bill of materials",
                product_id
            )));
        }
        Ok(entries)
    }
}

async fn write_bom<C: ConnectionTrait>(
    db: &C,
    product_id: i32,
    entries: &[BomEntryInput],
) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();

    for entry in entries {
        if entry.quantity_needed.is_sign_negative() && !entry.quantity_needed.is_zero() {
            return Err(ServiceError::ValidationError(format!(
                "quantity for material {} cannot be negative",
                entry.material_id
            )));
        }
        if entry.quantity_needed.is_zero() {
            continue;
        }
        if !seen.insert(entry.material_id) {
            return Err(ServiceError::ValidationError(format!(
                "material {} is listed more than once",
                entry.material_id
            )));
        }

        material::Entity::find_by_id(entry.material_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material", entry.material_id))?;

        product_material::ActiveModel {
            product_id: Set(product_id),
            material_id: Set(entry.material_id),
            quantity_needed: Set(entry.quantity_needed),
        }
        .insert(db)
        .await?;
    }

    Ok(())
}
