use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, ConnectionTrait};
use serde::{Deserialize, Serialize};

/// Raw material held in stock
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity: Decimal,
    pub unit_of_measure: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub minimal_stock: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_material::Entity")]
    ProductMaterials,
}

impl Related<super::product_material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductMaterials.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = self.created_at {
                self.created_at = ActiveValue::Set(now);
            }
            if let ActiveValue::NotSet = self.minimal_stock {
                self.minimal_stock = ActiveValue::Set(Decimal::ZERO);
            }
        }

        if let ActiveValue::Set(quantity) = &self.quantity {
            if quantity.is_sign_negative() && !quantity.is_zero() {
                return Err(DbErr::Custom(format!(
                    "material quantity cannot be negative: {}",
                    quantity
                )));
            }
        }

        self.updated_at = ActiveValue::Set(now);

        Ok(self)
    }
}

impl Model {
    /// Below the minimum-stock threshold
    pub fn is_low_stock(&self) -> bool {
        self.quantity < self.minimal_stock
    }
}
