use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, ConnectionTrait};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lowest accepted efficiency multiplier
pub const MIN_EFFICIENCY: f64 = 0.5;
/// Highest accepted efficiency multiplier
pub const MAX_EFFICIENCY: f64 = 2.0;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum LineStatus {
    #[sea_orm(string_value = "Active")]
    Active,
    #[sea_orm(string_value = "Stopped")]
    Stopped,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "production_lines")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub status: LineStatus,
    pub efficiency_factor: f64,
    /// Work order currently running on the line
    pub current_work_order_id: Option<i32>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::work_order::Entity",
        from = "Column::CurrentWorkOrderId",
        to = "super::work_order::Column::Id",
        on_delete = "SetNull"
    )]
    CurrentWorkOrder,
    #[sea_orm(has_many = "super::work_order::Entity")]
    WorkOrders,
}

impl Related<super::work_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkOrders.def()
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
            if let ActiveValue::NotSet = self.status {
                self.status = ActiveValue::Set(LineStatus::Stopped);
            }
            if let ActiveValue::NotSet = self.efficiency_factor {
                self.efficiency_factor = ActiveValue::Set(1.0);
            }
            if let ActiveValue::NotSet = self.version {
                self.version = ActiveValue::Set(1);
            }
        }

        self.updated_at = ActiveValue::Set(now);

        Ok(self)
    }
}

impl Model {
    /// Running with nothing assigned
    pub fn is_available(&self) -> bool {
        self.status == LineStatus::Active && self.current_work_order_id.is_none()
    }

    /// The pointer, ignoring the legacy zero sentinel
    pub fn current_order(&self) -> Option<i32> {
        self.current_work_order_id.filter(|id| *id != 0)
    }
}

/// Accepts factors within `[MIN_EFFICIENCY, MAX_EFFICIENCY]`
pub fn is_valid_efficiency(factor: f64) -> bool {
    factor.is_finite() && (MIN_EFFICIENCY..=MAX_EFFICIENCY).contains(&factor)
}
