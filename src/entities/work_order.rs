use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, ConnectionTrait};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[strum(ascii_case_insensitive)]
pub enum WorkOrderStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "InProgress")]
    InProgress,
    #[sea_orm(string_value = "Completed")]
    Completed,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl WorkOrderStatus {
    /// Completed and Cancelled admit no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Pending -> {InProgress, Cancelled}; InProgress -> {Completed, Cancelled}
    pub fn can_transition_to(self, next: WorkOrderStatus) -> bool {
        use WorkOrderStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (Pending, Cancelled) | (InProgress, Completed) | (InProgress, Cancelled)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "work_orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub product_id: i32,
    pub production_line_id: Option<i32>,
    pub quantity: i32,
    pub start_date: DateTime<Utc>,
    pub estimated_end_date: DateTime<Utc>,
    pub status: WorkOrderStatus,
    /// Percent complete, 0..=100
    pub progress: i32,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::production_line::Entity",
        from = "Column::ProductionLineId",
        to = "super::production_line::Column::Id",
        on_delete = "SetNull"
    )]
    ProductionLine,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::production_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductionLine.def()
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
                self.status = ActiveValue::Set(WorkOrderStatus::Pending);
            }
            if let ActiveValue::NotSet = self.progress {
                self.progress = ActiveValue::Set(0);
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
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Running orders whose estimated end has passed
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == WorkOrderStatus::InProgress && self.estimated_end_date <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case(WorkOrderStatus::Pending, WorkOrderStatus::InProgress, true)]
    #[case(WorkOrderStatus::Pending, WorkOrderStatus::Cancelled, true)]
    #[case(WorkOrderStatus::Pending, WorkOrderStatus::Completed, false)]
    #[case(WorkOrderStatus::InProgress, WorkOrderStatus::Completed, true)]
    #[case(WorkOrderStatus::InProgress, WorkOrderStatus::Cancelled, true)]
    #[case(WorkOrderStatus::InProgress, WorkOrderStatus::Pending, false)]
    #[case(WorkOrderStatus::Completed, WorkOrderStatus::InProgress, false)]
    #[case(WorkOrderStatus::Completed, WorkOrderStatus::Cancelled, false)]
    #[case(WorkOrderStatus::Cancelled, WorkOrderStatus::InProgress, false)]
    #[case(WorkOrderStatus::Cancelled, WorkOrderStatus::Pending, false)]
    fn status_transitions(
        #[case] from: WorkOrderStatus,
        #[case] to: WorkOrderStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn status_parsing_ignores_case() {
        assert_eq!(
            WorkOrderStatus::from_str("inprogress").unwrap(),
            WorkOrderStatus::InProgress
        );
        assert_eq!(WorkOrderStatus::Cancelled.to_string(), "Cancelled");
        assert!(WorkOrderStatus::from_str("paused").is_err());
    }
}
