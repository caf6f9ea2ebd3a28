use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::str::FromStr;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{
    db::DbPool,
    entities::{
        production_line::{self, LineStatus, MAX_EFFICIENCY, MIN_EFFICIENCY},
        work_order::{self, WorkOrderStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{bom, line_claims, scheduling},
};

fn validate_efficiency(factor: f64) -> Result<(), ValidationError> {
    if production_line::is_valid_efficiency(factor) {
        Ok(())
    } else {
        let mut err = ValidationError::new("efficiency_range");
        err.message = Some(
            format!(
                "efficiency factor must be between {} and {}",
                MIN_EFFICIENCY, MAX_EFFICIENCY
            )
            .into(),
        );
        Err(err)
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLineRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[validate(custom = "validate_efficiency")]
    pub efficiency_factor: Option<f64>,
}

/// Starts a fresh order for `product_id` directly on a line
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartLineRequest {
    pub product_id: i32,
    #[validate(range(min = 1, message = "quantity must be greater than 0"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenameLineRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    pub version: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EfficiencyRequest {
    #[validate(custom = "validate_efficiency")]
    pub efficiency_factor: f64,
    pub version: Option<i32>,
}

#[derive(Clone)]
pub struct ProductionLineService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ProductionLineService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, available_only: bool) -> Result<Vec<production_line::Model>, ServiceError> {
        let mut select = production_line::Entity::find();
        if available_only {
            select = select
                .filter(production_line::Column::Status.eq(LineStatus::Active))
                .filter(production_line::Column::CurrentWorkOrderId.is_null());
        }
        Ok(select
            .order_by_asc(production_line::Column::Id)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(&self, id: i32) -> Result<production_line::Model, ServiceError> {
        line_claims::load_line(&*self.db, id).await
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(
        &self,
        request: CreateLineRequest,
    ) -> Result<production_line::Model, ServiceError> {
        request.validate()?;

        let line = production_line::ActiveModel {
            name: Set(request.name.trim().to_string()),
            status: Set(LineStatus::Stopped),
            efficiency_factor: Set(request
                .efficiency_factor
                .unwrap_or(scheduling::DEFAULT_EFFICIENCY)),
            current_work_order_id: Set(None),
            version: Set(1),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert production line");
            ServiceError::DatabaseError(e)
        })?;

        info!(line_id = line.id, "Production line created");
        Ok(line)
    }

    #[instrument(skip(self, request), fields(line_id = id))]
    pub async fn rename(
        &self,
        id: i32,
        request: RenameLineRequest,
    ) -> Result<production_line::Model, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;
        let line = line_claims::load_line(&txn, id).await?;
        if let Some(expected) = request.version {
            if expected != line.version {
                return Err(ServiceError::ConcurrentModification {
                    entity: "production line",
                    id,
                });
            }
        }

        let name = request.name.trim().to_string();
        let renamed = line_claims::persist_line(&txn, &line, |active| {
            active.name = Set(name);
        })
        .await?;
        txn.commit().await?;

        info!(line_id = id, name = %renamed.name, "Production line renamed");
        Ok(renamed)
    }

    /// Sets the status from its exact name, `Active` or `Stopped`.
    #[instrument(skip(self))]
    pub async fn set_status(&self, id: i32, raw_status: &str) -> Result<(), ServiceError> {
        let status = LineStatus::from_str(raw_status.trim()).map_err(|_| {
            ServiceError::ValidationError(format!(
                "'{}' is not a line status; expected Active or Stopped",
                raw_status
            ))
        })?;

        let txn = self.db.begin().await?;
        let line = line_claims::load_line(&txn, id).await?;
        if line.status != status {
            line_claims::persist_line(&txn, &line, |active| {
                active.status = Set(status);
            })
            .await?;
        }
        txn.commit().await?;

        info!(line_id = id, status = %status, "Line status set");
        Ok(())
    }

    /// Every order that references the line, by start time
    pub async fn schedule(&self, id: i32) -> Result<Vec<work_order::Model>, ServiceError> {
        line_claims::load_line(&*self.db, id).await?;

        Ok(work_order::Entity::find()
            .filter(work_order::Column::ProductionLineId.eq(id))
            .order_by_asc(work_order::Column::StartDate)
            .order_by_asc(work_order::Column::Id)
            .all(&*self.db)
            .await?)
    }

    /// Preempts the line and runs a new order on it immediately.
    #[instrument(skip(self, request), fields(line_id = id, product_id = request.product_id))]
    pub async fn start_line(
        &self,
        id: i32,
        request: StartLineRequest,
    ) -> Result<work_order::Model, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;
        let mut events = Vec::new();
        let now = Utc::now();

        let line = line_claims::load_line(&txn, id).await?;
        let product = line_claims::load_product(&txn, request.product_id).await?;
        let requirements = bom::check_sufficiency(&txn, product.id, request.quantity).await?;

        let line = line_claims::preempt(&txn, &line, None, now, &mut events).await?;

        let end = scheduling::estimated_end(
            now,
            product.production_time_per_unit,
            request.quantity,
            Some(line.efficiency_factor),
        )?;

        let order = work_order::ActiveModel {
            product_id: Set(product.id),
            production_line_id: Set(Some(line.id)),
            quantity: Set(request.quantity),
            start_date: Set(now),
            estimated_end_date: Set(end),
            status: Set(WorkOrderStatus::InProgress),
            progress: Set(0),
            version: Set(1),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        line_claims::claim(&txn, &line, &order, &mut events).await?;
        bom::consume(&txn, &requirements).await?;

        txn.commit().await?;

        counter!("production_lines.started", 1);
        info!(line_id = id, work_order_id = order.id, "Line started");
        events.push(Event::WorkOrderCreated {
            work_order_id: order.id,
            product_id: product.id,
        });
        events.push(Event::WorkOrderStarted {
            work_order_id: order.id,
            line_id: Some(id),
        });
        events.push(Event::MaterialsConsumed {
            work_order_id: order.id,
            product_id: product.id,
            quantity: order.quantity,
        });
        self.event_sender.publish_all(events).await;

        Ok(order)
    }

    /// Cancels the running order, if any, and stops the line.
    #[instrument(skip(self), fields(line_id = id))]
    pub async fn stop_line(&self, id: i32) -> Result<production_line::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let mut events = Vec::new();

        let line = line_claims::load_line(&txn, id).await?;

        if let Some(current) = line.current_order() {
            match work_order::Entity::find_by_id(current).one(&txn).await? {
                Some(order) if !order.status.is_terminal() => {
                    line_claims::finish_order(
                        &txn,
                        &order,
                        WorkOrderStatus::Cancelled,
                        &mut events,
                    )
                    .await?;
                }
                _ => warn!(line_id = id, work_order_id = current, "Line pointed at a finished order"),
            }
        }

        // finish_order may already have released it
        let line = line_claims::load_line(&txn, id).await?;
        let stopped = if line.current_order().is_some() || line.status != LineStatus::Stopped {
            line_claims::release(&txn, &line, &mut events).await?
        } else {
            line
        };

        txn.commit().await?;

        counter!("production_lines.stopped", 1);
        info!(line_id = id, "Line stopped");
        self.event_sender.publish_all(events).await;

        Ok(stopped)
    }

    /// Changes the factor and re-estimates every live order on the line from
    /// its own start.
    #[instrument(skip(self, request), fields(line_id = id))]
    pub async fn update_efficiency(
        &self,
        id: i32,
        request: EfficiencyRequest,
    ) -> Result<production_line::Model, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;

        let line = line_claims::load_line(&txn, id).await?;
        if let Some(expected) = request.version {
            if expected != line.version {
                return Err(ServiceError::ConcurrentModification {
                    entity: "production line",
                    id,
                });
            }
        }

        let updated = line_claims::persist_line(&txn, &line, |active| {
            active.efficiency_factor = Set(request.efficiency_factor);
        })
        .await?;

        let orders = line_claims::active_orders_on_line(&txn, id).await?;
        let recalculated = orders.len();
        for order in orders {
            let product = line_claims::load_product(&txn, order.product_id).await?;
            let end = scheduling::estimated_end(
                order.start_date,
                product.production_time_per_unit,
                order.quantity,
                Some(request.efficiency_factor),
            )?;
            line_claims::persist_order(&txn, &order, |active| {
                active.estimated_end_date = Set(end);
            })
            .await?;
        }

        txn.commit().await?;

        info!(
            line_id = id,
            efficiency_factor = request.efficiency_factor,
            recalculated,
            "Line efficiency updated"
        );
        self.event_sender
            .publish_all(vec![Event::LineEfficiencyChanged {
                line_id: id,
                efficiency_factor: request.efficiency_factor,
            }])
            .await;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0.5, true ; "lower bound")]
    #[test_case(2.0, true ; "upper bound")]
    #[test_case(1.25, true ; "inside")]
    #[test_case(0.49, false ; "too slow")]
    #[test_case(2.01, false ; "too fast")]
    #[test_case(f64::NAN, false ; "not a number")]
    fn efficiency_bounds(factor: f64, accepted: bool) {
        assert_eq!(validate_efficiency(factor).is_ok(), accepted);
    }

    #[test]
    fn missing_efficiency_passes_validation() {
        let request = CreateLineRequest {
            name: "Line A".into(),
            efficiency_factor: None,
        };
        assert!(request.validate().is_ok());
    }
}
