use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::work_order::{self, WorkOrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{bom, line_claims, scheduling},
};

/// Request to schedule a new work order
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkOrderRequest {
    pub product_id: i32,
    #[validate(range(min = 1, message = "quantity must be greater than 0"))]
    pub quantity: i32,
    pub production_line_id: Option<i32>,
    /// Defaults to now. Values without a zone are read as UTC.
    #[serde(default, deserialize_with = "scheduling::deserialize_optional_utc")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub start_date: Option<DateTime<Utc>>,
}

/// Full replacement of a work order's schedulable fields
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkOrderRequest {
    pub product_id: i32,
    #[validate(range(min = 1, message = "quantity must be greater than 0"))]
    pub quantity: i32,
    pub production_line_id: Option<i32>,
    /// Keeps the stored start when omitted
    #[serde(default, deserialize_with = "scheduling::deserialize_optional_utc")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub start_date: Option<DateTime<Utc>>,
    /// Version the client last read; a mismatch is a conflict
    pub version: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkOrderRequest {
    /// Line to run on; defaults to the reserved line
    pub production_line_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    #[validate(range(min = 0, max = 100, message = "progress must be between 0 and 100"))]
    pub progress: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    #[serde(deserialize_with = "scheduling::deserialize_utc")]
    #[schema(value_type = String, format = DateTime)]
    pub start_date: DateTime<Utc>,
}

/// Status filter for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// Pending or InProgress
    Active,
    Exact(WorkOrderStatus),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkOrderQuery {
    pub status: Option<StatusFilter>,
    /// Keep orders starting on this UTC day
    pub start_day: Option<NaiveDate>,
}

/// Work order scheduler: creation, edits and lifecycle transitions
#[derive(Clone)]
pub struct WorkOrderService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl WorkOrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<work_order::Model, ServiceError> {
        line_claims::load_order(&*self.db, id).await
    }

    #[instrument(skip(self))]
    pub async fn list(&self, query: WorkOrderQuery) -> Result<Vec<work_order::Model>, ServiceError> {
        let mut select = work_order::Entity::find();

        select = match query.status {
            Some(StatusFilter::Active) => select.filter(
                work_order::Column::Status
                    .is_in([WorkOrderStatus::Pending, WorkOrderStatus::InProgress]),
            ),
            Some(StatusFilter::Exact(status)) => {
                select.filter(work_order::Column::Status.eq(status))
            }
            None => select,
        };

        let orders = select
            .order_by_asc(work_order::Column::StartDate)
            .order_by_asc(work_order::Column::Id)
            .all(&*self.db)
            .await?;

        Ok(match query.start_day {
            Some(day) => orders
                .into_iter()
                .filter(|o| o.start_date.date_naive() == day)
                .collect(),
            None => orders,
        })
    }

    /// Creates a Pending order. A named line is reserved, not claimed.
    #[instrument(skip(self, request), fields(product_id = request.product_id))]
    pub async fn create(
        &self,
        request: CreateWorkOrderRequest,
    ) -> Result<work_order::Model, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;

        let product = line_claims::load_product(&txn, request.product_id).await?;

        let efficiency = match request.production_line_id {
            Some(line_id) => {
                let line = line_claims::load_line(&txn, line_id).await?;
                let line = line_claims::reserve(&txn, &line, None).await?;
                Some(line.efficiency_factor)
            }
            None => None,
        };

        bom::check_sufficiency(&txn, product.id, request.quantity).await?;

        let start = request.start_date.unwrap_or_else(Utc::now);
        let end = scheduling::estimated_end(
            start,
            product.production_time_per_unit,
            request.quantity,
            efficiency,
        )?;

        let order = work_order::ActiveModel {
            product_id: Set(product.id),
            production_line_id: Set(request.production_line_id),
            quantity: Set(request.quantity),
            start_date: Set(start),
            estimated_end_date: Set(end),
            status: Set(WorkOrderStatus::Pending),
            progress: Set(0),
            version: Set(1),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert work order");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await?;

        counter!("production_work_orders.created", 1);
        info!(work_order_id = order.id, "Work order created");
        self.event_sender
            .publish_all(vec![Event::WorkOrderCreated {
                work_order_id: order.id,
                product_id: order.product_id,
            }])
            .await;

        Ok(order)
    }

    /// Edits product, quantity, line and start. Status is preserved.
    #[instrument(skip(self, request), fields(work_order_id = id))]
    pub async fn update(
        &self,
        id: i32,
        request: UpdateWorkOrderRequest,
    ) -> Result<work_order::Model, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;
        let mut events = Vec::new();

        let order = line_claims::load_order(&txn, id).await?;
        if let Some(expected) = request.version {
            if expected != order.version {
                return Err(ServiceError::ConcurrentModification {
                    entity: "work order",
                    id,
                });
            }
        }
        if order.status.is_terminal() {
            return Err(ServiceError::InvalidStatusTransition(format!(
                "work order {} is {} and can no longer be edited",
                id, order.status
            )));
        }

        let product = line_claims::load_product(&txn, request.product_id).await?;
        let mut target_line = match request.production_line_id {
            Some(line_id) => Some(line_claims::load_line(&txn, line_id).await?),
            None => None,
        };

        let line_changed = order.production_line_id != request.production_line_id;
        if line_changed {
            if let Some(old_line) = order.production_line_id {
                line_claims::release_if_held(&txn, old_line, id, &mut events).await?;
            }
            if let Some(line) = target_line.as_mut() {
                *line = line_claims::reserve(&txn, line, Some(id)).await?;
            }
        }

        // Stock was already consumed when a running order started.
        if order.status == WorkOrderStatus::Pending {
            bom::check_sufficiency(&txn, product.id, request.quantity).await?;
        }

        let start = request.start_date.unwrap_or(order.start_date);
        let end = scheduling::estimated_end(
            start,
            product.production_time_per_unit,
            request.quantity,
            target_line.as_ref().map(|l| l.efficiency_factor),
        )?;

        let updated = line_claims::persist_order(&txn, &order, |active| {
            active.product_id = Set(product.id);
            active.quantity = Set(request.quantity);
            active.production_line_id = Set(request.production_line_id);
            active.start_date = Set(start);
            active.estimated_end_date = Set(end);
        })
        .await?;

        if line_changed && updated.status == WorkOrderStatus::InProgress {
            if let Some(line) = &target_line {
                line_claims::claim(&txn, line, &updated, &mut events).await?;
            }
        }

        txn.commit().await?;

        info!(work_order_id = id, "Work order updated");
        events.push(Event::WorkOrderUpdated(id));
        self.event_sender.publish_all(events).await;

        Ok(updated)
    }

    /// Pending -> InProgress. Preempts whatever holds the target line,
    /// claims it, restarts the clock and consumes the BOM.
    #[instrument(skip(self, request), fields(work_order_id = id))]
    pub async fn start(
        &self,
        id: i32,
        request: StartWorkOrderRequest,
    ) -> Result<work_order::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let mut events = Vec::new();
        let now = Utc::now();

        let order = line_claims::load_order(&txn, id).await?;
        line_claims::ensure_transition(&order, WorkOrderStatus::InProgress)?;

        let product = line_claims::load_product(&txn, order.product_id).await?;
        let requirements = bom::check_sufficiency(&txn, product.id, order.quantity).await?;

        let target_line_id = request.production_line_id.or(order.production_line_id);
        let line = match target_line_id {
            Some(line_id) => {
                let line = line_claims::load_line(&txn, line_id).await?;
                Some(line_claims::preempt(&txn, &line, Some(id), now, &mut events).await?)
            }
            None => None,
        };

        let end = scheduling::estimated_end(
            now,
            product.production_time_per_unit,
            order.quantity,
            line.as_ref().map(|l| l.efficiency_factor),
        )?;

        let started = line_claims::persist_order(&txn, &order, |active| {
            active.status = Set(WorkOrderStatus::InProgress);
            active.production_line_id = Set(target_line_id);
            active.start_date = Set(now);
            active.estimated_end_date = Set(end);
        })
        .await?;

        if let Some(line) = &line {
            line_claims::claim(&txn, line, &started, &mut events).await?;
        }

        bom::consume(&txn, &requirements).await?;

        txn.commit().await?;

        counter!("production_work_orders.started", 1);
        info!(work_order_id = id, line_id = ?target_line_id, "Work order started");
        events.push(Event::WorkOrderStarted {
            work_order_id: id,
            line_id: target_line_id,
        });
        events.push(Event::MaterialsConsumed {
            work_order_id: id,
            product_id: product.id,
            quantity: order.quantity,
        });
        self.event_sender.publish_all(events).await;

        Ok(started)
    }

    #[instrument(skip(self), fields(work_order_id = id))]
    pub async fn cancel(&self, id: i32) -> Result<work_order::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let mut events = Vec::new();

        let order = line_claims::load_order(&txn, id).await?;
        let cancelled =
            line_claims::finish_order(&txn, &order, WorkOrderStatus::Cancelled, &mut events)
                .await?;

        txn.commit().await?;

        counter!("production_work_orders.cancelled", 1);
        info!(work_order_id = id, "Work order cancelled");
        self.event_sender.publish_all(events).await;

        Ok(cancelled)
    }

    /// Records progress on a running order; 100 completes it.
    #[instrument(skip(self, request), fields(work_order_id = id))]
    pub async fn update_progress(
        &self,
        id: i32,
        request: ProgressRequest,
    ) -> Result<work_order::Model, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;
        let mut events = Vec::new();

        let order = line_claims::load_order(&txn, id).await?;
        if order.status != WorkOrderStatus::InProgress {
            return Err(ServiceError::InvalidStatusTransition(format!(
                "progress can only be reported for InProgress work orders; {} is {}",
                id, order.status
            )));
        }
        if request.progress < order.progress {
            return Err(ServiceError::ValidationError(format!(
                "progress cannot go back from {} to {}",
                order.progress, request.progress
            )));
        }

        let updated = if request.progress == 100 {
            counter!("production_work_orders.completed", 1);
            line_claims::finish_order(&txn, &order, WorkOrderStatus::Completed, &mut events)
                .await?
        } else {
            events.push(Event::WorkOrderProgressed {
                work_order_id: id,
                progress: request.progress,
            });
            line_claims::persist_order(&txn, &order, |active| {
                active.progress = Set(request.progress);
            })
            .await?
        };

        txn.commit().await?;
        self.event_sender.publish_all(events).await;

        Ok(updated)
    }

    /// Moves the start and recomputes the estimated end.
    #[instrument(skip(self, request), fields(work_order_id = id))]
    pub async fn reschedule(
        &self,
        id: i32,
        request: RescheduleRequest,
    ) -> Result<work_order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let order = line_claims::load_order(&txn, id).await?;
        if order.status.is_terminal() {
            return Err(ServiceError::InvalidStatusTransition(format!(
                "work order {} is {} and cannot be rescheduled",
                id, order.status
            )));
        }

        let product = line_claims::load_product(&txn, order.product_id).await?;
        let efficiency = match order.production_line_id {
            Some(line_id) => Some(line_claims::load_line(&txn, line_id).await?.efficiency_factor),
            None => None,
        };
        let end = scheduling::estimated_end(
            request.start_date,
            product.production_time_per_unit,
            order.quantity,
            efficiency,
        )?;

        let updated = line_claims::persist_order(&txn, &order, |active| {
            active.start_date = Set(request.start_date);
            active.estimated_end_date = Set(end);
        })
        .await?;

        txn.commit().await?;

        info!(work_order_id = id, start = %request.start_date, "Work order rescheduled");
        self.event_sender
            .publish_all(vec![Event::WorkOrderUpdated(id)])
            .await;

        Ok(updated)
    }
}
