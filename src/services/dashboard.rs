use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use sea_orm::{
    ColumnTrait, EntityTrait, Iterable, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    entities::{
        material, product, production_line,
        work_order::{self, WorkOrderStatus},
    },
    errors::ServiceError,
    events::EventSender,
    services::line_claims,
};

/// Number of work orders in each status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub cancelled: u64,
}

impl StatusCounts {
    fn record(&mut self, status: WorkOrderStatus, count: u64) {
        match status {
            WorkOrderStatus::Pending => self.pending = count,
            WorkOrderStatus::InProgress => self.in_progress = count,
            WorkOrderStatus::Completed => self.completed = count,
            WorkOrderStatus::Cancelled => self.cancelled = count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LineSnapshot {
    pub line: production_line::Model,
    pub current_order: Option<work_order::Model>,
    pub product_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub lines: Vec<LineSnapshot>,
    pub low_stock: Vec<material::Model>,
    pub status_counts: StatusCounts,
    /// Orders completed by the reconciliation pass of this read
    pub reconciled: usize,
}

#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl DashboardService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Completes every running order whose estimated end has passed and
    /// clears line pointers left at finished orders. Returns how many orders
    /// were completed.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let txn = self.db.begin().await?;
        let mut events = Vec::new();

        let running = work_order::Entity::find()
            .filter(work_order::Column::Status.eq(WorkOrderStatus::InProgress))
            .order_by_asc(work_order::Column::Id)
            .all(&txn)
            .await?;

        let mut completed = 0;
        for order in running.into_iter().filter(|o| o.is_overdue(now)) {
            line_claims::finish_order(&txn, &order, WorkOrderStatus::Completed, &mut events)
                .await?;
            completed += 1;
        }

        let held_lines = production_line::Entity::find()
            .filter(production_line::Column::CurrentWorkOrderId.is_not_null())
            .all(&txn)
            .await?;
        for line in held_lines {
            let Some(current) = line.current_order() else {
                continue;
            };
            let live = work_order::Entity::find_by_id(current)
                .one(&txn)
                .await?
                .map(|o| o.is_active())
                .unwrap_or(false);
            if !live {
                debug!(line_id = line.id, work_order_id = current, "Clearing stale line pointer");
                line_claims::release(&txn, &line, &mut events).await?;
            }
        }

        txn.commit().await?;

        if completed > 0 {
            counter!("production_reconciler.completed", completed as u64);
            info!(completed, "Reconciled overdue work orders");
        }
        self.event_sender.publish_all(events).await;

        Ok(completed)
    }

    /// Reconciles, then reads the line board, low stock and status counts.
    #[instrument(skip(self))]
    pub async fn overview(&self) -> Result<DashboardSnapshot, ServiceError> {
        let reconciled = self.reconcile(Utc::now()).await?;
        let db = &*self.db;

        let lines = production_line::Entity::find()
            .order_by_asc(production_line::Column::Id)
            .all(db)
            .await?;

        let mut snapshots = Vec::with_capacity(lines.len());
        for line in lines {
            let (current_order, product_name) = match line.current_order() {
                Some(order_id) => {
                    match work_order::Entity::find_by_id(order_id)
                        .find_also_related(product::Entity)
                        .one(db)
                        .await?
                    {
                        Some((order, product)) => (Some(order), product.map(|p| p.name)),
                        None => (None, None),
                    }
                }
                None => (None, None),
            };
            snapshots.push(LineSnapshot {
                line,
                current_order,
                product_name,
            });
        }

        let low_stock: Vec<material::Model> = material::Entity::find()
            .order_by_asc(material::Column::Name)
            .all(db)
            .await?
            .into_iter()
            .filter(|m| m.is_low_stock())
            .collect();

        let mut status_counts = StatusCounts::default();
        for status in WorkOrderStatus::iter() {
            let count = work_order::Entity::find()
                .filter(work_order::Column::Status.eq(status))
                .count(db)
                .await?;
            status_counts.record(status, count);
        }

        gauge!("production_orders.in_progress", status_counts.in_progress as f64);
        gauge!("production_materials.low_stock", low_stock.len() as f64);

        Ok(DashboardSnapshot {
            lines: snapshots,
            low_stock,
            status_counts,
            reconciled,
        })
    }
}

/// Runs the reconciliation pass on a fixed interval.
pub fn spawn_reconciler(service: Arc<DashboardService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = every.as_secs(), "Starting reconciliation sweeper");
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = service.reconcile(Utc::now()).await {
                error!(error = %e, "Reconciliation sweep failed");
            }
        }
    })
}
