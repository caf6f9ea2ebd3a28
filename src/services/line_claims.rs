//! Keeps a line's current-work-order pointer and the work order's own line
//! reference in agreement.
//!
//! Every path that claims, releases or preempts a line goes through here.
//! Writes are optimistic: each update carries the version it was read at and
//! fails with `ConcurrentModification` if another writer got there first.

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::{debug, info};

use crate::{
    entities::{
        product,
        production_line::{self, LineStatus},
        work_order::{self, WorkOrderStatus},
    },
    errors::ServiceError,
    events::Event,
};

pub async fn load_line<C: ConnectionTrait>(
    db: &C,
    line_id: i32,
) -> Result<production_line::Model, ServiceError> {
    production_line::Entity::find_by_id(line_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Production line", line_id))
}

pub async fn load_order<C: ConnectionTrait>(
    db: &C,
    order_id: i32,
) -> Result<work_order::Model, ServiceError> {
    work_order::Entity::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Work order", order_id))
}

pub async fn load_product<C: ConnectionTrait>(
    db: &C,
    product_id: i32,
) -> Result<product::Model, ServiceError> {
    product::Entity::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Product", product_id))
}

/// Writes `changes` to a line if nobody else updated it since it was read.
pub async fn persist_line<C, F>(
    db: &C,
    line: &production_line::Model,
    changes: F,
) -> Result<production_line::Model, ServiceError>
where
    C: ConnectionTrait,
    F: FnOnce(&mut production_line::ActiveModel),
{
    let mut active: production_line::ActiveModel = line.clone().into();
    changes(&mut active);
    active.version = Set(line.version + 1);
    active.updated_at = Set(Utc::now());

    let result = production_line::Entity::update(active)
        .filter(production_line::Column::Version.eq(line.version))
        .exec(db)
        .await;

    match result {
        Ok(updated) => Ok(updated),
        Err(DbErr::RecordNotUpdated) => {
            let exists = production_line::Entity::find_by_id(line.id).one(db).await?;
            Err(match exists {
                Some(_) => ServiceError::ConcurrentModification {
                    entity: "production line",
                    id: line.id,
                },
                None => ServiceError::not_found("Production line", line.id),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Writes `changes` to a work order if nobody else updated it since it was read.
pub async fn persist_order<C, F>(
    db: &C,
    order: &work_order::Model,
    changes: F,
) -> Result<work_order::Model, ServiceError>
where
    C: ConnectionTrait,
    F: FnOnce(&mut work_order::ActiveModel),
{
    let mut active: work_order::ActiveModel = order.clone().into();
    changes(&mut active);
    active.version = Set(order.version + 1);
    active.updated_at = Set(Utc::now());

    let result = work_order::Entity::update(active)
        .filter(work_order::Column::Version.eq(order.version))
        .exec(db)
        .await;

    match result {
        Ok(updated) => Ok(updated),
        Err(DbErr::RecordNotUpdated) => {
            let exists = work_order::Entity::find_by_id(order.id).one(db).await?;
            Err(match exists {
                Some(_) => ServiceError::ConcurrentModification {
                    entity: "work order",
                    id: order.id,
                },
                None => ServiceError::not_found("Work order", order.id),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Rejects a status change the lifecycle does not allow.
pub fn ensure_transition(
    order: &work_order::Model,
    next: WorkOrderStatus,
) -> Result<(), ServiceError> {
    if order.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(ServiceError::InvalidStatusTransition(format!(
            "work order {} cannot move from {} to {}",
            order.id, order.status, next
        )))
    }
}

/// Non-terminal orders that reference the line, oldest start first.
pub async fn active_orders_on_line<C: ConnectionTrait>(
    db: &C,
    line_id: i32,
) -> Result<Vec<work_order::Model>, ServiceError> {
    Ok(work_order::Entity::find()
        .filter(work_order::Column::ProductionLineId.eq(line_id))
        .filter(
            work_order::Column::Status
                .is_in([WorkOrderStatus::Pending, WorkOrderStatus::InProgress]),
        )
        .order_by_asc(work_order::Column::StartDate)
        .order_by_asc(work_order::Column::Id)
        .all(db)
        .await?)
}

/// The order holding the line: the pointer target if set, otherwise any
/// non-terminal order that reserved it.
pub async fn occupant<C: ConnectionTrait>(
    db: &C,
    line: &production_line::Model,
) -> Result<Option<work_order::Model>, ServiceError> {
    if let Some(current) = line.current_order() {
        if let Some(order) = work_order::Entity::find_by_id(current).one(db).await? {
            return Ok(Some(order));
        }
    }
    Ok(active_orders_on_line(db, line.id).await?.into_iter().next())
}

/// Checks that `order_id` (or a new order, when `None`) may reference the
/// line: the pointer must be empty or already ours, and no other live order
/// may hold a reservation on it.
pub async fn ensure_reservable<C: ConnectionTrait>(
    db: &C,
    line: &production_line::Model,
    order_id: Option<i32>,
) -> Result<(), ServiceError> {
    if let Some(current) = line.current_order() {
        if Some(current) != order_id {
            return Err(ServiceError::LineAlreadyAssigned {
                line_id: line.id,
                work_order_id: current,
            });
        }
    }

    if let Some(other) = active_orders_on_line(db, line.id)
        .await?
        .into_iter()
        .find(|o| Some(o.id) != order_id)
    {
        return Err(ServiceError::LineAlreadyAssigned {
            line_id: line.id,
            work_order_id: other.id,
        });
    }

    Ok(())
}

/// Reserves the line for `order_id` (or a new order, when `None`).
///
/// The line row is written even though nothing on it changes, so two
/// writers reserving from the same read collide on the version guard.
/// Returns the refreshed line.
pub async fn reserve<C: ConnectionTrait>(
    db: &C,
    line: &production_line::Model,
    order_id: Option<i32>,
) -> Result<production_line::Model, ServiceError> {
    let touched = persist_line(db, line, |_| {}).await?;
    ensure_reservable(db, &touched, order_id).await?;
    debug!(line_id = line.id, work_order_id = ?order_id, "Line reserved");
    Ok(touched)
}

/// Points the line at `order` and activates it. The order must already
/// reference the line.
pub async fn claim<C: ConnectionTrait>(
    db: &C,
    line: &production_line::Model,
    order: &work_order::Model,
    events: &mut Vec<Event>,
) -> Result<production_line::Model, ServiceError> {
    if let Some(current) = line.current_order() {
        if current != order.id {
            return Err(ServiceError::LineAlreadyAssigned {
                line_id: line.id,
                work_order_id: current,
            });
        }
    }
    if order.production_line_id != Some(line.id) {
        return Err(ServiceError::InternalError(format!(
            "work order {} does not reference line {}",
            order.id, line.id
        )));
    }

    let claimed = persist_line(db, line, |active| {
        active.current_work_order_id = Set(Some(order.id));
        active.status = Set(LineStatus::Active);
    })
    .await?;

    debug!(line_id = line.id, work_order_id = order.id, "Line claimed");
    events.push(Event::LineClaimed {
        line_id: line.id,
        work_order_id: order.id,
    });
    Ok(claimed)
}

/// Clears the pointer and stops the line.
pub async fn release<C: ConnectionTrait>(
    db: &C,
    line: &production_line::Model,
    events: &mut Vec<Event>,
) -> Result<production_line::Model, ServiceError> {
    let previous = line.current_order();
    let released = persist_line(db, line, |active| {
        active.current_work_order_id = Set(None);
        active.status = Set(LineStatus::Stopped);
    })
    .await?;

    debug!(line_id = line.id, previous_work_order_id = ?previous, "Line released");
    events.push(Event::LineReleased {
        line_id: line.id,
        work_order_id: previous,
    });
    Ok(released)
}

/// Releases the line only if its pointer names `order_id`.
pub async fn release_if_held<C: ConnectionTrait>(
    db: &C,
    line_id: i32,
    order_id: i32,
    events: &mut Vec<Event>,
) -> Result<Option<production_line::Model>, ServiceError> {
    let Some(line) = production_line::Entity::find_by_id(line_id).one(db).await? else {
        return Ok(None);
    };
    if line.current_order() == Some(order_id) {
        release(db, &line, events).await.map(Some)
    } else {
        Ok(None)
    }
}

/// Moves an order to a terminal status, detaching it from its line on both
/// sides. Used by cancel, 100% progress, reconciliation, stop and preemption.
pub async fn finish_order<C: ConnectionTrait>(
    db: &C,
    order: &work_order::Model,
    outcome: WorkOrderStatus,
    events: &mut Vec<Event>,
) -> Result<work_order::Model, ServiceError> {
    debug_assert!(outcome.is_terminal());
    ensure_transition(order, outcome)?;

    if let Some(line_id) = order.production_line_id {
        release_if_held(db, line_id, order.id, events).await?;
    }

    let finished = persist_order(db, order, |active| {
        active.status = Set(outcome);
        active.production_line_id = Set(None);
        if outcome == WorkOrderStatus::Completed {
            active.progress = Set(100);
        }
    })
    .await?;

    events.push(match outcome {
        WorkOrderStatus::Completed => Event::WorkOrderCompleted(order.id),
        _ => Event::WorkOrderCancelled(order.id),
    });
    Ok(finished)
}

/// Clears whatever holds the line so `incoming` can take it.
///
/// A running occupant whose estimated end has passed is completed; anything
/// else is cancelled. Returns the refreshed line.
pub async fn preempt<C: ConnectionTrait>(
    db: &C,
    line: &production_line::Model,
    incoming: Option<i32>,
    now: DateTime<Utc>,
    events: &mut Vec<Event>,
) -> Result<production_line::Model, ServiceError> {
    loop {
        let line = load_line(db, line.id).await?;
        let holder = match occupant(db, &line).await? {
            Some(order) if Some(order.id) != incoming => order,
            Some(_) | None => {
                // A pointer left at a missing or foreign order is cleared too.
                return match line.current_order() {
                    Some(current) if Some(current) != incoming => {
                        release(db, &line, events).await
                    }
                    _ => Ok(line),
                };
            }
        };

        if holder.status.is_terminal() {
            // Stale pointer at a finished order.
            release(db, &line, events).await?;
            continue;
        }

        let outcome = if holder.is_overdue(now) {
            WorkOrderStatus::Completed
        } else {
            WorkOrderStatus::Cancelled
        };

        info!(
            line_id = line.id,
            work_order_id = holder.id,
            outcome = %outcome,
            "Preempting work order"
        );
        finish_order(db, &holder, outcome, events).await?;
        events.push(Event::WorkOrderPreempted {
            work_order_id: holder.id,
            line_id: line.id,
            outcome,
        });
    }
}
