use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::entities::work_order::WorkOrderStatus;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends every event, logging instead of failing. Used after a commit,
    /// where the write has already happened.
    pub async fn publish_all(&self, events: Vec<Event>) {
        for event in events {
            if let Err(e) = self.send(event).await {
                warn!(error = %e, "Dropped domain event");
            }
        }
    }
}

/// Domain events emitted after a successful commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    WorkOrderCreated {
        work_order_id: i32,
        product_id: i32,
    },
    WorkOrderUpdated(i32),
    WorkOrderStarted {
        work_order_id: i32,
        line_id: Option<i32>,
    },
    WorkOrderProgressed {
        work_order_id: i32,
        progress: i32,
    },
    WorkOrderCompleted(i32),
    WorkOrderCancelled(i32),
    /// A running order was pushed off its line by a newer one
    WorkOrderPreempted {
        work_order_id: i32,
        line_id: i32,
        outcome: WorkOrderStatus,
    },
    LineClaimed {
        line_id: i32,
        work_order_id: i32,
    },
    LineReleased {
        line_id: i32,
        work_order_id: Option<i32>,
    },
    LineEfficiencyChanged {
        line_id: i32,
        efficiency_factor: f64,
    },
    MaterialStockChanged {
        material_id: i32,
        old_quantity: Decimal,
        new_quantity: Decimal,
    },
    MaterialsConsumed {
        work_order_id: i32,
        product_id: i32,
        quantity: i32,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::WorkOrderCreated { .. } => "work_order_created",
            Event::WorkOrderUpdated(_) => "work_order_updated",
            Event::WorkOrderStarted { .. } => "work_order_started",
            Event::WorkOrderProgressed { .. } => "work_order_progressed",
            Event::WorkOrderCompleted(_) => "work_order_completed",
            Event::WorkOrderCancelled(_) => "work_order_cancelled",
            Event::WorkOrderPreempted { .. } => "work_order_preempted",
            Event::LineClaimed { .. } => "line_claimed",
            Event::LineReleased { .. } => "line_released",
            Event::LineEfficiencyChanged { .. } => "line_efficiency_changed",
            Event::MaterialStockChanged { .. } => "material_stock_changed",
            Event::MaterialsConsumed { .. } => "materials_consumed",
        }
    }
}

pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("production_events.processed", 1, "event" => event.name());

        match &event {
            Event::WorkOrderPreempted {
                work_order_id,
                line_id,
                outcome,
            } => {
                info!(
                    work_order_id,
                    line_id,
                    outcome = %outcome,
                    "Work order preempted"
                );
            }
            Event::MaterialStockChanged {
                material_id,
                old_quantity,
                new_quantity,
            } => {
                info!(
                    material_id,
                    old_quantity = %old_quantity,
                    new_quantity = %new_quantity,
                    "Material stock changed"
                );
            }
            other => info!(event = other.name(), "Received event: {:?}", other),
        }
    }

    info!("Event channel closed; stopping event processing");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_all_delivers_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender
            .publish_all(vec![
                Event::WorkOrderCancelled(7),
                Event::LineReleased {
                    line_id: 1,
                    work_order_id: Some(7),
                },
            ])
            .await;

        assert_eq!(rx.recv().await, Some(Event::WorkOrderCancelled(7)));
        assert_eq!(rx.recv().await.map(|e| e.name()), Some("line_released"));
    }

    #[tokio::test]
    async fn closed_channel_does_not_fail_publisher() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender.send(Event::WorkOrderUpdated(1)).await.is_err());
        sender.publish_all(vec![Event::WorkOrderUpdated(1)]).await;
    }
}
