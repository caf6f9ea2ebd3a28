use std::sync::Arc;

use rust_decimal::Decimal;

use crate::{
    db::DbPool,
    events::EventSender,
    services::{
        calculator::CalculatorService, dashboard::DashboardService, materials::MaterialService,
        production_lines::ProductionLineService, products::ProductService,
        work_orders::WorkOrderService,
    },
};

/// Builds service instances over one database handle and event channel
pub struct ServiceFactory {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    replenish_amount: Decimal,
}

impl ServiceFactory {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, replenish_amount: Decimal) -> Self {
        Self {
            db_pool,
            event_sender: Arc::new(event_sender),
            replenish_amount,
        }
    }

    pub fn work_order_service(&self) -> WorkOrderService {
        WorkOrderService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    pub fn production_line_service(&self) -> ProductionLineService {
        ProductionLineService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    pub fn material_service(&self) -> MaterialService {
        MaterialService::new(
            self.db_pool.clone(),
            self.event_sender.clone(),
            self.replenish_amount,
        )
    }

    pub fn product_service(&self) -> ProductService {
        ProductService::new(self.db_pool.clone())
    }

    pub fn dashboard_service(&self) -> DashboardService {
        DashboardService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    pub fn calculator_service(&self) -> CalculatorService {
        CalculatorService::new(self.db_pool.clone())
    }

    pub fn db_pool(&self) -> &Arc<DbPool> {
        &self.db_pool
    }
}

/// Every service the HTTP layer needs, shared behind `Arc`s
#[derive(Clone)]
pub struct AppServices {
    pub work_orders: Arc<WorkOrderService>,
    pub production_lines: Arc<ProductionLineService>,
    pub materials: Arc<MaterialService>,
    pub products: Arc<ProductService>,
    pub dashboard: Arc<DashboardService>,
    pub calculator: Arc<CalculatorService>,
}

impl AppServices {
    pub fn new(factory: &ServiceFactory) -> Self {
        Self {
            work_orders: Arc::new(factory.work_order_service()),
            production_lines: Arc::new(factory.production_line_service()),
            materials: Arc::new(factory.material_service()),
            products: Arc::new(factory.product_service()),
            dashboard: Arc::new(factory.dashboard_service()),
            calculator: Arc::new(factory.calculator_service()),
        }
    }
}
