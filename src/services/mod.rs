// Shared scheduling primitives
pub mod bom;
pub mod line_claims;
pub mod scheduling;

// Catalog
pub mod materials;
pub mod products;

// Production
pub mod calculator;
pub mod dashboard;
pub mod production_lines;
pub mod work_orders;

// Service factory for dependency injection
pub mod factory;

pub use factory::{AppServices, ServiceFactory};
