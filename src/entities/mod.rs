//! SeaORM entities for the plant database.

pub mod material;
pub mod product;
pub mod product_material;
pub mod production_line;
pub mod work_order;
