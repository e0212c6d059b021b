//! SeaORM entities for the inventory schema

pub mod assignment_event;
pub mod brand;
pub mod category;
pub mod department;
pub mod employee;
pub mod location;
pub mod product;
pub mod product_type;
pub mod stock_movement;
pub mod sticker;
pub mod supplier;

pub use assignment_event::{EventKind, ReturnReason};
pub use product::{ProductCondition, ProductStatus};
pub use stock_movement::MovementKind;
pub use sticker::StickerKind;
