//! SeaORM entities for the marketplace tables.

pub mod cart_item;
pub mod category;
pub mod counter;
pub mod favorite;
pub mod order;
pub mod order_item;
pub mod product;
pub mod user;
