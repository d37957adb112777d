//! Inventory stock-ledger domain module (event-sourced).
//!
//! One `ProductStock` aggregate per tenant + product holds the per-warehouse
//! stock levels; every quantity-changing operation is a movement command that
//! becomes an immutable `MovementApplied` ledger entry. Both sides of a
//! transfer live in the same aggregate, so a transfer commits atomically.
//!
//! Pure, deterministic domain logic: no IO, no HTTP, no storage.

pub mod level;
pub mod movement;
pub mod stock;

pub use level::{StockLevel, StockStatus};
pub use movement::{MovementReference, MovementType};
pub use stock::{
    AGGREGATE_TYPE, ApplyMovement, ConfigureLevel, LevelConfigured, MovementApplied, ProductId,
    ProductStock, StockCommand, StockEvent,
};
