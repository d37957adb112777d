//! `shopkeeper-app` — caller-facing back-office services.
//!
//! Library/service boundary of the inventory core: a presentation layer
//! (HTTP, desktop, jobs) talks to [`BackOffice`] and never to the aggregates
//! or stores directly. `apply_movement` is the sole mutation entry point for
//! stock; warehouse lifecycle goes through the registry operations; all reads
//! go through the read models or the ledger query.

pub mod dto;
pub mod errors;
pub mod services;

pub use dto::{
    ConfigureLevelRequest, CreateWarehouseRequest, MovementPage, MovementQuery, MovementRequest,
    StockLevelFilter, StockMovementView, UpdateWarehouseRequest,
};
pub use errors::AppError;
pub use services::BackOffice;
