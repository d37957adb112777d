//! Warehouse registry domain module (event-sourced).
//!
//! Lifecycle of warehouse records: registration, detail updates, deletion.
//! Deletion is a domain event like any other; the rule that a warehouse with
//! stock cannot be deleted is a cross-aggregate check enforced by the
//! application layer against the stock-levels read model.

pub mod warehouse;

pub use warehouse::{
    AGGREGATE_TYPE, CreateWarehouse, DeleteWarehouse, UpdateWarehouse, Warehouse,
    WarehouseCommand, WarehouseCreated, WarehouseDeleted, WarehouseEvent, WarehouseId,
    WarehouseUpdated,
};
