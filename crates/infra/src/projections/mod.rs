//! Projection implementations (read model builders).
//!
//! Projections consume published envelopes and build query-optimized read
//! models. All projections are:
//! - **Rebuildable**: reconstructed from the event stream at any time
//! - **Tenant-isolated**: data is partitioned by tenant
//! - **Idempotent**: safe for at-least-once delivery
//!
//! The event streams are the source of truth; these read models are
//! disposable caches of them.

pub mod stock_levels;
pub mod warehouses;

pub use stock_levels::{StockLevelProjectionError, StockLevelsProjection};
pub use warehouses::{WarehouseDirectoryProjection, WarehouseProjectionError, WarehouseRow};
