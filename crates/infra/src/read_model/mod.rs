//! Tenant-isolated read model storage abstractions.

pub mod stock_levels;
pub mod tenant_store;

pub use stock_levels::{
    InMemoryStockLevelStore, StockLevelKey, StockLevelRow, StockLevelStore, StockLevelStoreError,
};
pub use tenant_store::{InMemoryTenantStore, TenantStore};
