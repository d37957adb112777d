//! Stock-level read model storage.
//!
//! Unlike the generic [`TenantStore`](super::TenantStore), this store knows
//! its rows: it refuses duplicate creation for a (product, warehouse) pair
//! and rejects negative quantities. It does NOT enforce the
//! reserved-within-on-hand invariant; that is the movement applier's job.
//! These checks only guard the store under at-least-once event delivery.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;

use shopkeeper_core::TenantId;
use shopkeeper_inventory::{ProductId, StockStatus};
use shopkeeper_warehousing::WarehouseId;

/// Identity of one stock level row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StockLevelKey {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
}

/// One materialized stock level: current numbers for one product in one
/// warehouse, rebuildable from the movement ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevelRow {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub minimum_quantity: i64,
    pub maximum_quantity: Option<i64>,
    pub bin_location: Option<String>,
    pub last_counted_at: Option<DateTime<Utc>>,
    pub last_counted_quantity: Option<i64>,
}

impl StockLevelRow {
    /// A fresh, all-zero row for a (product, warehouse) pair.
    pub fn empty(product_id: ProductId, warehouse_id: WarehouseId) -> Self {
        Self {
            product_id,
            warehouse_id,
            quantity: 0,
            reserved_quantity: 0,
            minimum_quantity: 0,
            maximum_quantity: None,
            bin_location: None,
            last_counted_at: None,
            last_counted_quantity: None,
        }
    }

    pub fn key(&self) -> StockLevelKey {
        StockLevelKey {
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
        }
    }

    pub fn available_quantity(&self) -> i64 {
        self.quantity - self.reserved_quantity
    }

    pub fn status(&self) -> StockStatus {
        StockStatus::classify(
            self.quantity,
            self.reserved_quantity,
            self.minimum_quantity,
            self.maximum_quantity,
        )
    }
}

#[derive(Debug, Error)]
pub enum StockLevelStoreError {
    /// A row already exists for the (product, warehouse) pair.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Negative quantity/reserved/minimum on a write.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Update target does not exist.
    #[error("missing stock level: {0}")]
    Missing(String),

    /// Backend failure (e.g. poisoned lock).
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Tenant-isolated store of stock level rows.
pub trait StockLevelStore: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &StockLevelKey) -> Option<StockLevelRow>;

    /// Create a row; fails with `Conflict` if the pair already has one.
    fn insert(&self, tenant_id: TenantId, row: StockLevelRow) -> Result<(), StockLevelStoreError>;

    /// Replace an existing row; fails with `Missing` if there is none.
    fn update(&self, tenant_id: TenantId, row: StockLevelRow) -> Result<(), StockLevelStoreError>;

    /// Remove one row; returns whether it existed.
    fn remove(&self, tenant_id: TenantId, key: &StockLevelKey) -> bool;

    fn list(&self, tenant_id: TenantId) -> Vec<StockLevelRow>;

    /// Clear all rows for a tenant (rebuild support).
    fn clear_tenant(&self, tenant_id: TenantId);
}

impl<S> StockLevelStore for Arc<S>
where
    S: StockLevelStore + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &StockLevelKey) -> Option<StockLevelRow> {
        (**self).get(tenant_id, key)
    }

    fn insert(&self, tenant_id: TenantId, row: StockLevelRow) -> Result<(), StockLevelStoreError> {
        (**self).insert(tenant_id, row)
    }

    fn update(&self, tenant_id: TenantId, row: StockLevelRow) -> Result<(), StockLevelStoreError> {
        (**self).update(tenant_id, row)
    }

    fn remove(&self, tenant_id: TenantId, key: &StockLevelKey) -> bool {
        (**self).remove(tenant_id, key)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<StockLevelRow> {
        (**self).list(tenant_id)
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        (**self).clear_tenant(tenant_id)
    }
}

fn validate(row: &StockLevelRow) -> Result<(), StockLevelStoreError> {
    if row.quantity < 0 {
        return Err(StockLevelStoreError::Validation(format!(
            "quantity cannot be negative (got {})",
            row.quantity
        )));
    }
    if row.reserved_quantity < 0 {
        return Err(StockLevelStoreError::Validation(format!(
            "reserved_quantity cannot be negative (got {})",
            row.reserved_quantity
        )));
    }
    if row.minimum_quantity < 0 {
        return Err(StockLevelStoreError::Validation(format!(
            "minimum_quantity cannot be negative (got {})",
            row.minimum_quantity
        )));
    }
    Ok(())
}

/// In-memory stock level store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStockLevelStore {
    inner: RwLock<HashMap<(TenantId, StockLevelKey), StockLevelRow>>,
}

impl InMemoryStockLevelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StockLevelStore for InMemoryStockLevelStore {
    fn get(&self, tenant_id: TenantId, key: &StockLevelKey) -> Option<StockLevelRow> {
        let map = self.inner.read().ok()?;
        map.get(&(tenant_id, *key)).cloned()
    }

    fn insert(&self, tenant_id: TenantId, row: StockLevelRow) -> Result<(), StockLevelStoreError> {
        validate(&row)?;
        let mut map = self
            .inner
            .write()
            .map_err(|_| StockLevelStoreError::Storage("lock poisoned".to_string()))?;

        let key = (tenant_id, row.key());
        if map.contains_key(&key) {
            return Err(StockLevelStoreError::Conflict(format!(
                "stock level already exists for product {} in warehouse {}",
                row.product_id, row.warehouse_id
            )));
        }
        map.insert(key, row);
        Ok(())
    }

    fn update(&self, tenant_id: TenantId, row: StockLevelRow) -> Result<(), StockLevelStoreError> {
        validate(&row)?;
        let mut map = self
            .inner
            .write()
            .map_err(|_| StockLevelStoreError::Storage("lock poisoned".to_string()))?;

        let key = (tenant_id, row.key());
        if !map.contains_key(&key) {
            return Err(StockLevelStoreError::Missing(format!(
                "no stock level for product {} in warehouse {}",
                row.product_id, row.warehouse_id
            )));
        }
        map.insert(key, row);
        Ok(())
    }

    fn remove(&self, tenant_id: TenantId, key: &StockLevelKey) -> bool {
        match self.inner.write() {
            Ok(mut map) => map.remove(&(tenant_id, *key)).is_some(),
            Err(_) => false,
        }
    }

    fn list(&self, tenant_id: TenantId) -> Vec<StockLevelRow> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((t, _k), v)| if *t == tenant_id { Some(v.clone()) } else { None })
            .collect()
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(t, _k), _v| *t != tenant_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopkeeper_core::AggregateId;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_row() -> StockLevelRow {
        StockLevelRow::empty(
            ProductId::new(AggregateId::new()),
            WarehouseId::new(AggregateId::new()),
        )
    }

    #[test]
    fn duplicate_insert_is_a_conflict() {
        let store = InMemoryStockLevelStore::new();
        let tenant_id = test_tenant_id();
        let row = test_row();

        store.insert(tenant_id, row.clone()).unwrap();
        let err = store.insert(tenant_id, row).unwrap_err();
        assert!(matches!(err, StockLevelStoreError::Conflict(_)));
    }

    #[test]
    fn negative_values_are_rejected() {
        let store = InMemoryStockLevelStore::new();
        let tenant_id = test_tenant_id();

        let mut row = test_row();
        row.quantity = -1;
        assert!(matches!(
            store.insert(tenant_id, row).unwrap_err(),
            StockLevelStoreError::Validation(_)
        ));

        let mut row = test_row();
        row.minimum_quantity = -5;
        assert!(matches!(
            store.insert(tenant_id, row).unwrap_err(),
            StockLevelStoreError::Validation(_)
        ));
    }

    #[test]
    fn update_requires_existing_row() {
        let store = InMemoryStockLevelStore::new();
        let err = store.update(test_tenant_id(), test_row()).unwrap_err();
        assert!(matches!(err, StockLevelStoreError::Missing(_)));
    }

    #[test]
    fn remove_reports_whether_a_row_existed() {
        let store = InMemoryStockLevelStore::new();
        let tenant_id = test_tenant_id();
        let row = test_row();

        assert!(!store.remove(tenant_id, &row.key()));
        store.insert(tenant_id, row.clone()).unwrap();
        assert!(store.remove(tenant_id, &row.key()));
        assert!(store.get(tenant_id, &row.key()).is_none());
    }

    #[test]
    fn rows_are_tenant_isolated() {
        let store = InMemoryStockLevelStore::new();
        let tenant_a = test_tenant_id();
        let tenant_b = test_tenant_id();
        let row = test_row();

        store.insert(tenant_a, row.clone()).unwrap();
        assert!(store.get(tenant_b, &row.key()).is_none());
        assert!(store.list(tenant_b).is_empty());
        assert_eq!(store.list(tenant_a).len(), 1);
    }
}
