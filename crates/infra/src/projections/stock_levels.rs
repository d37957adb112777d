use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use shopkeeper_core::{AggregateId, TenantId};
use shopkeeper_events::EventEnvelope;
use shopkeeper_inventory::{MovementType, ProductId, StockEvent, StockStatus};
use shopkeeper_warehousing::WarehouseId;

use crate::read_model::{StockLevelKey, StockLevelRow, StockLevelStore, StockLevelStoreError};

/// Tenant+aggregate cursor to support at-least-once delivery (idempotent projection).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum StockLevelProjectionError {
    #[error("failed to deserialize stock event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("read model store rejected write: {0}")]
    Store(#[from] StockLevelStoreError),
}

/// Stock levels projection.
///
/// Materializes the per-(product, warehouse) rows from movement ledger
/// envelopes. A transfer entry names both warehouses, so one event updates
/// two rows; the primary row is set from the event's after-snapshot, the
/// counterpart from the movement magnitude.
#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: StockLevelStore,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> StockLevelsProjection<S>
where
    S: StockLevelStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Query the read model for one product + warehouse.
    pub fn get(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Option<StockLevelRow> {
        self.store.get(
            tenant_id,
            &StockLevelKey {
                product_id,
                warehouse_id,
            },
        )
    }

    /// List all rows for a tenant.
    pub fn list(&self, tenant_id: TenantId) -> Vec<StockLevelRow> {
        self.store.list(tenant_id)
    }

    /// Rows currently classified low-stock (available at or below the reorder point).
    pub fn low_stock(&self, tenant_id: TenantId) -> Vec<StockLevelRow> {
        self.list_by_status(tenant_id, StockStatus::LowStock)
    }

    /// Rows with nothing available.
    pub fn out_of_stock(&self, tenant_id: TenantId) -> Vec<StockLevelRow> {
        self.list_by_status(tenant_id, StockStatus::OutOfStock)
    }

    pub fn list_by_status(&self, tenant_id: TenantId, status: StockStatus) -> Vec<StockLevelRow> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|row| row.status() == status)
            .collect();
        rows.sort_by_key(|row| (*row.product_id.0.as_uuid(), *row.warehouse_id.0.as_uuid()));
        rows
    }

    /// Whether any row references the warehouse (guards warehouse deletion).
    pub fn has_levels_for_warehouse(&self, tenant_id: TenantId, warehouse_id: WarehouseId) -> bool {
        self.store
            .list(tenant_id)
            .iter()
            .any(|row| row.warehouse_id == warehouse_id)
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Enforces tenant isolation
    /// - Enforces monotonic sequence per (tenant, aggregate) stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), StockLevelProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let mut cursors = match self.cursors.write() {
            Ok(c) => c,
            Err(_) => return Ok(()),
        };

        let key = CursorKey {
            tenant_id,
            aggregate_id,
        };
        let last = *cursors.get(&key).unwrap_or(&0);

        if seq == 0 {
            return Err(StockLevelProjectionError::NonMonotonicSequence { last, found: seq });
        }

        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(());
        }

        if seq != last + 1 && last != 0 {
            // First event may land at any positive sequence; after that we
            // require strict increments.
            return Err(StockLevelProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let event: StockEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| StockLevelProjectionError::Deserialize(e.to_string()))?;

        // Validate tenant isolation at the event level.
        let (event_tenant, product_id) = match &event {
            StockEvent::MovementApplied(e) => (e.tenant_id, e.product_id),
            StockEvent::LevelConfigured(e) => (e.tenant_id, e.product_id),
        };
        if event_tenant != tenant_id {
            return Err(StockLevelProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if product_id.0 != aggregate_id {
            return Err(StockLevelProjectionError::TenantIsolation(
                "event product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            StockEvent::MovementApplied(e) => {
                let primary = StockLevelKey {
                    product_id: e.product_id,
                    warehouse_id: e.warehouse_id,
                };
                match e.movement_type {
                    MovementType::Purchase
                    | MovementType::Return
                    | MovementType::Production
                    | MovementType::Sale
                    | MovementType::Damage
                    | MovementType::Adjustment => {
                        self.mutate_row(tenant_id, primary, |row| {
                            row.quantity = e.quantity_after;
                        })?;
                    }
                    MovementType::Count => {
                        self.mutate_row(tenant_id, primary, |row| {
                            row.quantity = e.quantity_after;
                            row.last_counted_at = Some(e.occurred_at);
                            row.last_counted_quantity = Some(e.quantity_after);
                        })?;
                    }
                    MovementType::TransferIn => {
                        self.mutate_row(tenant_id, primary, |row| {
                            row.quantity = e.quantity_after;
                        })?;
                        if let Some(source) = e.related_warehouse_id {
                            let source_key = StockLevelKey {
                                product_id: e.product_id,
                                warehouse_id: source,
                            };
                            self.mutate_row(tenant_id, source_key, |row| {
                                row.quantity -= e.quantity;
                            })?;
                        }
                    }
                    MovementType::TransferOut => {
                        self.mutate_row(tenant_id, primary, |row| {
                            row.quantity = e.quantity_after;
                        })?;
                        if let Some(destination) = e.related_warehouse_id {
                            let destination_key = StockLevelKey {
                                product_id: e.product_id,
                                warehouse_id: destination,
                            };
                            self.mutate_row(tenant_id, destination_key, |row| {
                                row.quantity += e.quantity;
                            })?;
                        }
                    }
                    MovementType::Reservation => {
                        self.mutate_row(tenant_id, primary, |row| {
                            row.reserved_quantity += e.quantity;
                        })?;
                    }
                    MovementType::Release => {
                        self.mutate_row(tenant_id, primary, |row| {
                            row.reserved_quantity -= e.quantity;
                        })?;
                    }
                }
            }
            StockEvent::LevelConfigured(e) => {
                let key = StockLevelKey {
                    product_id: e.product_id,
                    warehouse_id: e.warehouse_id,
                };
                self.mutate_row(tenant_id, key, |row| {
                    row.minimum_quantity = e.minimum_quantity;
                    row.maximum_quantity = e.maximum_quantity;
                    row.bin_location = e.bin_location.clone();
                })?;
            }
        }

        // Advance cursor after successful apply.
        cursors.insert(key, seq);

        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), StockLevelProjectionError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }

        let mut envs: Vec<_> = envelopes.into_iter().collect();

        // Clear read model per tenant before rebuilding.
        {
            let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
            tenants.sort_by_key(|t| *t.as_uuid().as_bytes());
            tenants.dedup();
            for t in tenants {
                self.store.clear_tenant(t);
            }
        }

        // Deterministic replay order: tenant, aggregate, sequence.
        envs.sort_by_key(|e| {
            (
                *e.tenant_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }

    /// Read-modify-write one row, creating it on first touch. The store's
    /// own checks (duplicate insert, negative values) still apply.
    fn mutate_row(
        &self,
        tenant_id: TenantId,
        key: StockLevelKey,
        f: impl FnOnce(&mut StockLevelRow),
    ) -> Result<(), StockLevelProjectionError> {
        match self.store.get(tenant_id, &key) {
            Some(mut row) => {
                f(&mut row);
                self.store.update(tenant_id, row)?;
            }
            None => {
                let mut row = StockLevelRow::empty(key.product_id, key.warehouse_id);
                f(&mut row);
                self.store.insert(tenant_id, row)?;
            }
        }
        Ok(())
    }
}
