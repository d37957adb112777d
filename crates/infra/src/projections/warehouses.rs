use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use shopkeeper_core::{AggregateId, Entity, TenantId};
use shopkeeper_events::EventEnvelope;
use shopkeeper_warehousing::{WarehouseEvent, WarehouseId};

use crate::read_model::TenantStore;

/// Queryable warehouse directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseRow {
    pub warehouse_id: WarehouseId,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub is_primary: bool,
    pub total_capacity: Option<i64>,
    pub current_usage: Option<i64>,
}

impl Entity for WarehouseRow {
    type Id = WarehouseId;

    fn id(&self) -> &Self::Id {
        &self.warehouse_id
    }
}

/// Tenant+aggregate cursor to support at-least-once delivery (idempotent projection).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum WarehouseProjectionError {
    #[error("failed to deserialize warehouse event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Warehouse directory projection.
///
/// Maintains the per-tenant warehouse listing used for existence checks,
/// code-uniqueness checks and registry queries. Deleted warehouses drop out
/// of the directory; their stream remains in the ledger.
#[derive(Debug)]
pub struct WarehouseDirectoryProjection<S>
where
    S: TenantStore<WarehouseId, WarehouseRow>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> WarehouseDirectoryProjection<S>
where
    S: TenantStore<WarehouseId, WarehouseRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, tenant_id: TenantId, warehouse_id: &WarehouseId) -> Option<WarehouseRow> {
        self.store.get(tenant_id, warehouse_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<WarehouseRow> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        rows
    }

    /// Find a warehouse by its (trimmed) code. Codes are unique per tenant;
    /// the registry service enforces that before dispatching a create/update.
    pub fn find_by_code(&self, tenant_id: TenantId, code: &str) -> Option<WarehouseRow> {
        let code = code.trim();
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|row| row.code == code)
    }

    /// Apply a published envelope into the projection (idempotent).
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), WarehouseProjectionError> {
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
            return Err(WarehouseProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(WarehouseProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let event: WarehouseEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| WarehouseProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, warehouse_id) = match &event {
            WarehouseEvent::WarehouseCreated(e) => (e.tenant_id, e.warehouse_id),
            WarehouseEvent::WarehouseUpdated(e) => (e.tenant_id, e.warehouse_id),
            WarehouseEvent::WarehouseDeleted(e) => (e.tenant_id, e.warehouse_id),
        };
        if event_tenant != tenant_id {
            return Err(WarehouseProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if warehouse_id.0 != aggregate_id {
            return Err(WarehouseProjectionError::TenantIsolation(
                "event warehouse_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            WarehouseEvent::WarehouseCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.warehouse_id,
                    WarehouseRow {
                        warehouse_id: e.warehouse_id,
                        code: e.code,
                        name: e.name,
                        is_active: true,
                        is_primary: e.is_primary,
                        total_capacity: e.total_capacity,
                        current_usage: None,
                    },
                );
            }
            WarehouseEvent::WarehouseUpdated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.warehouse_id,
                    WarehouseRow {
                        warehouse_id: e.warehouse_id,
                        code: e.code,
                        name: e.name,
                        is_active: e.is_active,
                        is_primary: e.is_primary,
                        total_capacity: e.total_capacity,
                        current_usage: e.current_usage,
                    },
                );
            }
            WarehouseEvent::WarehouseDeleted(e) => {
                self.store.remove(tenant_id, &e.warehouse_id);
            }
        }

        // Advance cursor after successful apply.
        cursors.insert(key, seq);

        Ok(())
    }

    /// Rebuild the directory from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), WarehouseProjectionError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }

        let mut envs: Vec<_> = envelopes.into_iter().collect();

        {
            let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
            tenants.sort_by_key(|t| *t.as_uuid().as_bytes());
            tenants.dedup();
            for t in tenants {
                self.store.clear_tenant(t);
            }
        }

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
}
