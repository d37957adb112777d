//! Back-office service wiring and operations.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use shopkeeper_core::{AggregateId, TenantId};
use shopkeeper_events::{EventEnvelope, InMemoryEventBus};
use shopkeeper_infra::command_dispatcher::CommandDispatcher;
use shopkeeper_infra::event_store::{
    EventFilter, EventQuery, InMemoryEventStore, Pagination, StoredEvent,
};
use shopkeeper_infra::projections::{StockLevelsProjection, WarehouseDirectoryProjection, WarehouseRow};
use shopkeeper_infra::read_model::{InMemoryStockLevelStore, InMemoryTenantStore, StockLevelRow};
use shopkeeper_inventory::{
    ApplyMovement, ConfigureLevel, ProductId, ProductStock, StockCommand,
};
use shopkeeper_warehousing::{
    CreateWarehouse, DeleteWarehouse, UpdateWarehouse, Warehouse, WarehouseCommand, WarehouseId,
};

use crate::dto::{
    ConfigureLevelRequest, CreateWarehouseRequest, MovementPage, MovementQuery, MovementRequest,
    StockLevelFilter, StockMovementView, UpdateWarehouseRequest,
};
use crate::errors::AppError;

const MOVEMENT_EVENT_TYPE: &str = "inventory.stock.movement_applied";

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;

/// The back-office core, wired with the embedded in-memory backends.
///
/// All mutations go through the command dispatcher (one atomic append per
/// operation, optimistic concurrency); committed events are fed to the
/// projections synchronously so the facade's own reads observe them, and are
/// also published on the bus for any external subscribers. Projections being
/// idempotent, the double feed is harmless.
pub struct BackOffice {
    dispatcher: Dispatcher,
    event_store: Arc<InMemoryEventStore>,
    event_bus: Bus,
    stock_levels: Arc<StockLevelsProjection<Arc<InMemoryStockLevelStore>>>,
    warehouses: Arc<WarehouseDirectoryProjection<Arc<InMemoryTenantStore<WarehouseId, WarehouseRow>>>>,
}

impl BackOffice {
    pub fn in_memory() -> Self {
        let event_store = Arc::new(InMemoryEventStore::new());
        let event_bus: Bus = Arc::new(InMemoryEventBus::new());
        let dispatcher = CommandDispatcher::new(event_store.clone(), event_bus.clone());
        let stock_levels = Arc::new(StockLevelsProjection::new(Arc::new(
            InMemoryStockLevelStore::new(),
        )));
        let warehouses = Arc::new(WarehouseDirectoryProjection::new(Arc::new(
            InMemoryTenantStore::new(),
        )));

        Self {
            dispatcher,
            event_store,
            event_bus,
            stock_levels,
            warehouses,
        }
    }

    pub fn event_bus(&self) -> &Bus {
        &self.event_bus
    }

    /// Feed committed events into the read models this facade queries.
    fn project(&self, committed: &[StoredEvent]) -> Result<(), AppError> {
        for stored in committed {
            let envelope = stored.to_envelope();
            match stored.aggregate_type.as_str() {
                shopkeeper_inventory::AGGREGATE_TYPE => {
                    self.stock_levels.apply_envelope(&envelope)?;
                }
                shopkeeper_warehousing::AGGREGATE_TYPE => {
                    self.warehouses.apply_envelope(&envelope)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Warehouse registry
    // ------------------------------------------------------------------

    pub fn create_warehouse(
        &self,
        tenant_id: TenantId,
        request: CreateWarehouseRequest,
    ) -> Result<WarehouseRow, AppError> {
        let code = request.code.trim();
        if !code.is_empty() && self.warehouses.find_by_code(tenant_id, code).is_some() {
            return Err(AppError::Conflict(format!(
                "warehouse code '{code}' is already in use"
            )));
        }

        let warehouse_id = WarehouseId::new(AggregateId::new());
        let command = CreateWarehouse {
            tenant_id,
            warehouse_id,
            code: request.code,
            name: request.name,
            is_primary: request.is_primary,
            total_capacity: request.total_capacity,
            occurred_at: Utc::now(),
        };

        let committed = self.dispatch_warehouse(
            tenant_id,
            warehouse_id,
            WarehouseCommand::CreateWarehouse(command),
        )?;
        self.project(&committed)?;

        tracing::info!(%tenant_id, %warehouse_id, "warehouse created");

        self.warehouses
            .get(tenant_id, &warehouse_id)
            .ok_or_else(|| AppError::Infrastructure("warehouse row missing after create".to_string()))
    }

    pub fn update_warehouse(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        request: UpdateWarehouseRequest,
    ) -> Result<WarehouseRow, AppError> {
        let current = self
            .warehouses
            .get(tenant_id, &warehouse_id)
            .ok_or_else(|| AppError::NotFound(format!("warehouse {warehouse_id} not found")))?;

        if let Some(code) = request.code.as_deref() {
            let code = code.trim();
            if !code.is_empty()
                && code != current.code
                && self.warehouses.find_by_code(tenant_id, code).is_some()
            {
                return Err(AppError::Conflict(format!(
                    "warehouse code '{code}' is already in use"
                )));
            }
        }

        let command = UpdateWarehouse {
            tenant_id,
            warehouse_id,
            code: request.code,
            name: request.name,
            is_active: request.is_active,
            is_primary: request.is_primary,
            total_capacity: request.total_capacity,
            current_usage: request.current_usage,
            occurred_at: Utc::now(),
        };

        let committed = self.dispatch_warehouse(
            tenant_id,
            warehouse_id,
            WarehouseCommand::UpdateWarehouse(command),
        )?;
        self.project(&committed)?;

        self.warehouses
            .get(tenant_id, &warehouse_id)
            .ok_or_else(|| AppError::Infrastructure("warehouse row missing after update".to_string()))
    }

    /// Delete a warehouse. Blocked while any stock level row references it;
    /// retire warehouses with ledger history via `is_active = false` instead.
    pub fn delete_warehouse(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
    ) -> Result<(), AppError> {
        if self.warehouses.get(tenant_id, &warehouse_id).is_none() {
            return Err(AppError::NotFound(format!("warehouse {warehouse_id} not found")));
        }
        if self
            .stock_levels
            .has_levels_for_warehouse(tenant_id, warehouse_id)
        {
            return Err(AppError::Conflict(
                "warehouse has stock levels and cannot be deleted".to_string(),
            ));
        }

        let command = DeleteWarehouse {
            tenant_id,
            warehouse_id,
            occurred_at: Utc::now(),
        };
        let committed = self.dispatch_warehouse(
            tenant_id,
            warehouse_id,
            WarehouseCommand::DeleteWarehouse(command),
        )?;
        self.project(&committed)?;

        tracing::info!(%tenant_id, %warehouse_id, "warehouse deleted");
        Ok(())
    }

    pub fn get_warehouse(&self, tenant_id: TenantId, warehouse_id: WarehouseId) -> Option<WarehouseRow> {
        self.warehouses.get(tenant_id, &warehouse_id)
    }

    pub fn list_warehouses(&self, tenant_id: TenantId) -> Vec<WarehouseRow> {
        self.warehouses.list(tenant_id)
    }

    fn dispatch_warehouse(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        command: WarehouseCommand,
    ) -> Result<Vec<StoredEvent>, AppError> {
        self.dispatcher
            .dispatch(
                tenant_id,
                warehouse_id.0,
                shopkeeper_warehousing::AGGREGATE_TYPE,
                command,
                |_, id| Warehouse::empty(WarehouseId::new(id)),
            )
            .map_err(AppError::from)
    }

    // ------------------------------------------------------------------
    // Stock movements
    // ------------------------------------------------------------------

    /// Apply one stock movement: the sole mutation entry point for stock.
    ///
    /// Fails fast before any write: referenced warehouses must exist, transfer
    /// requests must name a counterpart. The aggregate enforces the quantity
    /// rules; the dispatcher makes the whole read-decide-append atomic. On a
    /// concurrent-writer conflict this returns `AppError::Conflict` and the
    /// caller retries the whole call.
    pub fn apply_movement(&self, request: MovementRequest) -> Result<StockMovementView, AppError> {
        let tenant_id = request.tenant_id;

        self.ensure_warehouse_exists(tenant_id, request.warehouse_id)?;
        if request.movement_type.is_transfer() {
            let related = request.related_warehouse_id.ok_or_else(|| {
                AppError::Validation("transfer requires related_warehouse_id".to_string())
            })?;
            self.ensure_warehouse_exists(tenant_id, related)?;
        }

        let command = ApplyMovement {
            tenant_id,
            product_id: request.product_id,
            movement_id: Uuid::now_v7(),
            movement_type: request.movement_type,
            warehouse_id: request.warehouse_id,
            related_warehouse_id: request.related_warehouse_id,
            quantity: request.quantity,
            reference: request.reference,
            recorded_by: request.recorded_by,
            occurred_at: Utc::now(),
        };

        let committed = self
            .dispatch_stock(tenant_id, request.product_id, StockCommand::ApplyMovement(command))
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound(
                    "no stock level exists for this product and warehouse".to_string(),
                ),
                other => other,
            })?;
        self.project(&committed)?;

        let stored = committed
            .first()
            .ok_or_else(|| AppError::Infrastructure("movement produced no ledger entry".to_string()))?;
        let view = StockMovementView::from_stored(stored)?;

        tracing::info!(
            %tenant_id,
            product_id = %view.product_id,
            movement_type = %view.movement_type,
            quantity = view.quantity,
            "movement applied"
        );

        Ok(view)
    }

    /// Patch reorder/ceiling/bin configuration of an existing stock level.
    pub fn configure_stock_level(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        request: ConfigureLevelRequest,
    ) -> Result<StockLevelRow, AppError> {
        self.ensure_warehouse_exists(tenant_id, warehouse_id)?;

        let command = ConfigureLevel {
            tenant_id,
            product_id,
            warehouse_id,
            minimum_quantity: request.minimum_quantity,
            maximum_quantity: request.maximum_quantity,
            bin_location: request.bin_location,
            occurred_at: Utc::now(),
        };

        let committed = self
            .dispatch_stock(tenant_id, product_id, StockCommand::ConfigureLevel(command))
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound(
                    "no stock level exists for this product and warehouse".to_string(),
                ),
                other => other,
            })?;
        self.project(&committed)?;

        self.stock_levels
            .get(tenant_id, product_id, warehouse_id)
            .ok_or_else(|| AppError::Infrastructure("stock level missing after configure".to_string()))
    }

    fn dispatch_stock(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        command: StockCommand,
    ) -> Result<Vec<StoredEvent>, AppError> {
        self.dispatcher
            .dispatch(
                tenant_id,
                product_id.0,
                shopkeeper_inventory::AGGREGATE_TYPE,
                command,
                |_, id| ProductStock::empty(ProductId::new(id)),
            )
            .map_err(AppError::from)
    }

    fn ensure_warehouse_exists(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
    ) -> Result<(), AppError> {
        if self.warehouses.get(tenant_id, &warehouse_id).is_none() {
            return Err(AppError::NotFound(format!(
                "warehouse {warehouse_id} not found"
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reporting queries (read models; eventually consistent with the ledger)
    // ------------------------------------------------------------------

    pub fn get_stock_level(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Option<StockLevelRow> {
        self.stock_levels.get(tenant_id, product_id, warehouse_id)
    }

    pub fn get_stock_levels(
        &self,
        tenant_id: TenantId,
        filter: StockLevelFilter,
    ) -> Vec<StockLevelRow> {
        let mut rows: Vec<_> = self
            .stock_levels
            .list(tenant_id)
            .into_iter()
            .filter(|row| filter.product_id.is_none_or(|p| row.product_id == p))
            .filter(|row| filter.warehouse_id.is_none_or(|w| row.warehouse_id == w))
            .filter(|row| filter.status.is_none_or(|s| row.status() == s))
            .collect();
        rows.sort_by_key(|row| (*row.product_id.0.as_uuid(), *row.warehouse_id.0.as_uuid()));
        rows
    }

    pub fn get_low_stock_products(&self, tenant_id: TenantId) -> Vec<StockLevelRow> {
        self.stock_levels.low_stock(tenant_id)
    }

    pub fn get_out_of_stock_products(&self, tenant_id: TenantId) -> Vec<StockLevelRow> {
        self.stock_levels.out_of_stock(tenant_id)
    }

    /// Audit read of the movement ledger, most recent first.
    pub fn get_stock_movements(
        &self,
        tenant_id: TenantId,
        query: MovementQuery,
    ) -> Result<MovementPage, AppError> {
        let filter = EventFilter {
            aggregate_id: query.product_id.map(|p| p.0),
            aggregate_type: Some(shopkeeper_inventory::AGGREGATE_TYPE.to_string()),
            event_type: Some(MOVEMENT_EVENT_TYPE.to_string()),
            occurred_after: query.occurred_after,
            occurred_before: query.occurred_before,
        };

        let result = self.event_store.query_events(
            tenant_id,
            filter,
            Pagination::new(query.limit, query.offset),
        )?;

        let movements = result
            .events
            .iter()
            .map(StockMovementView::from_stored)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MovementPage {
            movements,
            total: result.total,
            has_more: result.has_more,
        })
    }
}

impl Default for BackOffice {
    fn default() -> Self {
        Self::in_memory()
    }
}
