//! Request/response types of the service boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopkeeper_core::{TenantId, UserId};
use shopkeeper_infra::event_store::StoredEvent;
use shopkeeper_inventory::{MovementReference, MovementType, ProductId, StockEvent};
use shopkeeper_warehousing::WarehouseId;

use crate::errors::AppError;

/// Register a new warehouse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWarehouseRequest {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub total_capacity: Option<i64>,
}

/// Patch an existing warehouse; `None` fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWarehouseRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub is_primary: Option<bool>,
    pub total_capacity: Option<i64>,
    pub current_usage: Option<i64>,
}

/// One stock movement to apply.
///
/// `quantity` is a positive magnitude, except for `adjustment`/`count` where
/// it is the absolute target. `reference.reference_id` doubles as the
/// idempotency key when callers retry after a conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementRequest {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub related_warehouse_id: Option<WarehouseId>,
    pub quantity: i64,
    #[serde(default)]
    pub reference: MovementReference,
    #[serde(default)]
    pub recorded_by: Option<UserId>,
}

/// Patch reorder/ceiling/bin configuration of one stock level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigureLevelRequest {
    pub minimum_quantity: Option<i64>,
    pub maximum_quantity: Option<i64>,
    pub bin_location: Option<String>,
}

/// Optional criteria for stock level listings; fields combine with AND.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockLevelFilter {
    pub product_id: Option<ProductId>,
    pub warehouse_id: Option<WarehouseId>,
    pub status: Option<shopkeeper_inventory::StockStatus>,
}

/// Criteria + pagination for ledger listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementQuery {
    pub product_id: Option<ProductId>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// One decoded ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovementView {
    pub movement_id: Uuid,
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub warehouse_id: WarehouseId,
    pub related_warehouse_id: Option<WarehouseId>,
    pub quantity: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub reference: MovementReference,
    pub recorded_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
    /// Position in the product's ledger stream.
    pub sequence_number: u64,
}

impl StockMovementView {
    /// Decode a stored ledger entry. Fails on non-movement events; callers
    /// filter the query to `movement_applied` entries first.
    pub fn from_stored(stored: &StoredEvent) -> Result<Self, AppError> {
        let event: StockEvent = serde_json::from_value(stored.payload.clone())
            .map_err(|e| AppError::Infrastructure(format!("ledger entry decode failed: {e}")))?;

        match event {
            StockEvent::MovementApplied(e) => Ok(Self {
                movement_id: e.movement_id,
                product_id: e.product_id,
                movement_type: e.movement_type,
                warehouse_id: e.warehouse_id,
                related_warehouse_id: e.related_warehouse_id,
                quantity: e.quantity,
                quantity_before: e.quantity_before,
                quantity_after: e.quantity_after,
                reference: e.reference,
                recorded_by: e.recorded_by,
                occurred_at: e.occurred_at,
                sequence_number: stored.sequence_number,
            }),
            other => Err(AppError::Infrastructure(format!(
                "expected a movement ledger entry, found {other:?}"
            ))),
        }
    }
}

/// Paginated ledger listing.
#[derive(Debug, Clone)]
pub struct MovementPage {
    pub movements: Vec<StockMovementView>,
    /// Total entries matching the query across all pages.
    pub total: u64,
    pub has_more: bool,
}
