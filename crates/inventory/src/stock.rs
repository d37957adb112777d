use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopkeeper_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use shopkeeper_events::Event;
use shopkeeper_warehousing::WarehouseId;

use crate::level::StockLevel;
use crate::movement::{MovementReference, MovementType};

/// Stable aggregate type identifier for product-stock streams.
pub const AGGREGATE_TYPE: &str = "inventory.product_stock";

/// Product identifier (tenant-scoped via `tenant_id` fields in events/commands).
///
/// Product catalog management lives outside this module; here the id only
/// keys the stock stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: all stock of one product across the tenant's warehouses.
///
/// The event stream of this aggregate IS the product's movement ledger; the
/// per-warehouse `StockLevel` map is state rehydrated from it. Invariants
/// protected on every decision:
/// - `quantity >= 0` per warehouse
/// - `0 <= reserved_quantity <= quantity` per warehouse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStock {
    id: ProductId,
    tenant_id: Option<TenantId>,
    levels: HashMap<WarehouseId, StockLevel>,
    version: u64,
}

impl ProductStock {
    /// Create an empty aggregate instance for rehydration.
    ///
    /// There is no explicit "create" command: the stream begins with the
    /// first movement that touches the product.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            levels: HashMap::new(),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn level(&self, warehouse_id: &WarehouseId) -> Option<&StockLevel> {
        self.levels.get(warehouse_id)
    }

    pub fn levels(&self) -> &HashMap<WarehouseId, StockLevel> {
        &self.levels
    }

    /// Sum of on-hand quantities across warehouses.
    pub fn total_quantity(&self) -> i64 {
        self.levels.values().map(|l| l.quantity).sum()
    }
}

impl AggregateRoot for ProductStock {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ApplyMovement.
///
/// `quantity` is a positive magnitude, except for `adjustment`/`count` where
/// it is the absolute target on-hand value (>= 0). For transfers,
/// `warehouse_id` is the primary warehouse (destination for `transfer_in`,
/// source for `transfer_out`) and `related_warehouse_id` the counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyMovement {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub movement_id: Uuid,
    pub movement_type: MovementType,
    pub warehouse_id: WarehouseId,
    pub related_warehouse_id: Option<WarehouseId>,
    pub quantity: i64,
    pub reference: MovementReference,
    pub recorded_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfigureLevel.
///
/// Sets reorder/ceiling/bin configuration on an existing level. `None` fields
/// keep the current value. Routed through the aggregate so that read models
/// stay rebuildable from the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigureLevel {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub minimum_quantity: Option<i64>,
    pub maximum_quantity: Option<i64>,
    pub bin_location: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    ApplyMovement(ApplyMovement),
    ConfigureLevel(ConfigureLevel),
}

/// Event: MovementApplied. One immutable ledger entry.
///
/// `quantity_before`/`quantity_after` snapshot the on-hand quantity of the
/// primary warehouse; reservation/release leave it unchanged (their effect is
/// on the reserved counter, derived from `movement_type` + `quantity`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementApplied {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub movement_id: Uuid,
    pub movement_type: MovementType,
    pub warehouse_id: WarehouseId,
    pub related_warehouse_id: Option<WarehouseId>,
    pub quantity: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub reference: MovementReference,
    pub recorded_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LevelConfigured (carries resolved values, not a diff).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelConfigured {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub minimum_quantity: i64,
    pub maximum_quantity: Option<i64>,
    pub bin_location: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    MovementApplied(MovementApplied),
    LevelConfigured(LevelConfigured),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::MovementApplied(_) => "inventory.stock.movement_applied",
            StockEvent::LevelConfigured(_) => "inventory.stock.level_configured",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::MovementApplied(e) => e.occurred_at,
            StockEvent::LevelConfigured(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProductStock {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::MovementApplied(e) => {
                self.tenant_id = Some(e.tenant_id);
                self.id = e.product_id;

                match e.movement_type {
                    MovementType::Purchase
                    | MovementType::Return
                    | MovementType::Production
                    | MovementType::Sale
                    | MovementType::Damage
                    | MovementType::Adjustment => {
                        self.level_entry(e.warehouse_id).quantity = e.quantity_after;
                    }
                    MovementType::Count => {
                        let level = self.level_entry(e.warehouse_id);
                        level.quantity = e.quantity_after;
                        level.last_counted_at = Some(e.occurred_at);
                        level.last_counted_quantity = Some(e.quantity_after);
                    }
                    MovementType::TransferIn => {
                        self.level_entry(e.warehouse_id).quantity = e.quantity_after;
                        if let Some(source) = e.related_warehouse_id {
                            self.level_entry(source).quantity -= e.quantity;
                        }
                    }
                    MovementType::TransferOut => {
                        self.level_entry(e.warehouse_id).quantity = e.quantity_after;
                        if let Some(destination) = e.related_warehouse_id {
                            self.level_entry(destination).quantity += e.quantity;
                        }
                    }
                    MovementType::Reservation => {
                        self.level_entry(e.warehouse_id).reserved_quantity += e.quantity;
                    }
                    MovementType::Release => {
                        self.level_entry(e.warehouse_id).reserved_quantity -= e.quantity;
                    }
                }
            }
            StockEvent::LevelConfigured(e) => {
                self.tenant_id = Some(e.tenant_id);
                self.id = e.product_id;
                let level = self.level_entry(e.warehouse_id);
                level.minimum_quantity = e.minimum_quantity;
                level.maximum_quantity = e.maximum_quantity;
                level.bin_location = e.bin_location.clone();
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::ApplyMovement(cmd) => self.handle_movement(cmd),
            StockCommand::ConfigureLevel(cmd) => self.handle_configure(cmd),
        }
    }
}

impl ProductStock {
    fn level_entry(&mut self, warehouse_id: WarehouseId) -> &mut StockLevel {
        self.levels.entry(warehouse_id).or_default()
    }

    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        match self.tenant_id {
            Some(t) if t != tenant_id => Err(DomainError::invariant("tenant mismatch")),
            _ => Ok(()),
        }
    }

    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn existing_level(&self, warehouse_id: WarehouseId) -> Result<&StockLevel, DomainError> {
        self.levels.get(&warehouse_id).ok_or(DomainError::NotFound)
    }

    /// Validate and resolve the counterpart warehouse of a transfer.
    fn transfer_counterpart(&self, cmd: &ApplyMovement) -> Result<WarehouseId, DomainError> {
        let related = cmd
            .related_warehouse_id
            .ok_or_else(|| DomainError::validation("transfer requires related_warehouse_id"))?;
        if related == cmd.warehouse_id {
            return Err(DomainError::validation(
                "transfer requires two distinct warehouses",
            ));
        }
        Ok(related)
    }

    /// Decide a movement: compute the primary warehouse's before/after
    /// snapshot, rejecting anything that would break a level invariant.
    /// No state is mutated here; the emitted event carries everything
    /// `apply` needs.
    fn handle_movement(&self, cmd: &ApplyMovement) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_product_id(cmd.product_id)?;

        let (quantity_before, quantity_after) = match cmd.movement_type {
            MovementType::Purchase | MovementType::Return | MovementType::Production => {
                let quantity = positive_quantity(cmd)?;
                // Missing level is fine: an inbound movement creates it.
                let before = self.levels.get(&cmd.warehouse_id).map_or(0, |l| l.quantity);
                let after = before
                    .checked_add(quantity)
                    .ok_or_else(|| DomainError::invariant("on-hand quantity overflow"))?;
                (before, after)
            }

            MovementType::Sale | MovementType::Damage => {
                let quantity = positive_quantity(cmd)?;
                let level = self.existing_level(cmd.warehouse_id)?;
                let available = level.available_quantity();
                if quantity > available {
                    return Err(DomainError::insufficient_stock(format!(
                        "requested {quantity}, available {available}"
                    )));
                }
                (level.quantity, level.quantity - quantity)
            }

            MovementType::TransferIn => {
                let quantity = positive_quantity(cmd)?;
                let source_id = self.transfer_counterpart(cmd)?;
                let source = self.existing_level(source_id)?;
                let available = source.available_quantity();
                if quantity > available {
                    return Err(DomainError::insufficient_stock(format!(
                        "requested {quantity}, available {available} at source"
                    )));
                }
                // Destination may not exist yet; the movement creates it.
                let before = self.levels.get(&cmd.warehouse_id).map_or(0, |l| l.quantity);
                let after = before
                    .checked_add(quantity)
                    .ok_or_else(|| DomainError::invariant("on-hand quantity overflow"))?;
                (before, after)
            }

            MovementType::TransferOut => {
                let quantity = positive_quantity(cmd)?;
                let destination_id = self.transfer_counterpart(cmd)?;
                let source = self.existing_level(cmd.warehouse_id)?;
                let available = source.available_quantity();
                if quantity > available {
                    return Err(DomainError::insufficient_stock(format!(
                        "requested {quantity}, available {available}"
                    )));
                }
                let destination_qty =
                    self.levels.get(&destination_id).map_or(0, |l| l.quantity);
                destination_qty
                    .checked_add(quantity)
                    .ok_or_else(|| DomainError::invariant("on-hand quantity overflow"))?;
                (source.quantity, source.quantity - quantity)
            }

            MovementType::Adjustment | MovementType::Count => {
                let target = cmd.quantity;
                if target < 0 {
                    return Err(DomainError::validation(
                        "target quantity cannot be negative",
                    ));
                }
                match self.levels.get(&cmd.warehouse_id) {
                    Some(level) => {
                        if target < level.reserved_quantity {
                            return Err(DomainError::invariant(
                                "reserved quantity would exceed on-hand quantity",
                            ));
                        }
                        (level.quantity, target)
                    }
                    // A level can only come into existence with stock in it.
                    None if target > 0 => (0, target),
                    None => return Err(DomainError::NotFound),
                }
            }

            MovementType::Reservation => {
                let quantity = positive_quantity(cmd)?;
                let level = self.existing_level(cmd.warehouse_id)?;
                let new_reserved = level
                    .reserved_quantity
                    .checked_add(quantity)
                    .ok_or_else(|| DomainError::invariant("reserved quantity overflow"))?;
                if new_reserved > level.quantity {
                    return Err(DomainError::invariant(
                        "reserved quantity would exceed on-hand quantity",
                    ));
                }
                (level.quantity, level.quantity)
            }

            MovementType::Release => {
                let quantity = positive_quantity(cmd)?;
                let level = self.existing_level(cmd.warehouse_id)?;
                if quantity > level.reserved_quantity {
                    return Err(DomainError::insufficient_stock(format!(
                        "release of {quantity} exceeds reserved {}",
                        level.reserved_quantity
                    )));
                }
                (level.quantity, level.quantity)
            }
        };

        Ok(vec![StockEvent::MovementApplied(MovementApplied {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            movement_id: cmd.movement_id,
            movement_type: cmd.movement_type,
            warehouse_id: cmd.warehouse_id,
            related_warehouse_id: cmd.related_warehouse_id,
            quantity: cmd.quantity,
            quantity_before,
            quantity_after,
            reference: cmd.reference.clone(),
            recorded_by: cmd.recorded_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_configure(&self, cmd: &ConfigureLevel) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_product_id(cmd.product_id)?;

        let level = self.existing_level(cmd.warehouse_id)?;

        let minimum = cmd.minimum_quantity.unwrap_or(level.minimum_quantity);
        if minimum < 0 {
            return Err(DomainError::validation("minimum_quantity cannot be negative"));
        }
        let maximum = cmd.maximum_quantity.or(level.maximum_quantity);
        if maximum.is_some_and(|m| m < 0) {
            return Err(DomainError::validation("maximum_quantity cannot be negative"));
        }
        let bin_location = cmd.bin_location.clone().or_else(|| level.bin_location.clone());

        Ok(vec![StockEvent::LevelConfigured(LevelConfigured {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            warehouse_id: cmd.warehouse_id,
            minimum_quantity: minimum,
            maximum_quantity: maximum,
            bin_location,
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn positive_quantity(cmd: &ApplyMovement) -> Result<i64, DomainError> {
    if cmd.quantity <= 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }
    Ok(cmd.quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_warehouse_id() -> WarehouseId {
        WarehouseId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn movement(
        tenant_id: TenantId,
        product_id: ProductId,
        movement_type: MovementType,
        warehouse_id: WarehouseId,
        quantity: i64,
    ) -> ApplyMovement {
        ApplyMovement {
            tenant_id,
            product_id,
            movement_id: Uuid::now_v7(),
            movement_type,
            warehouse_id,
            related_warehouse_id: None,
            quantity,
            reference: MovementReference::default(),
            recorded_by: None,
            occurred_at: test_time(),
        }
    }

    /// Decide + apply, returning the recorded ledger entry.
    fn apply_ok(stock: &mut ProductStock, cmd: ApplyMovement) -> MovementApplied {
        let events = stock.handle(&StockCommand::ApplyMovement(cmd)).unwrap();
        assert_eq!(events.len(), 1);
        for e in &events {
            stock.apply(e);
        }
        match events.into_iter().next().unwrap() {
            StockEvent::MovementApplied(e) => e,
            other => panic!("Expected MovementApplied, got {other:?}"),
        }
    }

    #[test]
    fn purchase_creates_level_and_snapshots_quantities() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let warehouse = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);

        let e = apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Purchase, warehouse, 10),
        );

        assert_eq!(e.quantity_before, 0);
        assert_eq!(e.quantity_after, 10);
        assert_eq!(stock.level(&warehouse).unwrap().quantity, 10);
        assert_eq!(stock.tenant_id(), Some(tenant_id));
    }

    #[test]
    fn sale_reduces_quantity_and_leaves_reservation() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let warehouse = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);

        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Purchase, warehouse, 10),
        );
        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Reservation, warehouse, 2),
        );

        let e = apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Sale, warehouse, 5),
        );
        assert_eq!(e.quantity_before, 10);
        assert_eq!(e.quantity_after, 5);

        let level = stock.level(&warehouse).unwrap();
        assert_eq!(level.quantity, 5);
        assert_eq!(level.reserved_quantity, 2);
        assert_eq!(level.available_quantity(), 3);
    }

    #[test]
    fn sale_beyond_available_fails_and_changes_nothing() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let warehouse = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);

        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Purchase, warehouse, 10),
        );
        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Reservation, warehouse, 2),
        );
        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Sale, warehouse, 5),
        );

        let snapshot = stock.clone();
        let err = stock
            .handle(&StockCommand::ApplyMovement(movement(
                tenant_id,
                product_id,
                MovementType::Sale,
                warehouse,
                10,
            )))
            .unwrap_err();

        assert!(matches!(err, DomainError::InsufficientStock(_)));
        assert_eq!(stock, snapshot);
        assert_eq!(stock.level(&warehouse).unwrap().quantity, 5);
    }

    #[test]
    fn sale_against_unknown_level_is_not_found() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let stock = ProductStock::empty(product_id);

        let err = stock
            .handle(&StockCommand::ApplyMovement(movement(
                tenant_id,
                product_id,
                MovementType::Sale,
                test_warehouse_id(),
                1,
            )))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn transfer_conserves_total_and_creates_destination() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let w1 = test_warehouse_id();
        let w2 = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);

        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Purchase, w1, 5),
        );

        let mut cmd = movement(tenant_id, product_id, MovementType::TransferIn, w2, 4);
        cmd.related_warehouse_id = Some(w1);
        let e = apply_ok(&mut stock, cmd);

        assert_eq!(e.quantity_before, 0);
        assert_eq!(e.quantity_after, 4);
        assert_eq!(stock.level(&w1).unwrap().quantity, 1);
        assert_eq!(stock.level(&w2).unwrap().quantity, 4);
        assert_eq!(stock.total_quantity(), 5);
    }

    #[test]
    fn transfer_out_mirrors_transfer_in() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let w1 = test_warehouse_id();
        let w2 = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);

        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Purchase, w1, 8),
        );

        let mut cmd = movement(tenant_id, product_id, MovementType::TransferOut, w1, 3);
        cmd.related_warehouse_id = Some(w2);
        let e = apply_ok(&mut stock, cmd);

        // Primary warehouse is the source for transfer_out.
        assert_eq!(e.quantity_before, 8);
        assert_eq!(e.quantity_after, 5);
        assert_eq!(stock.level(&w1).unwrap().quantity, 5);
        assert_eq!(stock.level(&w2).unwrap().quantity, 3);
        assert_eq!(stock.total_quantity(), 8);
    }

    #[test]
    fn transfer_requires_distinct_known_source() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let w1 = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);
        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Purchase, w1, 5),
        );

        // Missing counterpart.
        let cmd = movement(tenant_id, product_id, MovementType::TransferIn, test_warehouse_id(), 1);
        let err = stock.handle(&StockCommand::ApplyMovement(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        // Same warehouse on both ends.
        let mut cmd = movement(tenant_id, product_id, MovementType::TransferIn, w1, 1);
        cmd.related_warehouse_id = Some(w1);
        let err = stock.handle(&StockCommand::ApplyMovement(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        // Unknown source level.
        let mut cmd = movement(tenant_id, product_id, MovementType::TransferIn, w1, 1);
        cmd.related_warehouse_id = Some(test_warehouse_id());
        let err = stock.handle(&StockCommand::ApplyMovement(cmd)).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn transfer_source_shortage_is_insufficient_stock() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let w1 = test_warehouse_id();
        let w2 = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);
        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Purchase, w1, 2),
        );

        let mut cmd = movement(tenant_id, product_id, MovementType::TransferIn, w2, 3);
        cmd.related_warehouse_id = Some(w1);
        let err = stock.handle(&StockCommand::ApplyMovement(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock(_)));
        assert_eq!(stock.total_quantity(), 2);
    }

    #[test]
    fn adjustment_sets_absolute_target_and_is_idempotent() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let warehouse = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);

        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Purchase, warehouse, 5),
        );

        let e = apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Adjustment, warehouse, 20),
        );
        assert_eq!(e.quantity_before, 5);
        assert_eq!(e.quantity_after, 20);
        assert_eq!(stock.level(&warehouse).unwrap().quantity, 20);

        // Re-applying the same target records a zero-delta entry.
        let e = apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Adjustment, warehouse, 20),
        );
        assert_eq!(e.quantity_before, 20);
        assert_eq!(e.quantity_after, 20);
        assert_eq!(stock.level(&warehouse).unwrap().quantity, 20);
    }

    #[test]
    fn adjustment_cannot_create_empty_level() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let stock = ProductStock::empty(product_id);

        let err = stock
            .handle(&StockCommand::ApplyMovement(movement(
                tenant_id,
                product_id,
                MovementType::Adjustment,
                test_warehouse_id(),
                0,
            )))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);

        let err = stock
            .handle(&StockCommand::ApplyMovement(movement(
                tenant_id,
                product_id,
                MovementType::Adjustment,
                test_warehouse_id(),
                -3,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn adjustment_with_positive_target_creates_level() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let warehouse = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);

        let e = apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Adjustment, warehouse, 7),
        );
        assert_eq!(e.quantity_before, 0);
        assert_eq!(e.quantity_after, 7);
        assert_eq!(stock.level(&warehouse).unwrap().quantity, 7);
    }

    #[test]
    fn adjustment_below_reservation_is_rejected() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let warehouse = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);

        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Purchase, warehouse, 10),
        );
        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Reservation, warehouse, 6),
        );

        let err = stock
            .handle(&StockCommand::ApplyMovement(movement(
                tenant_id,
                product_id,
                MovementType::Adjustment,
                warehouse,
                4,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn count_stamps_last_counted_fields() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let warehouse = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);

        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Purchase, warehouse, 10),
        );
        let e = apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Count, warehouse, 9),
        );

        let level = stock.level(&warehouse).unwrap();
        assert_eq!(level.quantity, 9);
        assert_eq!(level.last_counted_at, Some(e.occurred_at));
        assert_eq!(level.last_counted_quantity, Some(9));
    }

    #[test]
    fn reservation_and_release_move_only_the_reserved_counter() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let warehouse = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);

        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Purchase, warehouse, 10),
        );

        let e = apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Reservation, warehouse, 4),
        );
        assert_eq!(e.quantity_before, 10);
        assert_eq!(e.quantity_after, 10);
        assert_eq!(stock.level(&warehouse).unwrap().reserved_quantity, 4);

        let e = apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Release, warehouse, 3),
        );
        assert_eq!(e.quantity_before, 10);
        assert_eq!(e.quantity_after, 10);
        assert_eq!(stock.level(&warehouse).unwrap().reserved_quantity, 1);
    }

    #[test]
    fn reservation_cannot_exceed_on_hand() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let warehouse = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);

        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Purchase, warehouse, 5),
        );
        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Reservation, warehouse, 5),
        );

        let err = stock
            .handle(&StockCommand::ApplyMovement(movement(
                tenant_id,
                product_id,
                MovementType::Reservation,
                warehouse,
                1,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn release_beyond_reserved_is_insufficient_stock() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let warehouse = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);

        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Purchase, warehouse, 5),
        );
        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Reservation, warehouse, 2),
        );

        let err = stock
            .handle(&StockCommand::ApplyMovement(movement(
                tenant_id,
                product_id,
                MovementType::Release,
                warehouse,
                3,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock(_)));
    }

    #[test]
    fn zero_or_negative_magnitude_is_rejected() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let warehouse = test_warehouse_id();
        let stock = ProductStock::empty(product_id);

        for quantity in [0, -4] {
            let err = stock
                .handle(&StockCommand::ApplyMovement(movement(
                    tenant_id,
                    product_id,
                    MovementType::Purchase,
                    warehouse,
                    quantity,
                )))
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn commands_from_another_tenant_are_rejected() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let warehouse = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);

        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Purchase, warehouse, 5),
        );

        let err = stock
            .handle(&StockCommand::ApplyMovement(movement(
                test_tenant_id(),
                product_id,
                MovementType::Purchase,
                warehouse,
                5,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn configure_level_patches_reorder_settings() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let warehouse = test_warehouse_id();
        let mut stock = ProductStock::empty(product_id);

        apply_ok(
            &mut stock,
            movement(tenant_id, product_id, MovementType::Purchase, warehouse, 5),
        );

        let configure = ConfigureLevel {
            tenant_id,
            product_id,
            warehouse_id: warehouse,
            minimum_quantity: Some(3),
            maximum_quantity: Some(50),
            bin_location: Some("A-03-2".to_string()),
            occurred_at: test_time(),
        };
        let events = stock
            .handle(&StockCommand::ConfigureLevel(configure))
            .unwrap();
        for e in &events {
            stock.apply(e);
        }

        let level = stock.level(&warehouse).unwrap();
        assert_eq!(level.minimum_quantity, 3);
        assert_eq!(level.maximum_quantity, Some(50));
        assert_eq!(level.bin_location.as_deref(), Some("A-03-2"));

        // Second patch keeps what it does not mention.
        let configure = ConfigureLevel {
            tenant_id,
            product_id,
            warehouse_id: warehouse,
            minimum_quantity: None,
            maximum_quantity: None,
            bin_location: Some("B-01-1".to_string()),
            occurred_at: test_time(),
        };
        let events = stock
            .handle(&StockCommand::ConfigureLevel(configure))
            .unwrap();
        for e in &events {
            stock.apply(e);
        }
        let level = stock.level(&warehouse).unwrap();
        assert_eq!(level.minimum_quantity, 3);
        assert_eq!(level.bin_location.as_deref(), Some("B-01-1"));
    }

    #[test]
    fn configure_level_requires_existing_level() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let stock = ProductStock::empty(product_id);

        let configure = ConfigureLevel {
            tenant_id,
            product_id,
            warehouse_id: test_warehouse_id(),
            minimum_quantity: Some(1),
            maximum_quantity: None,
            bin_location: None,
            occurred_at: test_time(),
        };
        let err = stock
            .handle(&StockCommand::ConfigureLevel(configure))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: no accepted movement sequence can break the level
        /// invariants: on-hand never negative, reserved within [0, on-hand].
        #[test]
        fn invariants_survive_any_accepted_sequence(
            ops in prop::collection::vec((0u8..8, 0usize..2, 1i64..100), 1..40)
        ) {
            let tenant_id = test_tenant_id();
            let product_id = test_product_id();
            let warehouses = [test_warehouse_id(), test_warehouse_id()];
            let mut stock = ProductStock::empty(product_id);

            for (op, wh_idx, quantity) in ops {
                let warehouse = warehouses[wh_idx];
                let other = warehouses[1 - wh_idx];
                let movement_type = match op {
                    0 => MovementType::Purchase,
                    1 => MovementType::Sale,
                    2 => MovementType::Adjustment,
                    3 => MovementType::Reservation,
                    4 => MovementType::Release,
                    5 => MovementType::TransferIn,
                    6 => MovementType::Damage,
                    _ => MovementType::Count,
                };
                let mut cmd = movement(tenant_id, product_id, movement_type, warehouse, quantity);
                if movement_type.is_transfer() {
                    cmd.related_warehouse_id = Some(other);
                }

                // Rejected commands must leave no trace; accepted ones are applied.
                if let Ok(events) = stock.handle(&StockCommand::ApplyMovement(cmd)) {
                    for e in &events {
                        stock.apply(e);
                    }
                }

                for level in stock.levels().values() {
                    prop_assert!(level.quantity >= 0);
                    prop_assert!(level.reserved_quantity >= 0);
                    prop_assert!(level.reserved_quantity <= level.quantity);
                }
            }
        }
    }
}
