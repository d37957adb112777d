use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopkeeper_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use shopkeeper_events::Event;

/// Stable aggregate type identifier for warehouse streams.
pub const AGGREGATE_TYPE: &str = "warehousing.warehouse";

/// Warehouse identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarehouseId(pub AggregateId);

impl WarehouseId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for WarehouseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Warehouse.
///
/// `code` is the operator-facing short identifier ("MAIN", "EU-1"); uniqueness
/// per tenant is checked by the registry service against the directory read
/// model before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warehouse {
    id: WarehouseId,
    tenant_id: Option<TenantId>,
    code: String,
    name: String,
    is_active: bool,
    is_primary: bool,
    total_capacity: Option<i64>,
    current_usage: Option<i64>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Warehouse {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: WarehouseId) -> Self {
        Self {
            id,
            tenant_id: None,
            code: String::new(),
            name: String::new(),
            is_active: true,
            is_primary: false,
            total_capacity: None,
            current_usage: None,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> WarehouseId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    pub fn total_capacity(&self) -> Option<i64> {
        self.total_capacity
    }

    pub fn current_usage(&self) -> Option<i64> {
        self.current_usage
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

impl AggregateRoot for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateWarehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWarehouse {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub code: String,
    pub name: String,
    pub is_primary: bool,
    pub total_capacity: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateWarehouse.
///
/// `None` fields keep the existing value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWarehouse {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub code: Option<String>,
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub is_primary: Option<bool>,
    pub total_capacity: Option<i64>,
    pub current_usage: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteWarehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteWarehouse {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarehouseCommand {
    CreateWarehouse(CreateWarehouse),
    UpdateWarehouse(UpdateWarehouse),
    DeleteWarehouse(DeleteWarehouse),
}

/// Event: WarehouseCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseCreated {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub code: String,
    pub name: String,
    pub is_primary: bool,
    pub total_capacity: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WarehouseUpdated (carries the resolved full record, not a diff).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseUpdated {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub is_primary: bool,
    pub total_capacity: Option<i64>,
    pub current_usage: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WarehouseDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseDeleted {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarehouseEvent {
    WarehouseCreated(WarehouseCreated),
    WarehouseUpdated(WarehouseUpdated),
    WarehouseDeleted(WarehouseDeleted),
}

impl Event for WarehouseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WarehouseEvent::WarehouseCreated(_) => "warehousing.warehouse.created",
            WarehouseEvent::WarehouseUpdated(_) => "warehousing.warehouse.updated",
            WarehouseEvent::WarehouseDeleted(_) => "warehousing.warehouse.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WarehouseEvent::WarehouseCreated(e) => e.occurred_at,
            WarehouseEvent::WarehouseUpdated(e) => e.occurred_at,
            WarehouseEvent::WarehouseDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Warehouse {
    type Command = WarehouseCommand;
    type Event = WarehouseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            WarehouseEvent::WarehouseCreated(e) => {
                self.id = e.warehouse_id;
                self.tenant_id = Some(e.tenant_id);
                self.code = e.code.clone();
                self.name = e.name.clone();
                self.is_active = true;
                self.is_primary = e.is_primary;
                self.total_capacity = e.total_capacity;
                self.current_usage = None;
                self.created = true;
                self.deleted = false;
            }
            WarehouseEvent::WarehouseUpdated(e) => {
                self.code = e.code.clone();
                self.name = e.name.clone();
                self.is_active = e.is_active;
                self.is_primary = e.is_primary;
                self.total_capacity = e.total_capacity;
                self.current_usage = e.current_usage;
            }
            WarehouseEvent::WarehouseDeleted(_) => {
                self.deleted = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            WarehouseCommand::CreateWarehouse(cmd) => self.handle_create(cmd),
            WarehouseCommand::UpdateWarehouse(cmd) => self.handle_update(cmd),
            WarehouseCommand::DeleteWarehouse(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Warehouse {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_warehouse_id(&self, warehouse_id: WarehouseId) -> Result<(), DomainError> {
        if self.id != warehouse_id {
            return Err(DomainError::invariant("warehouse_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateWarehouse) -> Result<Vec<WarehouseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("warehouse already exists"));
        }

        let code = cmd.code.trim();
        if code.is_empty() {
            return Err(DomainError::validation("code cannot be empty"));
        }
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.total_capacity.is_some_and(|c| c < 0) {
            return Err(DomainError::validation("total_capacity cannot be negative"));
        }

        Ok(vec![WarehouseEvent::WarehouseCreated(WarehouseCreated {
            tenant_id: cmd.tenant_id,
            warehouse_id: cmd.warehouse_id,
            code: code.to_string(),
            name: name.to_string(),
            is_primary: cmd.is_primary,
            total_capacity: cmd.total_capacity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateWarehouse) -> Result<Vec<WarehouseEvent>, DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_warehouse_id(cmd.warehouse_id)?;

        let new_code = cmd
            .code
            .as_deref()
            .map(str::trim)
            .map(str::to_string)
            .unwrap_or_else(|| self.code.clone());
        if new_code.is_empty() {
            return Err(DomainError::validation("code cannot be empty"));
        }

        let new_name = cmd
            .name
            .as_deref()
            .map(str::trim)
            .map(str::to_string)
            .unwrap_or_else(|| self.name.clone());
        if new_name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        let new_capacity = cmd.total_capacity.or(self.total_capacity);
        if new_capacity.is_some_and(|c| c < 0) {
            return Err(DomainError::validation("total_capacity cannot be negative"));
        }
        let new_usage = cmd.current_usage.or(self.current_usage);
        if new_usage.is_some_and(|u| u < 0) {
            return Err(DomainError::validation("current_usage cannot be negative"));
        }

        Ok(vec![WarehouseEvent::WarehouseUpdated(WarehouseUpdated {
            tenant_id: cmd.tenant_id,
            warehouse_id: cmd.warehouse_id,
            code: new_code,
            name: new_name,
            is_active: cmd.is_active.unwrap_or(self.is_active),
            is_primary: cmd.is_primary.unwrap_or(self.is_primary),
            total_capacity: new_capacity,
            current_usage: new_usage,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteWarehouse) -> Result<Vec<WarehouseEvent>, DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_warehouse_id(cmd.warehouse_id)?;

        Ok(vec![WarehouseEvent::WarehouseDeleted(WarehouseDeleted {
            tenant_id: cmd.tenant_id,
            warehouse_id: cmd.warehouse_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
