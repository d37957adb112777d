//! Error taxonomy at the service boundary.
//!
//! Business-rule failures are deterministic and occur before any write.
//! Infrastructure failures surface unmodified; the service performs no
//! implicit retry. Callers re-run the whole operation, using the request's
//! `reference_id` as their idempotency key.

use thiserror::Error;

use shopkeeper_infra::command_dispatcher::DispatchError;
use shopkeeper_infra::event_store::EventStoreError;
use shopkeeper_infra::projections::{StockLevelProjectionError, WarehouseProjectionError};

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing/malformed request fields; detected before any write.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Duplicate creation, concurrent-writer conflict, or a delete blocked by
    /// existing stock.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A movement would drive an on-hand or reserved quantity negative.
    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    /// Reserved quantity would exceed on-hand quantity.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Referenced warehouse/stock level does not exist where one is required.
    #[error("not found: {0}")]
    NotFound(String),

    /// Persistence/bus failure, surfaced unmodified.
    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

impl From<DispatchError> for AppError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Validation(msg) => AppError::Validation(msg),
            DispatchError::InvariantViolation(msg) => AppError::InvariantViolation(msg),
            DispatchError::InsufficientStock(msg) => AppError::InsufficientStock(msg),
            DispatchError::Concurrency(msg) => AppError::Conflict(msg),
            DispatchError::NotFound => AppError::NotFound("requested resource was not found".to_string()),
            DispatchError::TenantIsolation(msg) => AppError::Infrastructure(msg),
            DispatchError::Deserialize(msg) => AppError::Infrastructure(msg),
            DispatchError::Store(e) => AppError::Infrastructure(format!("{e:?}")),
            DispatchError::Publish(msg) => AppError::Infrastructure(msg),
        }
    }
}

impl From<EventStoreError> for AppError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => AppError::Conflict(msg),
            other => AppError::Infrastructure(format!("{other:?}")),
        }
    }
}

impl From<StockLevelProjectionError> for AppError {
    fn from(value: StockLevelProjectionError) -> Self {
        AppError::Infrastructure(format!("{value:?}"))
    }
}

impl From<WarehouseProjectionError> for AppError {
    fn from(value: WarehouseProjectionError) -> Self {
        AppError::Infrastructure(format!("{value:?}"))
    }
}
