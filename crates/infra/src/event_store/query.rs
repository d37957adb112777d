//! Read-only query interface over the movement ledger.
//!
//! Audit listings ("show me this product's movements last week") read the
//! ledger directly instead of a projection: the stream is the source of
//! truth, and these listings want exactly what was appended. All queries are
//! tenant-scoped and paginated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use shopkeeper_core::{AggregateId, TenantId};

use crate::event_store::in_memory::InMemoryEventStore;
use crate::event_store::{EventStoreError, StoredEvent};

/// Pagination parameters for ledger queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of events to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            // Cap at 1000 to keep a single page bounded.
            limit: limit.unwrap_or(50).min(1000),
            offset: offset.unwrap_or(0),
        }
    }
}

/// Filter criteria for ledger queries. All fields are optional and combined
/// with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    pub aggregate_id: Option<AggregateId>,
    /// e.g. "inventory.product_stock"
    pub aggregate_type: Option<String>,
    /// e.g. "inventory.stock.movement_applied"
    pub event_type: Option<String>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
}

/// Paginated ledger query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventQueryResult {
    pub events: Vec<StoredEvent>,
    /// Total number of events matching the filter (across all pages).
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

/// Query interface for ledger inspection.
///
/// Results are ordered by `occurred_at` descending (most recent first), with
/// sequence number breaking ties, also descending.
pub trait EventQuery: Send + Sync {
    fn query_events(
        &self,
        tenant_id: TenantId,
        filter: EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, EventStoreError>;

    /// Get a single event by its ID, if it exists and belongs to the tenant.
    fn get_event_by_id(
        &self,
        tenant_id: TenantId,
        event_id: uuid::Uuid,
    ) -> Result<Option<StoredEvent>, EventStoreError>;
}

impl<Q> EventQuery for Arc<Q>
where
    Q: EventQuery + ?Sized,
{
    fn query_events(
        &self,
        tenant_id: TenantId,
        filter: EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, EventStoreError> {
        (**self).query_events(tenant_id, filter, pagination)
    }

    fn get_event_by_id(
        &self,
        tenant_id: TenantId,
        event_id: uuid::Uuid,
    ) -> Result<Option<StoredEvent>, EventStoreError> {
        (**self).get_event_by_id(tenant_id, event_id)
    }
}

fn matches(filter: &EventFilter, event: &StoredEvent) -> bool {
    if filter.aggregate_id.is_some_and(|id| id != event.aggregate_id) {
        return false;
    }
    if filter
        .aggregate_type
        .as_deref()
        .is_some_and(|t| t != event.aggregate_type)
    {
        return false;
    }
    if filter
        .event_type
        .as_deref()
        .is_some_and(|t| t != event.event_type)
    {
        return false;
    }
    if filter.occurred_after.is_some_and(|t| event.occurred_at < t) {
        return false;
    }
    if filter.occurred_before.is_some_and(|t| event.occurred_at > t) {
        return false;
    }
    true
}

impl EventQuery for InMemoryEventStore {
    fn query_events(
        &self,
        tenant_id: TenantId,
        filter: EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let mut events: Vec<StoredEvent> = streams
            .iter()
            .filter(|(key, _)| key.tenant_id == tenant_id)
            .flat_map(|(_, stream)| stream.iter())
            .filter(|e| matches(&filter, e))
            .cloned()
            .collect();

        events.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then(b.sequence_number.cmp(&a.sequence_number))
        });

        let total = events.len() as u64;
        let start = (pagination.offset as usize).min(events.len());
        let end = start.saturating_add(pagination.limit as usize).min(events.len());
        let page = events[start..end].to_vec();
        let has_more = (end as u64) < total;

        Ok(EventQueryResult {
            events: page,
            total,
            pagination,
            has_more,
        })
    }

    fn get_event_by_id(
        &self,
        tenant_id: TenantId,
        event_id: uuid::Uuid,
    ) -> Result<Option<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams
            .iter()
            .filter(|(key, _)| key.tenant_id == tenant_id)
            .flat_map(|(_, stream)| stream.iter())
            .find(|e| e.event_id == event_id)
            .cloned())
    }
}
