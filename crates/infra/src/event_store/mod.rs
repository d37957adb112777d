//! Append-only movement-ledger boundary.
//!
//! Storage-agnostic abstraction over tenant-scoped event streams: one stream
//! per aggregate instance, optimistic concurrency on append, read-only query
//! access for audit listings.

pub mod in_memory;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use query::{EventFilter, EventQuery, EventQueryResult, Pagination};
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
