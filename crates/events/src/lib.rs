//! `shopkeeper-events` — domain event plumbing.
//!
//! Events are immutable, versioned facts appended to per-aggregate streams;
//! this crate holds the domain-agnostic pieces: the [`Event`] trait, the
//! tenant-scoped [`EventEnvelope`], and the [`EventBus`] pub/sub abstraction
//! used to feed projections.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
