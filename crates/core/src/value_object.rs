//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values; two
/// instances with the same values are the same value. To "modify" one,
/// construct a new one. Examples in this codebase: a ledger entry's external
/// reference, a warehouse capacity reading.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
