//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are compared by their attribute values
/// (e.g. a storage location `{ warehouse, aisle, shelf }`). Treat them as immutable:
/// to "change" one, build a new value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
