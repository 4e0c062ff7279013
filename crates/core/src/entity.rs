//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Inventory lots are entities: two lots with identical quantities and dates are still
/// different lots if their ids differ.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing revision of the entity's persisted state.
    fn version(&self) -> u64;
}
