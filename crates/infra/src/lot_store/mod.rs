//! Lot persistence boundary.
//!
//! The store is the source of truth for lot quantities. Engines read a product's lots,
//! decide, and hand every changed lot back in one atomic, version-checked commit.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLotStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresLotStore;
pub use r#trait::{LotStore, LotStoreError};
