use std::sync::Arc;

use thiserror::Error;

use lotkeeper_core::ProductId;
use lotkeeper_inventory::{BatchError, InventoryLot};

/// Lot store operation error.
///
/// Infrastructure failures only. Stock shortages and malformed requests are decided by
/// the engines before the store is ever asked to write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LotStoreError {
    /// A lot's persisted version no longer matches the version it was read at.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// A lot with the same id already exists.
    #[error("lot conflict: {0}")]
    Conflict(String),

    /// The backend could not be reached or rejected the operation.
    #[error("lot store backend failure: {0}")]
    Backend(String),

    /// Persisted data could not be mapped back into a lot.
    #[error("invalid lot data: {0}")]
    InvalidData(String),
}

impl From<LotStoreError> for BatchError {
    fn from(value: LotStoreError) -> Self {
        BatchError::StorageFailure(value.to_string())
    }
}

/// Persisted collection of inventory lots, read by product and written by lot.
///
/// ## Commit semantics
///
/// `commit()` receives lots exactly as they were loaded plus the batch's mutations, so each
/// lot still carries the version it was read at. Implementations must:
/// - reject the whole commit with `Concurrency` if any lot's stored version differs
/// - write every lot or none of them
/// - bump each written lot's version by one and return the lots as persisted
///
/// ## Read semantics
///
/// `lots_for_product()` returns lots ordered by expiration date, then lot id. An unknown
/// product yields an empty list, never an error.
pub trait LotStore: Send + Sync {
    fn lots_for_product(&self, product_id: &ProductId) -> Result<Vec<InventoryLot>, LotStoreError>;

    /// Add a newly received lot. Fails with `Conflict` if the lot id is taken.
    fn insert_lot(&self, lot: InventoryLot) -> Result<InventoryLot, LotStoreError>;

    fn commit(&self, lots: Vec<InventoryLot>) -> Result<Vec<InventoryLot>, LotStoreError>;
}

impl<S> LotStore for Arc<S>
where
    S: LotStore + ?Sized,
{
    fn lots_for_product(&self, product_id: &ProductId) -> Result<Vec<InventoryLot>, LotStoreError> {
        (**self).lots_for_product(product_id)
    }

    fn insert_lot(&self, lot: InventoryLot) -> Result<InventoryLot, LotStoreError> {
        (**self).insert_lot(lot)
    }

    fn commit(&self, lots: Vec<InventoryLot>) -> Result<Vec<InventoryLot>, LotStoreError> {
        (**self).commit(lots)
    }
}
