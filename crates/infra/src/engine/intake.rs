use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tracing::{info, instrument};

use lotkeeper_core::DomainError;
use lotkeeper_inventory::{InventoryLot, NewLot};

use crate::config::EngineConfig;
use crate::locks::{LockError, ProductLocks};
use crate::lot_store::{LotStore, LotStoreError};

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] LotStoreError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Receives new lots into the store (restocking).
///
/// Takes the product's lock while inserting so that a concurrent batch never observes a
/// half-received product.
pub struct LotIntake<S> {
    store: S,
    locks: Arc<ProductLocks>,
    config: EngineConfig,
}

impl<S> LotIntake<S>
where
    S: LotStore,
{
    pub fn new(store: S, locks: Arc<ProductLocks>, config: EngineConfig) -> Self {
        Self { store, locks, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn receive(&self, new_lot: NewLot) -> Result<InventoryLot, IntakeError> {
        self.receive_on(new_lot, Utc::now().date_naive())
    }

    /// Receive with an explicit "today" (expiration must be strictly later).
    #[instrument(skip(self, new_lot), fields(product_id = %new_lot.product_id, quantity = new_lot.quantity), err)]
    pub fn receive_on(&self, new_lot: NewLot, today: NaiveDate) -> Result<InventoryLot, IntakeError> {
        let lot = InventoryLot::receive(new_lot, today)?;
        let _guard = self
            .locks
            .acquire_all(std::slice::from_ref(lot.product_id()), self.config.lock_timeout)?;

        let lot = self.store.insert_lot(lot)?;
        info!(lot_id = %lot.lot_id(), expiration_date = %lot.expiration_date(), "lot received");
        Ok(lot)
    }
}

#[cfg(test)]
mod tests {
    use lotkeeper_core::LotId;

    use super::*;
    use crate::engine::test_support::{date, product};
    use crate::lot_store::InMemoryLotStore;

    fn intake() -> LotIntake<Arc<InMemoryLotStore>> {
        LotIntake::new(
            Arc::new(InMemoryLotStore::new()),
            Arc::new(ProductLocks::new()),
            EngineConfig::default(),
        )
    }

    fn new_lot(quantity: u64, expiration_date: NaiveDate) -> NewLot {
        NewLot {
            lot_id: None,
            product_id: product("P1"),
            quantity,
            expiration_date,
            location: None,
        }
    }

    #[test]
    fn received_lot_is_readable() {
        let intake = intake();
        let lot = intake.receive_on(new_lot(8, date(2030, 1, 1)), date(2029, 1, 1)).unwrap();

        let lots = intake.store.lots_for_product(&product("P1")).unwrap();
        assert_eq!(lots, vec![lot]);
    }

    #[test]
    fn expired_lot_is_rejected_before_the_store() {
        let intake = intake();
        let err = intake.receive_on(new_lot(8, date(2029, 1, 1)), date(2029, 1, 1)).unwrap_err();

        assert!(matches!(err, IntakeError::Domain(DomainError::Validation(_))));
        assert_eq!(intake.store.lot_count(), 0);
    }

    #[test]
    fn reused_lot_id_conflicts() {
        let intake = intake();
        let id = LotId::new();
        let mut first = new_lot(1, date(2030, 1, 1));
        first.lot_id = Some(id);
        intake.receive_on(first.clone(), date(2029, 1, 1)).unwrap();

        let err = intake.receive_on(first, date(2029, 1, 1)).unwrap_err();
        assert!(matches!(err, IntakeError::Store(LotStoreError::Conflict(_))));
    }
}
