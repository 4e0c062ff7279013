use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use lotkeeper_core::{Entity, ExpectedVersion, LotId, ProductId};
use lotkeeper_inventory::{InventoryLot, fifo_order};

use super::r#trait::{LotStore, LotStoreError};

#[derive(Debug, Default)]
struct Lots {
    by_product: HashMap<ProductId, BTreeMap<LotId, InventoryLot>>,
    owner: HashMap<LotId, ProductId>,
}

/// In-memory lot store.
///
/// Intended for tests/dev. A single `RwLock` makes every commit trivially atomic.
#[derive(Debug, Default)]
pub struct InMemoryLotStore {
    lots: RwLock<Lots>,
}

impl InMemoryLotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with already-built lots (versions are kept as given).
    pub fn with_lots(lots: impl IntoIterator<Item = InventoryLot>) -> Result<Self, LotStoreError> {
        let store = Self::new();
        for lot in lots {
            store.insert_lot(lot)?;
        }
        Ok(store)
    }

    pub fn lot_count(&self) -> usize {
        self.lots.read().map(|l| l.owner.len()).unwrap_or(0)
    }
}

fn poisoned() -> LotStoreError {
    LotStoreError::Backend("lock poisoned".to_string())
}

impl LotStore for InMemoryLotStore {
    fn lots_for_product(&self, product_id: &ProductId) -> Result<Vec<InventoryLot>, LotStoreError> {
        let lots = self.lots.read().map_err(|_| poisoned())?;
        let Some(product_lots) = lots.by_product.get(product_id) else {
            return Ok(Vec::new());
        };

        let stored: Vec<InventoryLot> = product_lots.values().cloned().collect();
        Ok(fifo_order(&stored).into_iter().cloned().collect())
    }

    fn insert_lot(&self, lot: InventoryLot) -> Result<InventoryLot, LotStoreError> {
        let mut lots = self.lots.write().map_err(|_| poisoned())?;

        if lots.owner.contains_key(&lot.lot_id()) {
            return Err(LotStoreError::Conflict(format!("lot {} already exists", lot.lot_id())));
        }

        lots.owner.insert(lot.lot_id(), lot.product_id().clone());
        lots.by_product
            .entry(lot.product_id().clone())
            .or_default()
            .insert(lot.lot_id(), lot.clone());
        Ok(lot)
    }

    fn commit(&self, lots: Vec<InventoryLot>) -> Result<Vec<InventoryLot>, LotStoreError> {
        if lots.is_empty() {
            return Ok(vec![]);
        }

        let mut state = self.lots.write().map_err(|_| poisoned())?;

        // Check everything before touching anything.
        for lot in &lots {
            let stored = state
                .by_product
                .get(lot.product_id())
                .and_then(|m| m.get(&lot.lot_id()))
                .ok_or_else(|| LotStoreError::Concurrency(format!("lot {} no longer exists", lot.lot_id())))?;
            ExpectedVersion(lot.version())
                .check(stored.version())
                .map_err(|e| LotStoreError::Concurrency(format!("lot {}: {e}", lot.lot_id())))?;
        }

        let mut committed = Vec::with_capacity(lots.len());
        for mut lot in lots {
            lot.advance_version();
            if let Some(product_lots) = state.by_product.get_mut(lot.product_id()) {
                product_lots.insert(lot.lot_id(), lot.clone());
            }
            committed.push(lot);
        }

        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn lot(product: &str, available: u64, expires: (i32, u32, u32)) -> InventoryLot {
        InventoryLot::from_parts(
            LotId::new(),
            ProductId::parse(product).unwrap(),
            available,
            0,
            NaiveDate::from_ymd_opt(expires.0, expires.1, expires.2).unwrap(),
            None,
            1,
        )
    }

    fn product(id: &str) -> ProductId {
        ProductId::parse(id).unwrap()
    }

    #[test]
    fn unknown_product_reads_as_empty() {
        let store = InMemoryLotStore::new();
        assert!(store.lots_for_product(&product("nope")).unwrap().is_empty());
    }

    #[test]
    fn reads_are_sorted_by_expiration() {
        let late = lot("P1", 1, (2031, 1, 1));
        let early = lot("P1", 1, (2030, 1, 1));
        let store = InMemoryLotStore::with_lots([late.clone(), early.clone(), lot("P2", 1, (2029, 1, 1))]).unwrap();

        let lots = store.lots_for_product(&product("P1")).unwrap();
        assert_eq!(lots, vec![early, late]);
        assert_eq!(store.lot_count(), 3);
    }

    #[test]
    fn duplicate_lot_id_is_a_conflict() {
        let l = lot("P1", 1, (2030, 1, 1));
        let store = InMemoryLotStore::with_lots([l.clone()]).unwrap();
        assert!(matches!(store.insert_lot(l), Err(LotStoreError::Conflict(_))));
    }

    #[test]
    fn commit_bumps_versions() {
        let l = lot("P1", 5, (2030, 1, 1));
        let store = InMemoryLotStore::with_lots([l.clone()]).unwrap();

        let mut changed = l.clone();
        changed.reserve(2).unwrap();
        let committed = store.commit(vec![changed]).unwrap();

        assert_eq!(committed[0].version(), 2);
        let stored = &store.lots_for_product(&product("P1")).unwrap()[0];
        assert_eq!(stored.quantity_reserved(), 2);
        assert_eq!(stored.version(), 2);
    }

    #[test]
    fn stale_version_rejects_the_whole_commit() {
        let a = lot("P1", 5, (2030, 1, 1));
        let b = lot("P2", 5, (2030, 1, 1));
        let store = InMemoryLotStore::with_lots([a.clone(), b.clone()]).unwrap();

        // Someone else commits `b` first.
        let mut other = b.clone();
        other.reserve(1).unwrap();
        store.commit(vec![other]).unwrap();

        let mut a2 = a.clone();
        a2.reserve(5).unwrap();
        let mut b2 = b.clone();
        b2.reserve(5).unwrap();
        let err = store.commit(vec![a2, b2]).unwrap_err();

        assert!(matches!(err, LotStoreError::Concurrency(_)));
        assert_eq!(store.lots_for_product(&product("P1")).unwrap(), vec![a]);
    }
}
