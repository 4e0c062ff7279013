//! Reservation and consumption engines (application-level orchestration).
//!
//! Both engines run the same all-or-nothing pipeline and differ only in the stock pool
//! they draw from:
//!
//! ```text
//! Batch
//!   ↓
//! 1. Lock every distinct product (ascending id, bounded wait)
//!   ↓
//! 2. Load lots, check each line item against the pool total (no mutation on failure)
//!   ↓
//! 3. Plan + apply FIFO draws on a working copy, item by item
//!   ↓
//! 4. Commit all changed lots atomically (version-checked)
//!   ↓
//! 5. Notify once per product, then release the locks
//! ```
//!
//! This module contains no IO itself; it composes `LotStore` and `ChangeNotifier`.

pub mod consumption;
pub mod intake;
pub mod reservation;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use lotkeeper_core::{LotId, ProductId};
use lotkeeper_inventory::{
    AllocationError, Batch, BatchError, ChangeNotifier, Draw, InventoryLot, Shortfall, StockChange,
    StockConsumed, StockPool, StockReserved, StockTotals, apply_plan, plan_fifo, pool_total,
};

use crate::config::EngineConfig;
use crate::locks::ProductLocks;
use crate::lot_store::LotStore;

pub use consumption::ConsumptionEngine;
pub use intake::{IntakeError, LotIntake};
pub use reservation::ReservationEngine;

/// Confirmation for one line item of a committed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReceipt {
    pub product_id: ProductId,
    pub quantity: u64,
    /// Lots drawn from, earliest expiration first.
    pub draws: Vec<Draw>,
}

/// Result of a committed reserve/consume batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceipt {
    pub pool: StockPool,
    pub items: Vec<ItemReceipt>,
}

impl BatchReceipt {
    /// `"<n> products processed"`, where `n` counts line items.
    pub fn message(&self) -> String {
        format!("{} products processed", self.items.len())
    }
}

/// Shared pipeline behind both engines.
struct BatchExecutor<S, N> {
    store: S,
    notifier: N,
    locks: Arc<ProductLocks>,
    config: EngineConfig,
}

impl<S, N> BatchExecutor<S, N>
where
    S: LotStore,
    N: ChangeNotifier,
{
    fn execute(&self, batch: &Batch, pool: StockPool) -> Result<BatchReceipt, BatchError> {
        let products = batch.products();

        let _guard = self
            .locks
            .acquire_all(&products, self.config.lock_timeout)
            .map_err(|e| {
                warn!(%pool, error = %e, "could not lock products for batch");
                BatchError::storage(e.to_string())
            })?;

        let mut working: HashMap<ProductId, Vec<InventoryLot>> = HashMap::with_capacity(products.len());
        let mut before: HashMap<ProductId, StockTotals> = HashMap::with_capacity(products.len());
        for product_id in &products {
            let lots = self.store.lots_for_product(product_id).map_err(|e| {
                warn!(%product_id, error = %e, "failed to load lots");
                BatchError::from(e)
            })?;
            before.insert(product_id.clone(), StockTotals::of(&lots));
            working.insert(product_id.clone(), lots);
        }

        // Every product is checked against its full pool, summed over repeated lines,
        // before anything is planned.
        let shortfalls: Vec<Shortfall> = products
            .iter()
            .filter_map(|product_id| {
                let lots = working.get(product_id).map(Vec::as_slice).unwrap_or(&[]);
                let available = pool_total(lots, pool);
                let requested = batch.quantity_for(product_id);
                (available < requested).then(|| Shortfall {
                    product_id: product_id.clone(),
                    requested,
                    available,
                    unknown_product: lots.is_empty(),
                })
            })
            .collect();

        if !shortfalls.is_empty() {
            let err = BatchError::InsufficientStock { pool, shortfalls };
            info!(%pool, error = %err, "batch rejected");
            return Err(err);
        }

        let mut items = Vec::with_capacity(batch.len());
        let mut touched: HashSet<LotId> = HashSet::new();
        for item in batch.items() {
            let lots = working
                .get_mut(&item.product_id)
                .ok_or_else(|| BatchError::storage(format!("lots for {} were not loaded", item.product_id)))?;

            let plan = match plan_fifo(item.quantity, lots, pool) {
                Ok(plan) => plan,
                Err(e @ AllocationError::InsufficientStock { .. }) => {
                    // Totals were checked above under the product lock.
                    error!(%pool, product_id = %item.product_id, error = %e, "pool changed after validation");
                    return Err(BatchError::storage(format!("allocation failed after validation: {e}")));
                }
                Err(AllocationError::ZeroQuantity) => {
                    return Err(BatchError::invalid(format!(
                        "quantity for {} must be greater than zero",
                        item.product_id
                    )));
                }
            };

            apply_plan(lots, &plan).map_err(|e| BatchError::storage(format!("allocation could not be applied: {e}")))?;
            touched.extend(plan.draws().iter().map(|d| d.lot_id));
            items.push(ItemReceipt {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                draws: plan.into_draws(),
            });
        }

        let changed: Vec<InventoryLot> = products
            .iter()
            .filter_map(|p| working.get(p))
            .flatten()
            .filter(|lot| touched.contains(&lot.lot_id()))
            .cloned()
            .collect();

        let committed = self.store.commit(changed).map_err(|e| {
            warn!(%pool, error = %e, "batch commit failed");
            BatchError::from(e)
        })?;

        info!(%pool, items = items.len(), lots = committed.len(), "batch committed");

        // Locks are still held here, so per-product notifications follow commit order.
        let occurred_at = Utc::now();
        for product_id in &products {
            let before = before.get(product_id).copied().unwrap_or_default();
            let after = working.get(product_id).map(|lots| StockTotals::of(lots)).unwrap_or_default();
            let delta = batch.quantity_for(product_id);

            let change = match pool {
                StockPool::Available => StockChange::Reserved(StockReserved {
                    product_id: product_id.clone(),
                    quantity_reserved_delta: delta,
                    quantity_available_after: after.available,
                    before,
                    after,
                    occurred_at,
                }),
                StockPool::Reserved => StockChange::Consumed(StockConsumed {
                    product_id: product_id.clone(),
                    quantity_consumed_delta: delta,
                    quantity_reserved_after: after.reserved,
                    before,
                    after,
                    occurred_at,
                }),
            };
            self.notifier.notify(&change);
        }

        Ok(BatchReceipt { pool, items })
    }
}
