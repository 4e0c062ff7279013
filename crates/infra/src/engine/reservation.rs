use std::sync::Arc;

use tracing::instrument;

use lotkeeper_inventory::{Batch, BatchError, ChangeNotifier, StockPool, StockRequest};

use super::{BatchExecutor, BatchReceipt};
use crate::config::EngineConfig;
use crate::locks::ProductLocks;
use crate::lot_store::LotStore;

/// Moves stock from available to reserved across a batch of line items.
///
/// All-or-nothing: if any line item cannot be covered, no lot changes and no notification
/// is sent. Share one `ProductLocks` between the reservation and consumption engines of a
/// store so that both serialize on the same products.
pub struct ReservationEngine<S, N> {
    executor: BatchExecutor<S, N>,
}

impl<S, N> ReservationEngine<S, N>
where
    S: LotStore,
    N: ChangeNotifier,
{
    pub fn new(store: S, notifier: N, locks: Arc<ProductLocks>, config: EngineConfig) -> Self {
        Self {
            executor: BatchExecutor {
                store,
                notifier,
                locks,
                config,
            },
        }
    }

    #[instrument(skip(self, batch), fields(operation = "reserve", items = batch.len()))]
    pub fn reserve(&self, batch: &Batch) -> Result<BatchReceipt, BatchError> {
        self.executor.execute(batch, StockPool::Available)
    }

    /// Validate a wire request and reserve it.
    pub fn reserve_request(&self, request: StockRequest) -> Result<BatchReceipt, BatchError> {
        let batch = Batch::try_from(request)?;
        self.reserve(&batch)
    }

    pub fn store(&self) -> &S {
        &self.executor.store
    }
}
