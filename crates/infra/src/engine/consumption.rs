use std::sync::Arc;

use tracing::instrument;

use lotkeeper_inventory::{Batch, BatchError, ChangeNotifier, StockPool, StockRequest};

use super::{BatchExecutor, BatchReceipt};
use crate::config::EngineConfig;
use crate::locks::ProductLocks;
use crate::lot_store::LotStore;

/// Permanently removes reserved stock (fulfilment). Consumed units never return to
/// available. Same all-or-nothing semantics as [`super::ReservationEngine`].
pub struct ConsumptionEngine<S, N> {
    executor: BatchExecutor<S, N>,
}

impl<S, N> ConsumptionEngine<S, N>
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

    #[instrument(skip(self, batch), fields(operation = "consume", items = batch.len()))]
    pub fn consume(&self, batch: &Batch) -> Result<BatchReceipt, BatchError> {
        self.executor.execute(batch, StockPool::Reserved)
    }

    pub fn consume_request(&self, request: StockRequest) -> Result<BatchReceipt, BatchError> {
        let batch = Batch::try_from(request)?;
        self.consume(&batch)
    }

    pub fn store(&self) -> &S {
        &self.executor.store
    }
}
