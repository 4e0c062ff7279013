//! Batch-level failure taxonomy shared by the reservation and consumption engines.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lotkeeper_core::ProductId;

use crate::lot::StockPool;

/// One line item that could not be covered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub product_id: ProductId,
    pub requested: u64,
    pub available: u64,
    /// The product has no lots on record at all.
    pub unknown_product: bool,
}

impl Shortfall {
    fn describe(&self, pool: StockPool) -> String {
        let qualifier = match pool {
            StockPool::Available => "",
            StockPool::Reserved => "reserved ",
        };
        format!(
            "Insufficient {qualifier}stock for {}: available {}, requested {}",
            self.product_id, self.available, self.requested
        )
    }
}

/// Failure of a whole reserve/consume batch. Nothing in the batch was applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// Malformed request: empty item list, missing product id, non-positive quantity.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// At least one line item exceeds the relevant stock total.
    #[error("{}", describe_shortfalls(*pool, shortfalls))]
    InsufficientStock {
        pool: StockPool,
        shortfalls: Vec<Shortfall>,
    },

    /// Storage could not be read or written, a lock wait timed out, or a concurrent
    /// writer changed a lot first. Safe to retry the whole batch.
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl BatchError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageFailure(msg.into())
    }

    pub fn shortfalls(&self) -> &[Shortfall] {
        match self {
            BatchError::InsufficientStock { shortfalls, .. } => shortfalls,
            _ => &[],
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            BatchError::InvalidRequest(_) => "invalid_request",
            BatchError::InsufficientStock { .. } => "insufficient_stock",
            BatchError::StorageFailure(_) => "storage_failure",
        }
    }
}

fn describe_shortfalls(pool: StockPool, shortfalls: &[Shortfall]) -> String {
    shortfalls
        .iter()
        .map(|s| s.describe(pool))
        .collect::<Vec<_>>()
        .join("; ")
}
