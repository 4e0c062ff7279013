use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use lotkeeper_core::ProductId;
use lotkeeper_events::EventEnvelope;
use lotkeeper_inventory::{StockChange, StockTotals};

/// Queryable read model: latest known totals for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStockView {
    pub product_id: ProductId,
    pub available: u64,
    pub reserved: u64,
    /// Sequence number of the envelope these totals came from.
    pub sequence_number: u64,
}

impl ProductStockView {
    pub fn totals(&self) -> StockTotals {
        StockTotals {
            available: self.available,
            reserved: self.reserved,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProductStockProjectionError {
    #[error("failed to deserialize stock change: {0}")]
    Deserialize(String),

    #[error("envelope product {envelope} does not match payload product {payload}")]
    ProductMismatch { envelope: ProductId, payload: ProductId },

    #[error("sequence numbers start at 1 (found 0)")]
    ZeroSequence,
}

/// Per-product stock projection.
///
/// Consumes published stock-change envelopes and keeps the latest totals per product.
/// Eventually consistent with the lot store; disposable and rebuildable by replay.
///
/// Each change carries absolute `after` totals, so applying the newest envelope is enough.
/// Envelopes whose sequence number is not newer than the product's cursor are ignored
/// (at-least-once delivery); gaps are accepted because the publisher may drop messages.
#[derive(Debug, Default)]
pub struct ProductStockProjection {
    views: RwLock<HashMap<ProductId, ProductStockView>>,
}

impl ProductStockProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, product_id: &ProductId) -> Option<ProductStockView> {
        self.views.read().ok()?.get(product_id).cloned()
    }

    /// All products seen so far, sorted by product id.
    pub fn list(&self) -> Vec<ProductStockView> {
        let mut views: Vec<_> = self
            .views
            .read()
            .map(|v| v.values().cloned().collect())
            .unwrap_or_default();
        views.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        views
    }

    /// Apply a published envelope. Returns `Ok(false)` for duplicates and stale deliveries.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProductStockProjectionError> {
        let seq = envelope.sequence_number();
        if seq == 0 {
            return Err(ProductStockProjectionError::ZeroSequence);
        }

        let Ok(mut views) = self.views.write() else {
            return Ok(false);
        };

        let last = views.get(envelope.product_id()).map(|v| v.sequence_number).unwrap_or(0);
        if seq <= last {
            return Ok(false);
        }

        let change: StockChange = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProductStockProjectionError::Deserialize(e.to_string()))?;

        if change.product_id() != envelope.product_id() {
            return Err(ProductStockProjectionError::ProductMismatch {
                envelope: envelope.product_id().clone(),
                payload: change.product_id().clone(),
            });
        }

        let after = change.after();
        views.insert(
            envelope.product_id().clone(),
            ProductStockView {
                product_id: envelope.product_id().clone(),
                available: after.available,
                reserved: after.reserved,
                sequence_number: seq,
            },
        );
        Ok(true)
    }

    /// Drop every view and replay `envelopes` in (product, sequence) order.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProductStockProjectionError> {
        if let Ok(mut views) = self.views.write() {
            views.clear();
        }

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by(|a, b| {
            a.product_id()
                .cmp(b.product_id())
                .then(a.sequence_number().cmp(&b.sequence_number()))
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
