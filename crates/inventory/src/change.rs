//! Stock change events and the change-notifier boundary.
//!
//! The engines emit one [`StockChange`] per affected product per successful batch.
//! What happens next (domain event publication, live-client pushes) belongs to the
//! [`ChangeNotifier`] implementation the engine was built with.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lotkeeper_core::ProductId;
use lotkeeper_events::Event;

use crate::allocation::pool_total;
use crate::lot::{InventoryLot, StockPool};

/// Per-product totals across all lots.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTotals {
    pub available: u64,
    pub reserved: u64,
}

impl StockTotals {
    pub fn of<'a>(lots: impl IntoIterator<Item = &'a InventoryLot> + Clone) -> Self {
        Self {
            available: pool_total(lots.clone(), StockPool::Available),
            reserved: pool_total(lots, StockPool::Reserved),
        }
    }

    /// Units physically held (available + reserved).
    pub fn on_hand(&self) -> u64 {
        self.available.saturating_add(self.reserved)
    }
}

/// Event: stock of one product was reserved by a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub product_id: ProductId,
    pub quantity_reserved_delta: u64,
    pub quantity_available_after: u64,
    pub before: StockTotals,
    pub after: StockTotals,
    pub occurred_at: DateTime<Utc>,
}

/// Event: reserved stock of one product was consumed (left the system).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockConsumed {
    pub product_id: ProductId,
    pub quantity_consumed_delta: u64,
    pub quantity_reserved_after: u64,
    pub before: StockTotals,
    pub after: StockTotals,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockChange {
    Reserved(StockReserved),
    Consumed(StockConsumed),
}

impl StockChange {
    pub fn product_id(&self) -> &ProductId {
        match self {
            StockChange::Reserved(e) => &e.product_id,
            StockChange::Consumed(e) => &e.product_id,
        }
    }

    pub fn before(&self) -> StockTotals {
        match self {
            StockChange::Reserved(e) => e.before,
            StockChange::Consumed(e) => e.before,
        }
    }

    pub fn after(&self) -> StockTotals {
        match self {
            StockChange::Reserved(e) => e.after,
            StockChange::Consumed(e) => e.after,
        }
    }
}

impl Event for StockChange {
    fn event_type(&self) -> &'static str {
        match self {
            StockChange::Reserved(_) => "inventory.stock.reserved",
            StockChange::Consumed(_) => "inventory.stock.consumed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockChange::Reserved(e) => e.occurred_at,
            StockChange::Consumed(e) => e.occurred_at,
        }
    }
}

/// Receives stock changes after a batch has been committed.
///
/// Called exactly once per affected product per successful batch. Implementations own
/// delivery: the engines never retry and never fail a committed batch on their behalf,
/// so `notify` has no error channel.
pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, change: &StockChange);
}

impl<N> ChangeNotifier for Arc<N>
where
    N: ChangeNotifier + ?Sized,
{
    fn notify(&self, change: &StockChange) {
        (**self).notify(change)
    }
}

/// Discards every change.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChangeNotifier;

impl ChangeNotifier for NoopChangeNotifier {
    fn notify(&self, _change: &StockChange) {}
}

/// Keeps every change in memory (tests/dev).
#[derive(Debug, Default)]
pub struct RecordingChangeNotifier {
    changes: Mutex<Vec<StockChange>>,
}

impl RecordingChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> Vec<StockChange> {
        self.changes.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn take(&self) -> Vec<StockChange> {
        self.changes
            .lock()
            .map(|mut c| std::mem::take(&mut *c))
            .unwrap_or_default()
    }
}

impl ChangeNotifier for RecordingChangeNotifier {
    fn notify(&self, change: &StockChange) {
        if let Ok(mut changes) = self.changes.lock() {
            changes.push(change.clone());
        }
    }
}
