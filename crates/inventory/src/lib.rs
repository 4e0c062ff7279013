//! Inventory allocation domain.
//!
//! This crate contains the business rules for expiration-dated inventory lots,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage):
//!
//! - [`lot`]: the `InventoryLot` entity and its reserve/consume transitions
//! - [`allocation`]: the FIFO-by-expiration allocation policy
//! - [`request`]: batch request shape validation
//! - [`error`]: batch-level failure taxonomy
//! - [`change`]: stock change events and the change-notifier boundary

pub mod allocation;
pub mod change;
pub mod error;
pub mod lot;
pub mod request;

pub use allocation::{AllocationError, AllocationPlan, Draw, apply_plan, fifo_order, plan_fifo, pool_total};
pub use change::{
    ChangeNotifier, NoopChangeNotifier, RecordingChangeNotifier, StockChange, StockConsumed,
    StockReserved, StockTotals,
};
pub use error::{BatchError, Shortfall};
pub use lot::{InventoryLot, NewLot, StockPool, StorageLocation};
pub use request::{Batch, LineItem, RequestedItem, StockRequest};
