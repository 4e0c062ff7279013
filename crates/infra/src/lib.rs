//! Infrastructure layer: lot stores, product locks, engines, notifier wiring, projections.

pub mod config;
pub mod engine;
pub mod locks;
pub mod lot_store;
pub mod notify;
pub mod projections;
pub mod workers;


pub use config::EngineConfig;
pub use engine::{BatchReceipt, ConsumptionEngine, IntakeError, ItemReceipt, LotIntake, ReservationEngine};
pub use locks::{LockError, ProductLocks};
pub use lot_store::{InMemoryLotStore, LotStore, LotStoreError};
pub use notify::BusChangeNotifier;
pub use projections::{ProductStockProjection, ProductStockView};
pub use workers::{ProjectionWorker, WorkerHandle};
