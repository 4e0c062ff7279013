//! Read-model projections fed from the event bus.

pub mod product_stock;

pub use product_stock::{ProductStockProjection, ProductStockProjectionError, ProductStockView};
