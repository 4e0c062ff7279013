//! HTTP routes grouped by area.

use axum::Router;

pub mod inventory;
pub mod system;

/// Router for all `/inventory` endpoints (expects `Extension<Arc<AppServices>>`).
pub fn router() -> Router {
    Router::new().nest("/inventory", inventory::router())
}
