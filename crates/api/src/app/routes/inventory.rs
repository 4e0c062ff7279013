use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};

use lotkeeper_core::ProductId;
use lotkeeper_infra::BatchReceipt;
use lotkeeper_inventory::{BatchError, InventoryLot, NewLot, StockRequest};

use crate::app::dto::{BatchResponse, LotDto, ReceiveLotRequest, StockDto, StockViewDto};
use crate::app::errors::{batch_error_to_response, intake_error_to_response, json_error};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/reserve", post(reserve))
        .route("/consume", post(consume))
        .route("/lots", post(receive_lot))
        .route("/products/:product_id/lots", get(list_lots))
        .route("/products/:product_id/stock", get(product_stock))
        .route("/stock", get(list_stock))
}

// Engine calls block on product locks (and on the Postgres runtime bridge), so every
// store-touching handler runs them on the blocking pool.

async fn reserve(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<StockRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return batch_error_to_response(BatchError::invalid(rejection.body_text())),
    };

    run_batch(move || services.reservations.reserve_request(request)).await
}

async fn consume(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<StockRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return batch_error_to_response(BatchError::invalid(rejection.body_text())),
    };

    run_batch(move || services.consumptions.consume_request(request)).await
}

async fn run_batch<F>(op: F) -> Response
where
    F: FnOnce() -> Result<BatchReceipt, BatchError> + Send + 'static,
{
    match tokio::task::spawn_blocking(op).await {
        Ok(Ok(receipt)) => (StatusCode::OK, Json(BatchResponse::from(receipt))).into_response(),
        Ok(Err(err)) => batch_error_to_response(err),
        Err(join) => {
            tracing::error!(error = %join, "batch task failed");
            batch_error_to_response(BatchError::storage(format!("batch task failed: {join}")))
        }
    }
}

async fn receive_lot(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<ReceiveLotRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text()),
    };
    let new_lot = match NewLot::try_from(req) {
        Ok(new_lot) => new_lot,
        Err(e) => return intake_error_to_response(e.into()),
    };

    match tokio::task::spawn_blocking(move || services.intake.receive(new_lot)).await {
        Ok(Ok(lot)) => (StatusCode::CREATED, Json(LotDto::from(&lot))).into_response(),
        Ok(Err(e)) => intake_error_to_response(e),
        Err(join) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "task_failed", join.to_string()),
    }
}

async fn list_lots(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
) -> Response {
    let product_id = match ProductId::parse(&product_id) {
        Ok(id) => id,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()),
    };

    match load_lots(&services, product_id).await {
        Ok((_, lots)) => Json(lots.iter().map(LotDto::from).collect::<Vec<_>>()).into_response(),
        Err(resp) => resp,
    }
}

async fn product_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
) -> Response {
    let product_id = match ProductId::parse(&product_id) {
        Ok(id) => id,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()),
    };

    match load_lots(&services, product_id).await {
        Ok((product_id, lots)) => Json(StockDto::from_lots(&product_id, &lots)).into_response(),
        Err(resp) => resp,
    }
}

/// Eventually-consistent totals from the stock projection.
async fn list_stock(Extension(services): Extension<Arc<AppServices>>) -> Json<Vec<StockViewDto>> {
    Json(services.projection.list().into_iter().map(StockViewDto::from).collect())
}

async fn load_lots(
    services: &Arc<AppServices>,
    product_id: ProductId,
) -> Result<(ProductId, Vec<InventoryLot>), Response> {
    let services = services.clone();
    let loaded = tokio::task::spawn_blocking(move || {
        let lots = services.lots.lots_for_product(&product_id);
        (product_id, lots)
    })
    .await;

    match loaded {
        Ok((product_id, Ok(lots))) => Ok((product_id, lots)),
        Ok((_, Err(e))) => Err(json_error(StatusCode::SERVICE_UNAVAILABLE, "storage_failure", e.to_string())),
        Err(join) => Err(json_error(StatusCode::INTERNAL_SERVER_ERROR, "task_failed", join.to_string())),
    }
}
