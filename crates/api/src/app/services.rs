use std::sync::Arc;

use serde_json::Value as JsonValue;

use lotkeeper_events::{EventEnvelope, InMemoryEventBus};
use lotkeeper_infra::{
    BusChangeNotifier, ConsumptionEngine, InMemoryLotStore, LotIntake, LotStore, ProductLocks,
    ProductStockProjection, ProjectionWorker, ReservationEngine, WorkerHandle,
};

use crate::config::AppConfig;

pub type StockBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type SharedLotStore = Arc<dyn LotStore>;
pub type SharedNotifier = Arc<BusChangeNotifier<StockBus>>;

/// Everything the handlers need, built once at startup.
pub struct AppServices {
    pub reservations: ReservationEngine<SharedLotStore, SharedNotifier>,
    pub consumptions: ConsumptionEngine<SharedLotStore, SharedNotifier>,
    pub intake: LotIntake<SharedLotStore>,
    pub lots: SharedLotStore,
    pub projection: Arc<ProductStockProjection>,
    _projection_worker: WorkerHandle,
}

/// Wire stores, engines, the bus and the stock projection.
///
/// - In-memory lot store by default
/// - Postgres lot store when `use_persistent_stores` is set (requires the `postgres` feature)
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let lots = build_lot_store(config).await?;
    wire(lots, config)
}

fn wire(lots: SharedLotStore, config: &AppConfig) -> anyhow::Result<AppServices> {
    let engine_config = config.engine_config();
    let bus: StockBus = Arc::new(InMemoryEventBus::new());
    let notifier: SharedNotifier = Arc::new(BusChangeNotifier::new(bus.clone()));
    let locks = Arc::new(ProductLocks::new());

    let projection = Arc::new(ProductStockProjection::new());
    let sink = projection.clone();
    let worker = ProjectionWorker::spawn("product-stock-projection", &bus, move |env: EventEnvelope<JsonValue>| {
        sink.apply_envelope(&env).map(|_| ())
    })?;

    Ok(AppServices {
        reservations: ReservationEngine::new(lots.clone(), notifier.clone(), locks.clone(), engine_config),
        consumptions: ConsumptionEngine::new(lots.clone(), notifier, locks.clone(), engine_config),
        intake: LotIntake::new(lots.clone(), locks, engine_config),
        lots,
        projection,
        _projection_worker: worker,
    })
}

#[cfg(feature = "postgres")]
async fn build_lot_store(config: &AppConfig) -> anyhow::Result<SharedLotStore> {
    use anyhow::Context;
    use lotkeeper_infra::lot_store::PostgresLotStore;

    if !config.use_persistent_stores {
        tracing::info!("using in-memory lot store");
        return Ok(Arc::new(InMemoryLotStore::new()));
    }

    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required for persistent stores")?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    let store = PostgresLotStore::new(pool);
    store.ensure_schema().await.context("failed to prepare lot schema")?;
    tracing::info!("using Postgres lot store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn build_lot_store(config: &AppConfig) -> anyhow::Result<SharedLotStore> {
    if config.use_persistent_stores {
        anyhow::bail!("persistent stores requested but lotkeeper-api was built without the `postgres` feature");
    }
    tracing::info!("using in-memory lot store");
    Ok(Arc::new(InMemoryLotStore::new()))
}
