//! Postgres-backed lot store.
//!
//! Lots live in a single `inventory_lots` table. Non-negative quantities are enforced by
//! `CHECK` constraints as a last line of defense; the engines never attempt such writes.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | LotStoreError | Scenario |
//! |------------|----------------------|---------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Lot id already exists |
//! | Database (check constraint violation) | `23514` | `InvalidData` | Negative quantity reached the database |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed / other | N/A | `Backend` | Network errors, connection failures, etc. |
//!
//! A commit whose `UPDATE ... WHERE version = $n` matches no row is rolled back and
//! reported as `Concurrency`.

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use lotkeeper_core::{Entity, LotId, ProductId};
use lotkeeper_inventory::{InventoryLot, StorageLocation};

use super::r#trait::{LotStore, LotStoreError};

/// Idempotent schema for the lot table.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS inventory_lots (
    lot_id             UUID PRIMARY KEY,
    product_id         TEXT NOT NULL,
    quantity_available BIGINT NOT NULL CHECK (quantity_available >= 0),
    quantity_reserved  BIGINT NOT NULL CHECK (quantity_reserved >= 0),
    expiration_date    DATE NOT NULL,
    warehouse          TEXT,
    aisle              TEXT,
    shelf              TEXT,
    version            BIGINT NOT NULL CHECK (version > 0)
);
CREATE INDEX IF NOT EXISTS inventory_lots_product_idx
    ON inventory_lots (product_id, expiration_date, lot_id);
"#;

/// Postgres-backed lot store.
///
/// The `LotStore` trait is synchronous. Calls must come from a thread that is inside a
/// tokio runtime context but allowed to block (e.g. `tokio::task::spawn_blocking`).
#[derive(Debug, Clone)]
pub struct PostgresLotStore {
    pool: Arc<PgPool>,
}

impl PostgresLotStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the lot table and index if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), LotStoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn load_product(&self, product_id: &ProductId) -> Result<Vec<InventoryLot>, LotStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                lot_id,
                product_id,
                quantity_available,
                quantity_reserved,
                expiration_date,
                warehouse,
                aisle,
                shelf,
                version
            FROM inventory_lots
            WHERE product_id = $1
            ORDER BY expiration_date ASC, lot_id ASC
            "#,
        )
        .bind(product_id.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_product", e))?;

        rows.iter()
            .map(|row| {
                LotRow::from_row(row)
                    .map_err(|e| LotStoreError::InvalidData(format!("failed to read lot row: {e}")))
                    .and_then(InventoryLot::try_from)
            })
            .collect()
    }

    #[instrument(skip(self, lot), fields(lot_id = %lot.lot_id(), product_id = %lot.product_id()), err)]
    pub async fn insert(&self, lot: InventoryLot) -> Result<InventoryLot, LotStoreError> {
        let location = lot.location().cloned().unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO inventory_lots (
                lot_id,
                product_id,
                quantity_available,
                quantity_reserved,
                expiration_date,
                warehouse,
                aisle,
                shelf,
                version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(lot.lot_id().as_uuid())
        .bind(lot.product_id().as_str())
        .bind(to_i64("quantity_available", lot.quantity_available())?)
        .bind(to_i64("quantity_reserved", lot.quantity_reserved())?)
        .bind(lot.expiration_date())
        .bind(location.warehouse)
        .bind(location.aisle)
        .bind(location.shelf)
        .bind(to_i64("version", lot.version())?)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_lot", e))?;

        Ok(lot)
    }

    /// Write every lot in one transaction, each guarded by its expected version.
    #[instrument(skip(self, lots), fields(lot_count = lots.len()), err)]
    pub async fn commit_lots(&self, lots: Vec<InventoryLot>) -> Result<Vec<InventoryLot>, LotStoreError> {
        if lots.is_empty() {
            return Ok(vec![]);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut committed = Vec::with_capacity(lots.len());
        for mut lot in lots {
            let result = sqlx::query(
                r#"
                UPDATE inventory_lots
                SET quantity_available = $1,
                    quantity_reserved = $2,
                    version = version + 1
                WHERE lot_id = $3 AND version = $4
                "#,
            )
            .bind(to_i64("quantity_available", lot.quantity_available())?)
            .bind(to_i64("quantity_reserved", lot.quantity_reserved())?)
            .bind(lot.lot_id().as_uuid())
            .bind(to_i64("version", lot.version())?)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_lot", e))?;

            if result.rows_affected() != 1 {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(LotStoreError::Concurrency(format!(
                    "lot {} changed since version {}",
                    lot.lot_id(),
                    lot.version()
                )));
            }

            lot.advance_version();
            committed.push(lot);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(committed)
    }

    fn runtime() -> Result<tokio::runtime::Handle, LotStoreError> {
        tokio::runtime::Handle::try_current().map_err(|_| {
            LotStoreError::Backend(
                "PostgresLotStore requires a tokio runtime context (call from spawn_blocking)".to_string(),
            )
        })
    }
}

impl LotStore for PostgresLotStore {
    fn lots_for_product(&self, product_id: &ProductId) -> Result<Vec<InventoryLot>, LotStoreError> {
        Self::runtime()?.block_on(self.load_product(product_id))
    }

    fn insert_lot(&self, lot: InventoryLot) -> Result<InventoryLot, LotStoreError> {
        Self::runtime()?.block_on(self.insert(lot))
    }

    fn commit(&self, lots: Vec<InventoryLot>) -> Result<Vec<InventoryLot>, LotStoreError> {
        Self::runtime()?.block_on(self.commit_lots(lots))
    }
}

fn to_i64(column: &str, value: u64) -> Result<i64, LotStoreError> {
    i64::try_from(value).map_err(|_| LotStoreError::InvalidData(format!("{column} {value} exceeds BIGINT")))
}

fn to_u64(column: &str, value: i64) -> Result<u64, LotStoreError> {
    u64::try_from(value).map_err(|_| LotStoreError::InvalidData(format!("negative {column}: {value}")))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LotStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => LotStoreError::Conflict(msg),
                Some("23514") => LotStoreError::InvalidData(msg),
                _ => LotStoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => LotStoreError::Backend(format!("connection pool closed in {operation}")),
        _ => LotStoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

#[derive(Debug)]
struct LotRow {
    lot_id: Uuid,
    product_id: String,
    quantity_available: i64,
    quantity_reserved: i64,
    expiration_date: NaiveDate,
    warehouse: Option<String>,
    aisle: Option<String>,
    shelf: Option<String>,
    version: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for LotRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(LotRow {
            lot_id: row.try_get("lot_id")?,
            product_id: row.try_get("product_id")?,
            quantity_available: row.try_get("quantity_available")?,
            quantity_reserved: row.try_get("quantity_reserved")?,
            expiration_date: row.try_get("expiration_date")?,
            warehouse: row.try_get("warehouse")?,
            aisle: row.try_get("aisle")?,
            shelf: row.try_get("shelf")?,
            version: row.try_get("version")?,
        })
    }
}

impl TryFrom<LotRow> for InventoryLot {
    type Error = LotStoreError;

    fn try_from(row: LotRow) -> Result<Self, Self::Error> {
        let product_id = ProductId::parse(&row.product_id)
            .map_err(|e| LotStoreError::InvalidData(format!("lot {}: {e}", row.lot_id)))?;

        let location = if row.warehouse.is_none() && row.aisle.is_none() && row.shelf.is_none() {
            None
        } else {
            Some(StorageLocation {
                warehouse: row.warehouse,
                aisle: row.aisle,
                shelf: row.shelf,
            })
        };

        Ok(InventoryLot::from_parts(
            LotId::from_uuid(row.lot_id),
            product_id,
            to_u64("quantity_available", row.quantity_available)?,
            to_u64("quantity_reserved", row.quantity_reserved)?,
            row.expiration_date,
            location,
            to_u64("version", row.version)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(available: i64, warehouse: Option<&str>) -> LotRow {
        LotRow {
            lot_id: Uuid::now_v7(),
            product_id: "P1".to_string(),
            quantity_available: available,
            quantity_reserved: 0,
            expiration_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            warehouse: warehouse.map(str::to_string),
            aisle: None,
            shelf: None,
            version: 3,
        }
    }

    #[test]
    fn row_maps_to_lot() {
        let lot = InventoryLot::try_from(row(7, Some("W1"))).unwrap();
        assert_eq!(lot.quantity_available(), 7);
        assert_eq!(lot.version(), 3);
        assert_eq!(lot.location().and_then(|l| l.warehouse.as_deref()), Some("W1"));
    }

    #[test]
    fn empty_location_columns_map_to_none() {
        let lot = InventoryLot::try_from(row(1, None)).unwrap();
        assert!(lot.location().is_none());
    }

    #[test]
    fn negative_quantity_is_invalid_data() {
        assert!(matches!(InventoryLot::try_from(row(-1, None)), Err(LotStoreError::InvalidData(_))));
    }
}
