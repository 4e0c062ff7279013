use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use lotkeeper_core::{DomainError, LotId, ProductId};
use lotkeeper_infra::{BatchReceipt, ItemReceipt, ProductStockView};
use lotkeeper_inventory::{InventoryLot, NewLot, StockTotals, StorageLocation};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ReceiveLotRequest {
    #[serde(default)]
    pub lot_id: Option<String>,
    pub product_id: String,
    pub quantity: i64,
    pub expiration_date: NaiveDate,
    #[serde(default)]
    pub location: Option<StorageLocation>,
}

impl TryFrom<ReceiveLotRequest> for NewLot {
    type Error = DomainError;

    fn try_from(req: ReceiveLotRequest) -> Result<Self, Self::Error> {
        let lot_id = req.lot_id.as_deref().map(str::parse::<LotId>).transpose()?;
        let product_id = ProductId::parse(&req.product_id)?;
        let quantity = u64::try_from(req.quantity)
            .map_err(|_| DomainError::validation(format!("quantity must not be negative (got {})", req.quantity)))?;

        Ok(NewLot {
            lot_id,
            product_id,
            quantity,
            expiration_date: req.expiration_date,
            location: req.location,
        })
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub message: String,
    pub items: Vec<ItemReceipt>,
}

impl From<BatchReceipt> for BatchResponse {
    fn from(receipt: BatchReceipt) -> Self {
        Self {
            success: true,
            message: receipt.message(),
            items: receipt.items,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LotDto {
    pub lot_id: String,
    pub product_id: String,
    pub quantity_available: u64,
    pub quantity_reserved: u64,
    pub expiration_date: NaiveDate,
    pub location: Option<StorageLocation>,
}

impl From<&InventoryLot> for LotDto {
    fn from(lot: &InventoryLot) -> Self {
        Self {
            lot_id: lot.lot_id().to_string(),
            product_id: lot.product_id().to_string(),
            quantity_available: lot.quantity_available(),
            quantity_reserved: lot.quantity_reserved(),
            expiration_date: lot.expiration_date(),
            location: lot.location().cloned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StockDto {
    pub product_id: String,
    pub available: u64,
    pub reserved: u64,
    pub on_hand: u64,
    pub lot_count: usize,
}

impl StockDto {
    pub fn from_lots(product_id: &ProductId, lots: &[InventoryLot]) -> Self {
        let totals = StockTotals::of(lots);
        Self {
            product_id: product_id.to_string(),
            available: totals.available,
            reserved: totals.reserved,
            on_hand: totals.on_hand(),
            lot_count: lots.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StockViewDto {
    pub product_id: String,
    pub available: u64,
    pub reserved: u64,
    pub sequence_number: u64,
}

impl From<ProductStockView> for StockViewDto {
    fn from(view: ProductStockView) -> Self {
        Self {
            product_id: view.product_id.to_string(),
            available: view.available,
            reserved: view.reserved,
            sequence_number: view.sequence_number,
        }
    }
}
