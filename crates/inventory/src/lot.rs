use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use lotkeeper_core::{DomainError, DomainResult, Entity, LotId, ProductId, ValueObject};

/// Which of a lot's two counters an operation draws from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockPool {
    /// Orderable stock (`quantity_available`); drawn by reservations.
    Available,
    /// Promised stock (`quantity_reserved`); drawn by consumption.
    Reserved,
}

impl core::fmt::Display for StockPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StockPool::Available => f.write_str("available"),
            StockPool::Reserved => f.write_str("reserved"),
        }
    }
}

/// Where a lot physically sits. Descriptive only; allocation never looks at it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub aisle: Option<String>,
    #[serde(default)]
    pub shelf: Option<String>,
}

impl ValueObject for StorageLocation {}

/// Input for receiving a new lot into stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLot {
    /// Caller-assigned id; a fresh UUIDv7 is used when absent.
    #[serde(default)]
    pub lot_id: Option<LotId>,
    pub product_id: ProductId,
    pub quantity: u64,
    pub expiration_date: NaiveDate,
    #[serde(default)]
    pub location: Option<StorageLocation>,
}

/// One batch of a product sharing a single expiration date.
///
/// Counters are unsigned and every transition uses checked arithmetic, so a lot can
/// never hold a negative quantity. The only transitions are [`InventoryLot::reserve`]
/// and [`InventoryLot::consume`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLot {
    lot_id: LotId,
    product_id: ProductId,
    quantity_available: u64,
    quantity_reserved: u64,
    expiration_date: NaiveDate,
    location: Option<StorageLocation>,
    version: u64,
}

impl InventoryLot {
    /// Create a lot from a restocking event.
    ///
    /// The expiration date must be strictly after `today`; reserved stock starts at zero.
    pub fn receive(new: NewLot, today: NaiveDate) -> DomainResult<Self> {
        if new.quantity == 0 {
            return Err(DomainError::validation("lot quantity must be greater than zero"));
        }
        if new.expiration_date <= today {
            return Err(DomainError::validation(format!(
                "expiration_date {} must be after {today}",
                new.expiration_date
            )));
        }

        Ok(Self {
            lot_id: new.lot_id.unwrap_or_default(),
            product_id: new.product_id,
            quantity_available: new.quantity,
            quantity_reserved: 0,
            expiration_date: new.expiration_date,
            location: new.location,
            version: 1,
        })
    }

    /// Rebuild a lot from persisted state. No creation-time rules are re-checked.
    pub fn from_parts(
        lot_id: LotId,
        product_id: ProductId,
        quantity_available: u64,
        quantity_reserved: u64,
        expiration_date: NaiveDate,
        location: Option<StorageLocation>,
        version: u64,
    ) -> Self {
        Self {
            lot_id,
            product_id,
            quantity_available,
            quantity_reserved,
            expiration_date,
            location,
            version,
        }
    }

    pub fn lot_id(&self) -> LotId {
        self.lot_id
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn quantity_available(&self) -> u64 {
        self.quantity_available
    }

    pub fn quantity_reserved(&self) -> u64 {
        self.quantity_reserved
    }

    pub fn expiration_date(&self) -> NaiveDate {
        self.expiration_date
    }

    pub fn location(&self) -> Option<&StorageLocation> {
        self.location.as_ref()
    }

    pub fn quantity_in(&self, pool: StockPool) -> u64 {
        match pool {
            StockPool::Available => self.quantity_available,
            StockPool::Reserved => self.quantity_reserved,
        }
    }

    /// Move `amount` units from available to reserved on this lot.
    pub fn reserve(&mut self, amount: u64) -> DomainResult<()> {
        if amount == 0 {
            return Err(DomainError::validation("reserve amount must be greater than zero"));
        }
        let available = self.quantity_available.checked_sub(amount).ok_or_else(|| {
            DomainError::invariant(format!(
                "lot {} cannot reserve {amount}: only {} available",
                self.lot_id, self.quantity_available
            ))
        })?;
        let reserved = self
            .quantity_reserved
            .checked_add(amount)
            .ok_or_else(|| DomainError::invariant("reserved quantity overflow"))?;

        self.quantity_available = available;
        self.quantity_reserved = reserved;
        Ok(())
    }

    /// Permanently remove `amount` reserved units from this lot.
    pub fn consume(&mut self, amount: u64) -> DomainResult<()> {
        if amount == 0 {
            return Err(DomainError::validation("consume amount must be greater than zero"));
        }
        self.quantity_reserved = self.quantity_reserved.checked_sub(amount).ok_or_else(|| {
            DomainError::invariant(format!(
                "lot {} cannot consume {amount}: only {} reserved",
                self.lot_id, self.quantity_reserved
            ))
        })?;
        Ok(())
    }

    /// Draw `amount` from the given pool: a reservation for `Available`, a consumption
    /// for `Reserved`.
    pub fn draw(&mut self, pool: StockPool, amount: u64) -> DomainResult<()> {
        match pool {
            StockPool::Available => self.reserve(amount),
            StockPool::Reserved => self.consume(amount),
        }
    }

    /// Bump the persisted revision. Called by stores when a mutation is committed.
    pub fn advance_version(&mut self) {
        self.version += 1;
    }
}

impl Entity for InventoryLot {
    type Id = LotId;

    fn id(&self) -> &Self::Id {
        &self.lot_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
