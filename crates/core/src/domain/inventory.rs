use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::farmer::FarmerId;
use crate::domain::product::ProductId;

/// Stock held by one farmer for one product. Unique per `(farmer_id, product_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub farmer_id: FarmerId,
    pub product_id: ProductId,
    /// Kilograms on hand. Never negative.
    pub stock: u32,
    /// Dirhams per kilogram.
    pub price: Decimal,
}

impl InventoryEntry {
    pub fn can_supply(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }
}

/// One farmer able to cover a requested quantity, as surfaced by a stock check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockQuote {
    pub farmer_id: FarmerId,
    pub farmer_name: String,
    pub stock: u32,
    pub price: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecrementOutcome {
    Applied { remaining: u32 },
    /// No ledger entry for the pair. Tolerated: the quote may predate an inventory change.
    Missing,
}
