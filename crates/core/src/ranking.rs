use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::client::ClientId;
use crate::domain::farmer::{Farmer, FarmerId};
use crate::domain::inventory::{InventoryEntry, StockQuote};
use crate::domain::product::ProductId;
use crate::reference::ReferenceData;

pub const RANKING_LIMIT: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedFarmer {
    pub farmer_id: FarmerId,
    pub name: String,
    pub stock: u32,
    pub price: Decimal,
    pub distance: f64,
    pub feedback: f64,
}

/// Farmers whose stock of `product_id` covers `quantity`, in ledger order. Entries whose
/// farmer is not in the reference table are skipped.
pub fn stock_quotes(
    farmers: &[Farmer],
    entries: &[InventoryEntry],
    product_id: ProductId,
    quantity: u32,
) -> Vec<StockQuote> {
    entries
        .iter()
        .filter(|entry| entry.product_id == product_id && entry.can_supply(quantity))
        .filter_map(|entry| {
            let farmer = farmers.iter().find(|farmer| farmer.id == entry.farmer_id)?;
            Some(StockQuote {
                farmer_id: farmer.id,
                farmer_name: farmer.name.clone(),
                stock: entry.stock,
                price: entry.price,
            })
        })
        .collect()
}

/// Best farmers for a client, ordered by distance, then price, then feedback (highest
/// first). At most [`RANKING_LIMIT`] results; empty for unknown client or product or when
/// nobody can cover the quantity.
pub fn rank_farmers(
    reference: &ReferenceData,
    entries: &[InventoryEntry],
    product_id: ProductId,
    quantity: u32,
    client_id: ClientId,
) -> Vec<RankedFarmer> {
    let Some(client) = reference.client(client_id) else {
        return Vec::new();
    };
    if reference.catalog.find(product_id).is_none() {
        return Vec::new();
    }

    let mut candidates = entries
        .iter()
        .filter(|entry| entry.product_id == product_id && entry.can_supply(quantity))
        .filter_map(|entry| {
            let farmer = reference.farmer(entry.farmer_id)?;
            Some(RankedFarmer {
                farmer_id: farmer.id,
                name: farmer.name.clone(),
                stock: entry.stock,
                price: entry.price,
                distance: client.distance_to(farmer.latitude, farmer.longitude),
                feedback: farmer.feedback,
            })
        })
        .collect::<Vec<_>>();

    candidates.sort_by(ranking_order);
    candidates.truncate(RANKING_LIMIT);
    candidates
}

fn ranking_order(left: &RankedFarmer, right: &RankedFarmer) -> Ordering {
    left.distance
        .total_cmp(&right.distance)
        .then_with(|| left.price.cmp(&right.price))
        .then_with(|| right.feedback.total_cmp(&left.feedback))
}
