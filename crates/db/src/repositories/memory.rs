use std::collections::BTreeMap;

use tokio::sync::RwLock;

use fellah_core::domain::client::{Client, ClientId};
use fellah_core::domain::farmer::{Farmer, FarmerId};
use fellah_core::domain::inventory::{DecrementOutcome, InventoryEntry, StockQuote};
use fellah_core::domain::order::{Order, OrderId, OrderRequest, OrderStatus};
use fellah_core::domain::product::{Product, ProductId};
use fellah_core::ranking::stock_quotes;

use super::{
    log_missing_entry, validate_request, InventoryLedger, OrderStore, ReferenceRepository,
    RepositoryError,
};

#[derive(Default)]
struct MarketState {
    inventory: BTreeMap<(FarmerId, ProductId), InventoryEntry>,
    orders: Vec<Order>,
}

impl MarketState {
    fn decrement(
        &mut self,
        farmer_id: FarmerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<DecrementOutcome, RepositoryError> {
        let Some(entry) = self.inventory.get_mut(&(farmer_id, product_id)) else {
            log_missing_entry(farmer_id, product_id, quantity);
            return Ok(DecrementOutcome::Missing);
        };
        if !entry.can_supply(quantity) {
            return Err(RepositoryError::InsufficientStock {
                farmer_id,
                product_id,
                requested: quantity,
                available: entry.stock,
            });
        }
        entry.stock -= quantity;
        Ok(DecrementOutcome::Applied { remaining: entry.stock })
    }
}

/// Reference tables, ledger and orders in one process-local store. Ledger and orders
/// share a single lock so an append is all-or-nothing with respect to other appends.
pub struct InMemoryMarketStore {
    products: Vec<Product>,
    farmers: Vec<Farmer>,
    clients: Vec<Client>,
    state: RwLock<MarketState>,
}

impl InMemoryMarketStore {
    pub fn new(
        products: Vec<Product>,
        farmers: Vec<Farmer>,
        clients: Vec<Client>,
        inventory: Vec<InventoryEntry>,
    ) -> Self {
        let inventory = inventory
            .into_iter()
            .map(|entry| ((entry.farmer_id, entry.product_id), entry))
            .collect();
        Self {
            products,
            farmers,
            clients,
            state: RwLock::new(MarketState { inventory, orders: Vec::new() }),
        }
    }

    pub async fn stock_of(&self, farmer_id: FarmerId, product_id: ProductId) -> Option<u32> {
        let state = self.state.read().await;
        state.inventory.get(&(farmer_id, product_id)).map(|entry| entry.stock)
    }

    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait::async_trait]
impl ReferenceRepository for InMemoryMarketStore {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.products.clone())
    }

    async fn list_farmers(&self) -> Result<Vec<Farmer>, RepositoryError> {
        Ok(self.farmers.clone())
    }

    async fn list_clients(&self) -> Result<Vec<Client>, RepositoryError> {
        Ok(self.clients.clone())
    }
}

#[async_trait::async_trait]
impl InventoryLedger for InMemoryMarketStore {
    async fn entries_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<InventoryEntry>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.inventory.values().filter(|entry| entry.product_id == product_id).cloned().collect())
    }

    async fn check_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Vec<StockQuote>, RepositoryError> {
        let state = self.state.read().await;
        let entries = state.inventory.values().cloned().collect::<Vec<_>>();
        Ok(stock_quotes(&self.farmers, &entries, product_id, quantity))
    }

    async fn decrement(
        &self,
        farmer_id: FarmerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<DecrementOutcome, RepositoryError> {
        let mut state = self.state.write().await;
        state.decrement(farmer_id, product_id, quantity)
    }
}

#[async_trait::async_trait]
impl OrderStore for InMemoryMarketStore {
    async fn append(&self, request: OrderRequest) -> Result<Vec<Order>, RepositoryError> {
        let farmer_id = validate_request(&request)?;
        let mut state = self.state.write().await;

        // Check totals per product before touching stock so a rejected append leaves no trace.
        let mut requested = BTreeMap::<ProductId, u32>::new();
        for line in &request.lines {
            let total = requested.entry(line.product_id).or_default();
            *total = total.saturating_add(line.quantity);
        }
        for (product_id, quantity) in requested {
            if let Some(entry) = state.inventory.get(&(farmer_id, product_id)) {
                if !entry.can_supply(quantity) {
                    return Err(RepositoryError::InsufficientStock {
                        farmer_id,
                        product_id,
                        requested: quantity,
                        available: entry.stock,
                    });
                }
            }
        }

        let mut next_id = OrderId::next_after(state.orders.iter().map(|order| order.id).max());
        let mut created = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            state.decrement(farmer_id, line.product_id, line.quantity)?;
            created.push(Order {
                id: next_id,
                client_id: request.client_id,
                product_id: line.product_id,
                farmer_id,
                quantity: line.quantity,
                status: OrderStatus::Pending,
                delivery: request.delivery,
            });
            next_id = OrderId::next_after(Some(next_id));
        }
        state.orders.extend(created.iter().cloned());

        let found = created
            .iter()
            .filter(|order| state.orders.iter().any(|stored| stored.id == order.id))
            .count();
        if found != created.len() {
            return Err(RepositoryError::VerificationFailed { expected: created.len(), found });
        }

        Ok(created)
    }

    async fn find(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|order| order.id == order_id).cloned())
    }

    async fn latest_pending_for_client(
        &self,
        client_id: ClientId,
    ) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|order| order.client_id == client_id && order.status == OrderStatus::Pending)
            .max_by_key(|order| order.id)
            .cloned())
    }

    async fn list_for_client(&self, client_id: ClientId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.orders.iter().filter(|order| order.client_id == client_id).cloned().collect())
    }
}
