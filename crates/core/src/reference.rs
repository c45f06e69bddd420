use crate::catalog::CatalogIndex;
use crate::domain::client::{Client, ClientId};
use crate::domain::farmer::{Farmer, FarmerId};
use crate::domain::product::Product;

/// Read-mostly reference tables, loaded once at startup and shared across sessions.
#[derive(Clone, Debug, Default)]
pub struct ReferenceData {
    pub catalog: CatalogIndex,
    pub farmers: Vec<Farmer>,
    pub clients: Vec<Client>,
}

impl ReferenceData {
    pub fn new(products: Vec<Product>, farmers: Vec<Farmer>, clients: Vec<Client>) -> Self {
        Self { catalog: CatalogIndex::new(products), farmers, clients }
    }

    pub fn farmer(&self, farmer_id: FarmerId) -> Option<&Farmer> {
        self.farmers.iter().find(|farmer| farmer.id == farmer_id)
    }

    pub fn client(&self, client_id: ClientId) -> Option<&Client> {
        self.clients.iter().find(|client| client.id == client_id)
    }
}
