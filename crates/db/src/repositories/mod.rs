use async_trait::async_trait;
use thiserror::Error;

use fellah_core::domain::client::{Client, ClientId};
use fellah_core::domain::farmer::{Farmer, FarmerId};
use fellah_core::domain::inventory::{DecrementOutcome, InventoryEntry, StockQuote};
use fellah_core::domain::order::{Order, OrderId, OrderRequest};
use fellah_core::domain::product::{Product, ProductId};
use fellah_core::errors::{ApplicationError, DomainError};
use fellah_core::reference::ReferenceData;

pub mod ledger;
pub mod memory;
pub mod orders;
pub mod reference;

pub use ledger::SqlInventoryLedger;
pub use memory::InMemoryMarketStore;
pub use orders::SqlOrderStore;
pub use reference::SqlReferenceRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(
        "insufficient stock for farmer {} product {}: requested {requested}, available {available}",
        .farmer_id.0,
        .product_id.0
    )]
    InsufficientStock { farmer_id: FarmerId, product_id: ProductId, requested: u32, available: u32 },
    #[error("order request has no line items")]
    EmptyOrder,
    #[error("order request has no selected farmer")]
    MissingFarmer,
    #[error("order verification failed: expected {expected} new orders, found {found}")]
    VerificationFailed { expected: usize, found: usize },
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::InsufficientStock { farmer_id, product_id, requested, available } => {
                ApplicationError::Domain(DomainError::InsufficientStock {
                    farmer_id: farmer_id.0,
                    product_id: product_id.0,
                    requested,
                    available,
                })
            }
            RepositoryError::EmptyOrder | RepositoryError::MissingFarmer => {
                ApplicationError::Domain(DomainError::InvariantViolation(value.to_string()))
            }
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

/// Read access to the immutable marketplace tables.
#[async_trait]
pub trait ReferenceRepository: Send + Sync {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn list_farmers(&self) -> Result<Vec<Farmer>, RepositoryError>;
    async fn list_clients(&self) -> Result<Vec<Client>, RepositoryError>;

    async fn load_reference_data(&self) -> Result<ReferenceData, RepositoryError> {
        let products = self.list_products().await?;
        let farmers = self.list_farmers().await?;
        let clients = self.list_clients().await?;
        Ok(ReferenceData::new(products, farmers, clients))
    }
}

/// Per (farmer, product) stock and price.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    async fn entries_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<InventoryEntry>, RepositoryError>;

    /// Farmers able to cover `quantity`. Empty for an unknown product.
    async fn check_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Vec<StockQuote>, RepositoryError>;

    /// Atomic compare-and-decrement. Never drives stock below zero.
    async fn decrement(
        &self,
        farmer_id: FarmerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<DecrementOutcome, RepositoryError>;
}

/// Append-only order records. An append decrements the ledger for every line and either
/// commits all of it or none of it.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn append(&self, request: OrderRequest) -> Result<Vec<Order>, RepositoryError>;
    async fn find(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError>;
    async fn latest_pending_for_client(
        &self,
        client_id: ClientId,
    ) -> Result<Option<Order>, RepositoryError>;
    async fn list_for_client(&self, client_id: ClientId) -> Result<Vec<Order>, RepositoryError>;
}

pub(crate) fn validate_request(request: &OrderRequest) -> Result<FarmerId, RepositoryError> {
    if request.lines.is_empty() {
        return Err(RepositoryError::EmptyOrder);
    }
    request.farmer_id.ok_or(RepositoryError::MissingFarmer)
}

pub(crate) fn log_missing_entry(farmer_id: FarmerId, product_id: ProductId, quantity: u32) {
    tracing::warn!(
        event_name = "persistence.ledger.entry_missing",
        farmer_id = farmer_id.0,
        product_id = product_id.0,
        quantity,
        "no inventory entry for order line; stock left unchanged"
    );
}

#[cfg(test)]
mod tests {
    use fellah_core::domain::client::ClientId;
    use fellah_core::domain::farmer::FarmerId;
    use fellah_core::domain::order::{DeliveryWindow, OrderLine, OrderRequest};
    use fellah_core::domain::product::ProductId;
    use fellah_core::errors::{ApplicationError, DomainError};

    use super::{validate_request, RepositoryError};

    fn request(lines: Vec<OrderLine>, farmer_id: Option<FarmerId>) -> OrderRequest {
        OrderRequest {
            client_id: ClientId(1),
            lines,
            farmer_id,
            delivery: DeliveryWindow::default(),
        }
    }

    #[test]
    fn empty_and_farmerless_requests_are_rejected() {
        let line = OrderLine { product_id: ProductId(1), quantity: 2 };

        assert!(matches!(
            validate_request(&request(Vec::new(), Some(FarmerId(1)))),
            Err(RepositoryError::EmptyOrder)
        ));
        assert!(matches!(
            validate_request(&request(vec![line.clone()], None)),
            Err(RepositoryError::MissingFarmer)
        ));
        assert_eq!(validate_request(&request(vec![line], Some(FarmerId(4)))).ok(), Some(FarmerId(4)));
    }

    #[test]
    fn insufficient_stock_maps_to_domain_error() {
        let mapped = ApplicationError::from(RepositoryError::InsufficientStock {
            farmer_id: FarmerId(2),
            product_id: ProductId(3),
            requested: 9,
            available: 4,
        });

        assert_eq!(
            mapped,
            ApplicationError::Domain(DomainError::InsufficientStock {
                farmer_id: 2,
                product_id: 3,
                requested: 9,
                available: 4,
            })
        );
    }

    #[test]
    fn verification_failure_is_a_persistence_error() {
        let mapped =
            ApplicationError::from(RepositoryError::VerificationFailed { expected: 2, found: 1 });
        assert!(matches!(mapped, ApplicationError::Persistence(_)));
    }
}
