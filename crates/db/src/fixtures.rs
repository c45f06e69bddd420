use rust_decimal::Decimal;
use sqlx::Executor;

use fellah_core::domain::client::{Client, ClientId};
use fellah_core::domain::farmer::{Farmer, FarmerId};
use fellah_core::domain::inventory::InventoryEntry;
use fellah_core::domain::product::{Product, ProductId};

use crate::connection::DbPool;
use crate::repositories::{InMemoryMarketStore, RepositoryError};

struct ProductSeed {
    id: i64,
    name: &'static str,
    french_name: &'static str,
    arabic_name: &'static str,
}

struct FarmerSeed {
    id: i64,
    name: &'static str,
    latitude: f64,
    longitude: f64,
    feedback: f64,
}

struct ClientSeed {
    id: i64,
    name: &'static str,
    phone: &'static str,
    latitude: f64,
    longitude: f64,
}

/// (farmer id, product id, stock kg, price in centimes)
type InventorySeed = (i64, i64, u32, i64);

const PRODUCTS: &[ProductSeed] = &[
    ProductSeed { id: 1, name: "Tomato", french_name: "Tomate", arabic_name: "طماطم" },
    ProductSeed { id: 2, name: "Potato", french_name: "Pomme de terre", arabic_name: "بطاطا" },
    ProductSeed { id: 3, name: "Dates", french_name: "Dattes", arabic_name: "تمر" },
    ProductSeed { id: 4, name: "Onion", french_name: "Oignon", arabic_name: "بصل" },
    ProductSeed { id: 5, name: "Orange", french_name: "Orange", arabic_name: "برتقال" },
];

const FARMERS: &[FarmerSeed] = &[
    FarmerSeed { id: 1, name: "Hassan", latitude: 33.5731, longitude: -7.5898, feedback: 4.5 },
    FarmerSeed { id: 2, name: "Fatima", latitude: 33.5950, longitude: -7.6100, feedback: 4.8 },
    FarmerSeed { id: 3, name: "Youssef", latitude: 33.5500, longitude: -7.6500, feedback: 3.9 },
    FarmerSeed { id: 4, name: "Khadija", latitude: 33.6200, longitude: -7.5500, feedback: 4.2 },
];

const CLIENTS: &[ClientSeed] = &[
    ClientSeed { id: 1, name: "Amina", phone: "0612345678", latitude: 33.5800, longitude: -7.6000 },
    ClientSeed { id: 2, name: "Karim", phone: "0698765432", latitude: 33.6100, longitude: -7.5600 },
];

const INVENTORY: &[InventorySeed] = &[
    (1, 1, 100, 650),
    (1, 3, 40, 3500),
    (1, 4, 30, 400),
    (2, 1, 50, 700),
    (2, 2, 200, 400),
    (2, 3, 25, 3800),
    (3, 3, 10, 3000),
    (3, 4, 80, 350),
    (4, 2, 60, 380),
    (4, 5, 120, 500),
];

/// Deterministic demo marketplace: five products, four farmers around Casablanca, two
/// clients and their stock. The SQL fixture and the Rust tables below describe the same
/// data; `verify` and the tests keep them in step.
pub struct DemoDataset;

impl DemoDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Idempotent: re-running restores demo stock levels without touching orders.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            products: PRODUCTS.len(),
            farmers: FARMERS.len(),
            clients: CLIENTS.len(),
            inventory_entries: INVENTORY.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for product in PRODUCTS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM products WHERE id = ?1 AND french_name = ?2 AND arabic_name = ?3)",
            )
            .bind(product.id)
            .bind(product.french_name)
            .bind(product.arabic_name)
            .fetch_one(pool)
            .await?;
            checks.push((format!("product-{}", product.id), present == 1));
        }

        for farmer in FARMERS {
            let present: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM farmers WHERE id = ?1 AND name = ?2)")
                    .bind(farmer.id)
                    .bind(farmer.name)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("farmer-{}", farmer.id), present == 1));
        }

        for client in CLIENTS {
            let present: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM clients WHERE id = ?1 AND phone = ?2)")
                    .bind(client.id)
                    .bind(client.phone)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("client-{}", client.id), present == 1));
        }

        for (farmer_id, product_id, _, _) in INVENTORY {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM farmer_products WHERE farmer_id = ?1 AND product_id = ?2)",
            )
            .bind(*farmer_id)
            .bind(*product_id)
            .fetch_one(pool)
            .await?;
            checks.push((format!("inventory-{farmer_id}-{product_id}"), present == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    pub fn products() -> Vec<Product> {
        PRODUCTS
            .iter()
            .map(|seed| Product {
                id: ProductId(seed.id),
                name: seed.name.to_string(),
                french_name: seed.french_name.to_string(),
                arabic_name: seed.arabic_name.to_string(),
            })
            .collect()
    }

    pub fn farmers() -> Vec<Farmer> {
        FARMERS
            .iter()
            .map(|seed| Farmer {
                id: FarmerId(seed.id),
                name: seed.name.to_string(),
                latitude: seed.latitude,
                longitude: seed.longitude,
                feedback: seed.feedback,
            })
            .collect()
    }

    pub fn clients() -> Vec<Client> {
        CLIENTS
            .iter()
            .map(|seed| Client {
                id: ClientId(seed.id),
                name: seed.name.to_string(),
                phone: seed.phone.to_string(),
                latitude: seed.latitude,
                longitude: seed.longitude,
            })
            .collect()
    }

    pub fn inventory() -> Vec<InventoryEntry> {
        INVENTORY
            .iter()
            .map(|(farmer_id, product_id, stock, centimes)| InventoryEntry {
                farmer_id: FarmerId(*farmer_id),
                product_id: ProductId(*product_id),
                stock: *stock,
                price: Decimal::new(*centimes, 2),
            })
            .collect()
    }

    /// The same dataset behind an in-process store, for tests and database-less runs.
    pub fn in_memory() -> InMemoryMarketStore {
        InMemoryMarketStore::new(Self::products(), Self::farmers(), Self::clients(), Self::inventory())
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub products: usize,
    pub farmers: usize,
    pub clients: usize,
    pub inventory_entries: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}
