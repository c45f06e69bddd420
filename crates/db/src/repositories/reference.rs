use sqlx::Row;

use fellah_core::domain::client::{Client, ClientId};
use fellah_core::domain::farmer::{Farmer, FarmerId};
use fellah_core::domain::product::{Product, ProductId};

use super::{ReferenceRepository, RepositoryError};
use crate::DbPool;

pub struct SqlReferenceRepository {
    pool: DbPool,
}

impl SqlReferenceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let french_name: String =
        row.try_get("french_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let arabic_name: String =
        row.try_get("arabic_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Product { id: ProductId(id), name, french_name, arabic_name })
}

fn row_to_farmer(row: &sqlx::sqlite::SqliteRow) -> Result<Farmer, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let latitude: f64 =
        row.try_get("latitude").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let longitude: f64 =
        row.try_get("longitude").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let feedback: f64 =
        row.try_get("feedback").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Farmer { id: FarmerId(id), name, latitude, longitude, feedback })
}

fn row_to_client(row: &sqlx::sqlite::SqliteRow) -> Result<Client, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let phone: String =
        row.try_get("phone").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let latitude: f64 =
        row.try_get("latitude").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let longitude: f64 =
        row.try_get("longitude").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Client { id: ClientId(id), name, phone, latitude, longitude })
}

#[async_trait::async_trait]
impl ReferenceRepository for SqlReferenceRepository {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows =
            sqlx::query("SELECT id, name, french_name, arabic_name FROM products ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn list_farmers(&self) -> Result<Vec<Farmer>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, latitude, longitude, feedback FROM farmers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_farmer).collect()
    }

    async fn list_clients(&self) -> Result<Vec<Client>, RepositoryError> {
        let rows =
            sqlx::query("SELECT id, name, phone, latitude, longitude FROM clients ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_client).collect()
    }
}
