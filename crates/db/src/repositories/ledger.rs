use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{Row, SqliteConnection};

use fellah_core::domain::farmer::FarmerId;
use fellah_core::domain::inventory::{DecrementOutcome, InventoryEntry, StockQuote};
use fellah_core::domain::product::ProductId;

use super::{log_missing_entry, InventoryLedger, RepositoryError};
use crate::DbPool;

pub struct SqlInventoryLedger {
    pool: DbPool,
}

impl SqlInventoryLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn stock_from_column(value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("stock value `{value}` is out of range")))
}

pub(crate) fn price_from_column(value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value.trim())
        .map_err(|e| RepositoryError::Decode(format!("price `{value}`: {e}")))
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<InventoryEntry, RepositoryError> {
    let farmer_id: i64 =
        row.try_get("farmer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_id: i64 =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let stock: i64 = row.try_get("stock").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price: String =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(InventoryEntry {
        farmer_id: FarmerId(farmer_id),
        product_id: ProductId(product_id),
        stock: stock_from_column(stock)?,
        price: price_from_column(&price)?,
    })
}

fn row_to_quote(row: &sqlx::sqlite::SqliteRow) -> Result<StockQuote, RepositoryError> {
    let farmer_id: i64 =
        row.try_get("farmer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let farmer_name: String =
        row.try_get("farmer_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let stock: i64 = row.try_get("stock").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price: String =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(StockQuote {
        farmer_id: FarmerId(farmer_id),
        farmer_name,
        stock: stock_from_column(stock)?,
        price: price_from_column(&price)?,
    })
}

/// Conditional decrement on an open connection or transaction. The `stock >= ?` guard
/// makes the update a no-op when stock is short, so a concurrent writer can never push
/// the row negative.
pub(crate) async fn decrement_in(
    conn: &mut SqliteConnection,
    farmer_id: FarmerId,
    product_id: ProductId,
    quantity: u32,
) -> Result<DecrementOutcome, RepositoryError> {
    let remaining: Option<i64> = sqlx::query_scalar(
        "UPDATE farmer_products SET stock = stock - ?1
         WHERE farmer_id = ?2 AND product_id = ?3 AND stock >= ?1
         RETURNING stock",
    )
    .bind(i64::from(quantity))
    .bind(farmer_id.0)
    .bind(product_id.0)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(remaining) = remaining {
        return Ok(DecrementOutcome::Applied { remaining: stock_from_column(remaining)? });
    }

    let available: Option<i64> = sqlx::query_scalar(
        "SELECT stock FROM farmer_products WHERE farmer_id = ?1 AND product_id = ?2",
    )
    .bind(farmer_id.0)
    .bind(product_id.0)
    .fetch_optional(&mut *conn)
    .await?;

    match available {
        None => {
            log_missing_entry(farmer_id, product_id, quantity);
            Ok(DecrementOutcome::Missing)
        }
        Some(available) => Err(RepositoryError::InsufficientStock {
            farmer_id,
            product_id,
            requested: quantity,
            available: stock_from_column(available)?,
        }),
    }
}

#[async_trait::async_trait]
impl InventoryLedger for SqlInventoryLedger {
    async fn entries_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<InventoryEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT farmer_id, product_id, stock, price
             FROM farmer_products
             WHERE product_id = ?
             ORDER BY farmer_id",
        )
        .bind(product_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn check_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Vec<StockQuote>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT fp.farmer_id, f.name AS farmer_name, fp.stock, fp.price
             FROM farmer_products fp
             JOIN farmers f ON f.id = fp.farmer_id
             WHERE fp.product_id = ? AND fp.stock >= ?
             ORDER BY fp.farmer_id",
        )
        .bind(product_id.0)
        .bind(i64::from(quantity))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_quote).collect()
    }

    async fn decrement(
        &self,
        farmer_id: FarmerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<DecrementOutcome, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        decrement_in(&mut conn, farmer_id, product_id, quantity).await
    }
}
