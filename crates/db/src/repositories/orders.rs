use sqlx::Row;

use fellah_core::domain::client::ClientId;
use fellah_core::domain::farmer::FarmerId;
use fellah_core::domain::order::{Order, OrderId, OrderRequest, OrderStatus};
use fellah_core::domain::product::ProductId;
use fellah_core::errors::DomainError;

use super::ledger::{decrement_in, stock_from_column};
use super::{validate_request, OrderStore, RepositoryError};
use crate::DbPool;

pub struct SqlOrderStore {
    pool: DbPool,
}

impl SqlOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const ORDER_COLUMNS: &str = "id, client_id, product_id, farmer_id, quantity, status, delivery_time";

fn row_to_order(row: &sqlx::sqlite::SqliteRow) -> Result<Order, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let client_id: i64 =
        row.try_get("client_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_id: i64 =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let farmer_id: i64 =
        row.try_get("farmer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let delivery_time: String =
        row.try_get("delivery_time").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Order {
        id: OrderId(id),
        client_id: ClientId(client_id),
        product_id: ProductId(product_id),
        farmer_id: FarmerId(farmer_id),
        quantity: stock_from_column(quantity)?,
        status: status.parse().map_err(|e: DomainError| RepositoryError::Decode(e.to_string()))?,
        delivery: delivery_time
            .parse()
            .map_err(|e: DomainError| RepositoryError::Decode(e.to_string()))?,
    })
}

#[async_trait::async_trait]
impl OrderStore for SqlOrderStore {
    async fn append(&self, request: OrderRequest) -> Result<Vec<Order>, RepositoryError> {
        let farmer_id = validate_request(&request)?;

        // Dropping the transaction on an early return rolls every decrement back.
        let mut tx = self.pool.begin().await?;

        for line in &request.lines {
            decrement_in(&mut tx, farmer_id, line.product_id, line.quantity).await?;
        }

        let max_existing: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) FROM orders")
            .fetch_one(&mut *tx)
            .await?;
        let max_existing = (max_existing > 0).then_some(OrderId(max_existing));

        let mut created = Vec::with_capacity(request.lines.len());
        let mut next_id = OrderId::next_after(max_existing);
        for line in &request.lines {
            let order = Order {
                id: next_id,
                client_id: request.client_id,
                product_id: line.product_id,
                farmer_id,
                quantity: line.quantity,
                status: OrderStatus::Pending,
                delivery: request.delivery,
            };

            sqlx::query(
                "INSERT INTO orders (id, client_id, product_id, farmer_id, quantity, status, delivery_time)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(order.id.0)
            .bind(order.client_id.0)
            .bind(order.product_id.0)
            .bind(order.farmer_id.0)
            .bind(i64::from(order.quantity))
            .bind(order.status.as_str())
            .bind(order.delivery.token())
            .execute(&mut *tx)
            .await?;

            next_id = OrderId::next_after(Some(next_id));
            created.push(order);
        }

        tx.commit().await?;

        let first = created.first().map(|order| order.id.0).unwrap_or_default();
        let last = created.last().map(|order| order.id.0).unwrap_or_default();
        let found: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM orders WHERE id BETWEEN ?1 AND ?2")
                .bind(first)
                .bind(last)
                .fetch_one(&self.pool)
                .await?;
        let found = usize::try_from(found).unwrap_or_default();
        if found != created.len() {
            return Err(RepositoryError::VerificationFailed { expected: created.len(), found });
        }

        tracing::info!(
            event_name = "persistence.orders.appended",
            client_id = request.client_id.0,
            farmer_id = farmer_id.0,
            first_order_id = first,
            order_count = created.len(),
            "orders persisted"
        );

        Ok(created)
    }

    async fn find(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
            .bind(order_id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_order(r)?)),
            None => Ok(None),
        }
    }

    async fn latest_pending_for_client(
        &self,
        client_id: ClientId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE client_id = ? AND status = ?
             ORDER BY id DESC
             LIMIT 1"
        ))
        .bind(client_id.0)
        .bind(OrderStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_order(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_client(&self, client_id: ClientId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE client_id = ? ORDER BY id"
        ))
        .bind(client_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_order).collect()
    }
}
