use std::sync::Arc;

use fellah_core::domain::client::ClientId;
use fellah_core::domain::farmer::FarmerId;
use fellah_core::domain::order::{DeliveryWindow, OrderId, OrderLine, OrderRequest};
use fellah_core::domain::product::ProductId;
use fellah_core::ranking::rank_farmers;
use fellah_db::repositories::{
    InventoryLedger, OrderStore, ReferenceRepository, RepositoryError, SqlInventoryLedger,
    SqlOrderStore, SqlReferenceRepository,
};
use fellah_db::{connect_with_settings, migrations, DbPool, DemoDataset};
use tempfile::TempDir;

type TestResult = Result<(), String>;

async fn on_disk_pool(dir: &TempDir) -> Result<DbPool, String> {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("fellah.db").display());
    let pool = connect_with_settings(&url, 4, 30).await.map_err(|e| e.to_string())?;
    migrations::run_pending(&pool).await.map_err(|e| e.to_string())?;
    DemoDataset::load(&pool).await.map_err(|e| e.to_string())?;
    Ok(pool)
}

fn dates_order(farmer_id: i64, quantity: u32) -> OrderRequest {
    OrderRequest {
        client_id: ClientId(1),
        lines: vec![OrderLine { product_id: ProductId(3), quantity }],
        farmer_id: Some(FarmerId(farmer_id)),
        delivery: DeliveryWindow::default(),
    }
}

#[tokio::test]
async fn ranking_over_persisted_ledger_prefers_nearest_farmer() -> TestResult {
    let dir = TempDir::new().map_err(|e| e.to_string())?;
    let pool = on_disk_pool(&dir).await?;

    let reference = SqlReferenceRepository::new(pool.clone())
        .load_reference_data()
        .await
        .map_err(|e| e.to_string())?;
    let entries = SqlInventoryLedger::new(pool)
        .entries_for_product(ProductId(3))
        .await
        .map_err(|e| e.to_string())?;

    let ranked = rank_farmers(&reference, &entries, ProductId(3), 3, ClientId(1));
    let ids = ranked.iter().map(|farmer| farmer.farmer_id.0).collect::<Vec<_>>();
    if ids != vec![1, 2, 3] {
        return Err(format!("unexpected ranking for dates: {ids:?}"));
    }

    let ranked = rank_farmers(&reference, &entries, ProductId(3), 30, ClientId(1));
    if ranked.iter().any(|farmer| farmer.stock < 30) {
        return Err("ranking surfaced a farmer without enough stock".to_string());
    }
    Ok(())
}

#[tokio::test]
async fn sequential_confirmations_stop_at_zero_stock() -> TestResult {
    let dir = TempDir::new().map_err(|e| e.to_string())?;
    let pool = on_disk_pool(&dir).await?;
    let store = SqlOrderStore::new(pool.clone());
    let ledger = SqlInventoryLedger::new(pool);

    // Youssef starts with 10 kg of dates.
    store.append(dates_order(3, 6)).await.map_err(|e| e.to_string())?;
    store.append(dates_order(3, 4)).await.map_err(|e| e.to_string())?;

    match store.append(dates_order(3, 1)).await {
        Err(RepositoryError::InsufficientStock { available: 0, .. }) => {}
        other => return Err(format!("expected insufficient stock, got {other:?}")),
    }

    let quotes = ledger.check_stock(ProductId(3), 1).await.map_err(|e| e.to_string())?;
    if quotes.iter().any(|quote| quote.farmer_id == FarmerId(3)) {
        return Err("exhausted farmer should not be quoted".to_string());
    }

    let orders = store.list_for_client(ClientId(1)).await.map_err(|e| e.to_string())?;
    let ids = orders.iter().map(|order| order.id).collect::<Vec<_>>();
    if ids != vec![OrderId(1), OrderId(2)] {
        return Err(format!("unexpected order ids: {ids:?}"));
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_confirmations_never_oversell() -> TestResult {
    let dir = TempDir::new().map_err(|e| e.to_string())?;
    let pool = on_disk_pool(&dir).await?;
    let store = Arc::new(SqlOrderStore::new(pool.clone()));

    // Two 6 kg confirmations race for Youssef's 10 kg of dates.
    let tasks = (0..2)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.append(dates_order(3, 6)).await })
        })
        .collect::<Vec<_>>();

    let mut confirmed = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.map_err(|e| e.to_string())? {
            Ok(orders) if orders.len() == 1 => confirmed += 1,
            Err(RepositoryError::InsufficientStock { available: 4, .. }) => rejected += 1,
            other => return Err(format!("unexpected append outcome: {other:?}")),
        }
    }
    if (confirmed, rejected) != (1, 1) {
        return Err(format!(
            "expected one confirmation and one rejection, got {confirmed}/{rejected}"
        ));
    }

    let entries = SqlInventoryLedger::new(pool)
        .entries_for_product(ProductId(3))
        .await
        .map_err(|e| e.to_string())?;
    let remaining =
        entries.iter().find(|entry| entry.farmer_id == FarmerId(3)).map(|entry| entry.stock);
    if remaining != Some(4) {
        return Err(format!("expected 4 kg left, found {remaining:?}"));
    }

    let orders = store.list_for_client(ClientId(1)).await.map_err(|e| e.to_string())?;
    if orders.len() != 1 {
        return Err(format!("expected a single persisted order, found {}", orders.len()));
    }
    Ok(())
}

#[tokio::test]
async fn orders_survive_reconnect() -> TestResult {
    let dir = TempDir::new().map_err(|e| e.to_string())?;
    {
        let pool = on_disk_pool(&dir).await?;
        SqlOrderStore::new(pool.clone())
            .append(dates_order(1, 2))
            .await
            .map_err(|e| e.to_string())?;
        pool.close().await;
    }

    let url = format!("sqlite://{}", dir.path().join("fellah.db").display());
    let pool = connect_with_settings(&url, 1, 30).await.map_err(|e| e.to_string())?;
    let latest = SqlOrderStore::new(pool)
        .latest_pending_for_client(ClientId(1))
        .await
        .map_err(|e| e.to_string())?;

    match latest {
        Some(order) if order.quantity == 2 && order.delivery.token() == "tomorrow_evening" => {
            Ok(())
        }
        other => Err(format!("unexpected latest order after reconnect: {other:?}")),
    }
}
