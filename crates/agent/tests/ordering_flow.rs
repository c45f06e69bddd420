use std::sync::Arc;

use fellah_agent::{AgentRuntime, InMemorySessionStore, TemplatePhraser};
use fellah_core::domain::client::ClientId;
use fellah_core::domain::farmer::FarmerId;
use fellah_core::domain::product::ProductId;
use fellah_core::flows::ConversationState;
use fellah_core::language::Language;
use fellah_core::reference::ReferenceData;
use fellah_db::repositories::InMemoryMarketStore;
use fellah_db::DemoDataset;

type TestResult = Result<(), String>;

fn runtime() -> (Arc<AgentRuntime>, Arc<InMemoryMarketStore>) {
    let store = Arc::new(DemoDataset::in_memory());
    let reference = Arc::new(ReferenceData::new(
        DemoDataset::products(),
        DemoDataset::farmers(),
        DemoDataset::clients(),
    ));
    let runtime = AgentRuntime::new(
        reference,
        store.clone(),
        store.clone(),
        Arc::new(InMemorySessionStore::default()),
        Arc::new(TemplatePhraser),
    );
    (Arc::new(runtime), store)
}

async fn say(
    runtime: &AgentRuntime,
    client_id: i64,
    text: &str,
    expected: ConversationState,
) -> Result<String, String> {
    let reply = runtime
        .process_message(ClientId(client_id), text, Language::French)
        .await
        .map_err(|e| e.to_string())?;
    if reply.state != expected {
        return Err(format!(
            "client {client_id} sent `{text}`: expected {expected}, got {} ({})",
            reply.state, reply.reply
        ));
    }
    Ok(reply.reply)
}

#[tokio::test]
async fn client_one_orders_dates_from_the_nearest_farmer() -> TestResult {
    let (runtime, store) = runtime();

    say(&runtime, 1, "bonjour", ConversationState::ProductSelection).await?;
    let quote = say(&runtime, 1, "تمر 3", ConversationState::QuantitySelection).await?;
    if !quote.starts_with("إليك المزارعين المتاحين لـ 3 كجم من تمر") {
        return Err(format!("unexpected quote: {quote}"));
    }

    say(&runtime, 1, "3", ConversationState::MoreProducts).await?;
    say(&runtime, 1, "لا", ConversationState::DeliveryTime).await?;
    say(&runtime, 1, "غدا صباحا", ConversationState::FarmerSelection).await?;
    let summary = say(&runtime, 1, "1", ConversationState::OrderConfirmation).await?;
    if !summary.contains("المزارع: Hassan") || !summary.contains("tomorrow morning") {
        return Err(format!("unexpected summary: {summary}"));
    }

    let confirmed = say(&runtime, 1, "نعم", ConversationState::Greeting).await?;
    if !confirmed.starts_with("تم تأكيد الطلب بنجاح") {
        return Err(format!("unexpected confirmation: {confirmed}"));
    }

    if store.stock_of(FarmerId(1), ProductId(3)).await != Some(37) {
        return Err("Hassan's dates were not decremented by 3".to_string());
    }

    let view = runtime
        .latest_pending_order(ClientId(1))
        .await
        .map_err(|e| e.to_string())?
        .ok_or("confirmed order is not pending")?;
    if view.delivery_time != "tomorrow_morning" || view.products.len() != 1 {
        return Err(format!("unexpected pending order: {view:?}"));
    }

    // The language sticks across the reset.
    let handle = runtime.sessions().get(ClientId(1)).await.ok_or("session was dropped")?;
    let session = handle.lock().await;
    if session.language != Language::Arabic || !session.line_items.is_empty() {
        return Err("session was not reset to an empty Arabic greeting".to_string());
    }
    Ok(())
}

#[tokio::test]
async fn ordered_products_follow_a_language_switch() -> TestResult {
    let (runtime, _store) = runtime();

    say(&runtime, 1, "bonjour", ConversationState::ProductSelection).await?;
    say(&runtime, 1, "dattes 3", ConversationState::QuantitySelection).await?;
    let added = say(&runtime, 1, "3", ConversationState::MoreProducts).await?;
    if !added.ends_with("Produits commandés: Dattes: 3kg") {
        return Err(format!("unexpected French suffix: {added}"));
    }

    let switched = say(&runtime, 1, "لا", ConversationState::DeliveryTime).await?;
    if !switched.ends_with("المنتجات المطلوبة: تمر: 3kg") {
        return Err(format!("suffix kept the old language: {switched}"));
    }
    Ok(())
}

#[tokio::test]
async fn declining_the_summary_writes_nothing() -> TestResult {
    let (runtime, store) = runtime();

    say(&runtime, 1, "bonjour", ConversationState::ProductSelection).await?;
    say(&runtime, 1, "تمر 3", ConversationState::QuantitySelection).await?;
    say(&runtime, 1, "3", ConversationState::MoreProducts).await?;
    say(&runtime, 1, "non", ConversationState::DeliveryTime).await?;
    say(&runtime, 1, "demain soir", ConversationState::FarmerSelection).await?;
    say(&runtime, 1, "2", ConversationState::OrderConfirmation).await?;
    say(&runtime, 1, "non", ConversationState::Greeting).await?;

    if store.order_count().await != 0 {
        return Err("declined confirmation wrote an order".to_string());
    }
    if store.stock_of(FarmerId(2), ProductId(3)).await != Some(25) {
        return Err("declined confirmation touched stock".to_string());
    }
    Ok(())
}

#[tokio::test]
async fn concurrent_confirmations_never_oversell() -> TestResult {
    let (runtime, store) = runtime();

    // Youssef holds 10 kg of dates and ranks third for both clients.
    for client_id in [1, 2] {
        say(&runtime, client_id, "dattes 6", ConversationState::QuantitySelection).await?;
        say(&runtime, client_id, "6", ConversationState::MoreProducts).await?;
        say(&runtime, client_id, "non", ConversationState::DeliveryTime).await?;
        say(&runtime, client_id, "demain matin", ConversationState::FarmerSelection).await?;
        let summary =
            say(&runtime, client_id, "3", ConversationState::OrderConfirmation).await?;
        if !summary.contains("Youssef") {
            return Err(format!("client {client_id} did not select Youssef: {summary}"));
        }
    }

    let mut handles = Vec::new();
    for client_id in [1, 2] {
        let runtime = Arc::clone(&runtime);
        handles.push(tokio::spawn(async move {
            runtime.process_message(ClientId(client_id), "oui", Language::French).await
        }));
    }

    let mut confirmed = 0;
    let mut failed = 0;
    for handle in handles {
        let reply = handle.await.map_err(|e| e.to_string())?.map_err(|e| e.to_string())?;
        match reply.state {
            ConversationState::Greeting if reply.created_orders.len() == 1 => confirmed += 1,
            ConversationState::OrderConfirmation => failed += 1,
            other => return Err(format!("unexpected state after confirmation: {other}")),
        }
    }

    if (confirmed, failed) != (1, 1) {
        return Err(format!("expected one success and one failure, got {confirmed}/{failed}"));
    }
    if store.stock_of(FarmerId(3), ProductId(3)).await != Some(4) {
        return Err("Youssef's stock should be 4 kg after one 6 kg order".to_string());
    }
    Ok(())
}
