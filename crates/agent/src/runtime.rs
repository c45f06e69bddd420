use std::sync::Arc;

use serde::{Deserialize, Serialize};

use fellah_core::domain::client::ClientId;
use fellah_core::domain::order::{
    ClientContact, FarmerContact, Order, OrderId, OrderStatus, OrderedProduct, PendingOrderView,
};
use fellah_core::domain::product::ProductId;
use fellah_core::errors::{ApplicationError, DomainError};
use fellah_core::flows::ConversationState;
use fellah_core::language::Language;
use fellah_core::notice::DarijaNotice;
use fellah_core::reference::ReferenceData;
use fellah_db::repositories::{InventoryLedger, OrderStore};

use crate::conversation::ConversationEngine;
use crate::llm::{PhraseRequest, Phraser};
use crate::session::{SessionStore, Speaker};

const UNKNOWN: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: ProductId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemView {
    pub id: ProductId,
    pub name: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub state: ConversationState,
    pub language: Language,
    /// Products named in this message, in the session language.
    pub detected_products: Vec<ProductRef>,
    pub current_product: Option<ProductRef>,
    pub line_items: Vec<LineItemView>,
    pub created_orders: Vec<OrderId>,
}

/// Entry point for the outer surfaces. One call is one client turn: the client's session
/// lock is held from state transition through phrasing, so messages from the same client
/// are handled strictly in order.
pub struct AgentRuntime {
    engine: ConversationEngine,
    orders: Arc<dyn OrderStore>,
    sessions: Arc<dyn SessionStore>,
    phraser: Arc<dyn Phraser>,
}

impl AgentRuntime {
    pub fn new(
        reference: Arc<ReferenceData>,
        ledger: Arc<dyn InventoryLedger>,
        orders: Arc<dyn OrderStore>,
        sessions: Arc<dyn SessionStore>,
        phraser: Arc<dyn Phraser>,
    ) -> Self {
        let engine = ConversationEngine::new(reference, ledger, Arc::clone(&orders));
        Self { engine, orders, sessions, phraser }
    }

    pub fn reference(&self) -> &ReferenceData {
        self.engine.reference()
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub async fn process_message(
        &self,
        client_id: ClientId,
        text: &str,
        language_hint: Language,
    ) -> Result<ChatReply, ApplicationError> {
        if text.trim().is_empty() {
            return Err(DomainError::InvariantViolation("message text is empty".to_string()).into());
        }

        let handle = self.sessions.get_or_create(client_id, language_hint).await;
        let mut session = handle.lock().await;

        let transcript = session.transcript().cloned().collect::<Vec<_>>();
        let outcome = self.engine.advance(&mut session, text).await?;
        let language = session.language;

        let request = PhraseRequest {
            language,
            transcript,
            user_text: text.to_string(),
            status: outcome.status.clone(),
        };
        let reply = match self.phraser.phrase(&request).await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(
                    event_name = "agent.phraser.fallback",
                    client_id = client_id.0,
                    error = %error,
                    "phraser failed; replying with status text"
                );
                outcome.status.clone()
            }
        };

        session.record_turn(Speaker::Client, text);
        session.record_turn(Speaker::Assistant, reply.clone());

        let catalog = &self.engine.reference().catalog;
        let detected_products = catalog
            .detect(text, language)
            .into_iter()
            .map(|found| ProductRef { id: found.product.id, name: found.display_name })
            .collect();
        let current_product = session.current_product.as_ref().map(|product| ProductRef {
            id: product.id,
            name: catalog.display_name(product.id, language).unwrap_or_else(|| product.name.clone()),
        });
        let line_items = session
            .line_items
            .iter()
            .map(|item| LineItemView {
                id: item.product_id(),
                name: item.display_name(language),
                quantity: item.quantity,
            })
            .collect();

        Ok(ChatReply {
            reply,
            state: outcome.to,
            language,
            detected_products,
            current_product,
            line_items,
            created_orders: outcome.created_orders,
        })
    }

    /// The client's most recent confirmation: every pending order written by the same
    /// append (consecutive ids, same farmer and delivery window), joined with names.
    pub async fn latest_pending_order(
        &self,
        client_id: ClientId,
    ) -> Result<Option<PendingOrderView>, ApplicationError> {
        let mut orders = self.orders.list_for_client(client_id).await?;
        orders.retain(|order| order.status == OrderStatus::Pending);
        orders.sort_by_key(|order| std::cmp::Reverse(order.id));

        let Some(latest) = orders.first().cloned() else {
            return Ok(None);
        };
        let batch = confirmation_batch(&orders, &latest);

        let reference = self.engine.reference();
        let client = reference.client(client_id);
        let farmer = reference.farmer(latest.farmer_id);
        let products = batch
            .iter()
            .rev()
            .map(|order| {
                let product = reference.catalog.find(order.product_id);
                OrderedProduct {
                    id: order.product_id,
                    name: product.map_or_else(|| UNKNOWN.to_string(), |p| p.name.clone()),
                    arabic_name: product.map(|p| p.arabic_name.clone()).unwrap_or_default(),
                    quantity: order.quantity,
                }
            })
            .collect();

        Ok(Some(PendingOrderView {
            order_id: latest.id,
            client: ClientContact {
                id: client_id,
                name: client.map_or_else(|| UNKNOWN.to_string(), |c| c.name.clone()),
                phone: client.map_or_else(|| UNKNOWN.to_string(), |c| c.phone.clone()),
            },
            farmer: FarmerContact {
                id: latest.farmer_id,
                name: farmer.map_or_else(|| UNKNOWN.to_string(), |f| f.name.clone()),
            },
            products,
            delivery_time: latest.delivery.token().to_string(),
        }))
    }

    pub async fn darija_notice(
        &self,
        client_id: ClientId,
    ) -> Result<Option<DarijaNotice>, ApplicationError> {
        Ok(self.latest_pending_order(client_id).await?.as_ref().map(DarijaNotice::render))
    }
}

/// `orders` sorted newest first; walks back from `latest` while ids stay consecutive.
fn confirmation_batch<'a>(orders: &'a [Order], latest: &Order) -> Vec<&'a Order> {
    let mut batch = Vec::new();
    let mut expected = latest.id.0;
    for order in orders {
        if order.id.0 != expected
            || order.farmer_id != latest.farmer_id
            || order.delivery != latest.delivery
        {
            break;
        }
        batch.push(order);
        expected -= 1;
    }
    batch
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use fellah_core::domain::client::ClientId;
    use fellah_core::domain::farmer::FarmerId;
    use fellah_core::domain::order::{DeliveryWindow, OrderId, OrderLine, OrderRequest};
    use fellah_core::domain::product::ProductId;
    use fellah_core::errors::ApplicationError;
    use fellah_core::flows::ConversationState;
    use fellah_core::language::Language;
    use fellah_core::reference::ReferenceData;
    use fellah_db::repositories::{InMemoryMarketStore, OrderStore};
    use fellah_db::DemoDataset;

    use super::AgentRuntime;
    use crate::llm::{PhraseRequest, Phraser, PhraserError, TemplatePhraser};
    use crate::session::{InMemorySessionStore, SessionStore};

    struct UnreachablePhraser;

    #[async_trait]
    impl Phraser for UnreachablePhraser {
        async fn phrase(&self, _request: &PhraseRequest) -> Result<String, PhraserError> {
            Err(PhraserError::Transport("connection refused".to_string()))
        }
    }

    fn runtime_with(phraser: Arc<dyn Phraser>) -> (AgentRuntime, Arc<InMemoryMarketStore>) {
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
            phraser,
        );
        (runtime, store)
    }

    #[tokio::test]
    async fn phraser_failure_falls_back_to_status() {
        let (runtime, _) = runtime_with(Arc::new(UnreachablePhraser));

        let reply = runtime
            .process_message(ClientId(1), "bonjour", Language::French)
            .await
            .expect("reply");

        assert_eq!(reply.reply, "Quel produit souhaitez-vous commander ?");
        assert_eq!(reply.state, ConversationState::ProductSelection);
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (runtime, _) = runtime_with(Arc::new(TemplatePhraser));

        let result = runtime.process_message(ClientId(1), "   ", Language::French).await;

        assert!(matches!(result, Err(ApplicationError::Domain(_))));
        assert_eq!(runtime.sessions().len().await, 0);
    }

    #[tokio::test]
    async fn transcript_records_both_sides() {
        let (runtime, _) = runtime_with(Arc::new(TemplatePhraser));

        runtime.process_message(ClientId(2), "hello", Language::English).await.expect("reply");
        runtime.process_message(ClientId(2), "onion 2", Language::English).await.expect("reply");

        let handle = runtime.sessions().get(ClientId(2)).await.expect("session exists");
        let session = handle.lock().await;
        assert_eq!(session.transcript_len(), 4);
        assert_eq!(session.state, ConversationState::QuantitySelection);
    }

    #[tokio::test]
    async fn reply_reports_current_product_and_items() {
        let (runtime, _) = runtime_with(Arc::new(TemplatePhraser));

        let reply = runtime
            .process_message(ClientId(1), "je veux 2 kg de tomate", Language::French)
            .await
            .expect("reply");
        assert_eq!(reply.detected_products.len(), 1);
        assert_eq!(reply.detected_products[0].name, "Tomate");
        assert_eq!(reply.current_product.as_ref().map(|p| p.id), Some(ProductId(1)));

        let reply =
            runtime.process_message(ClientId(1), "2", Language::French).await.expect("reply");
        assert_eq!(reply.line_items.len(), 1);
        assert_eq!(reply.line_items[0].quantity, 2);
        assert_eq!(reply.line_items[0].name, "Tomate");
    }

    #[tokio::test]
    async fn latest_pending_groups_one_confirmation() {
        let (runtime, store) = runtime_with(Arc::new(TemplatePhraser));
        assert!(runtime.latest_pending_order(ClientId(1)).await.expect("lookup").is_none());

        let request = |lines: Vec<(i64, u32)>, farmer: i64| OrderRequest {
            client_id: ClientId(1),
            lines: lines
                .into_iter()
                .map(|(product_id, quantity)| OrderLine { product_id: ProductId(product_id), quantity })
                .collect(),
            farmer_id: Some(FarmerId(farmer)),
            delivery: DeliveryWindow::default(),
        };
        store.append(request(vec![(2, 5)], 2)).await.expect("first confirmation");
        store.append(request(vec![(1, 3), (3, 2)], 1)).await.expect("second confirmation");

        let view = runtime
            .latest_pending_order(ClientId(1))
            .await
            .expect("lookup")
            .expect("pending order");

        assert_eq!(view.order_id, OrderId(3));
        assert_eq!(view.farmer.name, "Hassan");
        assert_eq!(view.client.phone, "0612345678");
        let products =
            view.products.iter().map(|p| (p.id.0, p.quantity)).collect::<Vec<_>>();
        assert_eq!(products, vec![(1, 3), (3, 2)]);
        assert_eq!(view.delivery_time, "tomorrow_evening");

        let notice = runtime.darija_notice(ClientId(1)).await.expect("notice").expect("notice");
        assert!(notice.text.contains("3 كيلو ديال طماطم"));
        assert!(notice.text.contains("غدا في العشية"));
    }
}
