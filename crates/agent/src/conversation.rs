use std::sync::Arc;

use fellah_core::catalog::localized_name;
use fellah_core::domain::order::{OrderId, OrderLine, OrderRequest};
use fellah_core::flows::ConversationState;
use fellah_core::language::{
    detect_language, extract_quantity, is_affirmative, is_cancellation, parse_delivery_window,
    parse_selection_index, Language,
};
use fellah_core::ranking::rank_farmers;
use fellah_core::reference::ReferenceData;
use fellah_db::repositories::{InventoryLedger, OrderStore, RepositoryError};

use crate::messages;
use crate::session::{LineItem, Session};

/// Result of feeding one client message through the state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub from: ConversationState,
    pub to: ConversationState,
    /// Localized facts for this turn, including the order-so-far suffix.
    pub status: String,
    pub created_orders: Vec<OrderId>,
}

/// Deterministic order-taking machine. Every business decision (which product, whether
/// stock covers it, which farmers rank, whether the order persisted) is made here; the
/// phraser only rewords `TurnOutcome::status`.
pub struct ConversationEngine {
    reference: Arc<ReferenceData>,
    ledger: Arc<dyn InventoryLedger>,
    orders: Arc<dyn OrderStore>,
}

impl ConversationEngine {
    pub fn new(
        reference: Arc<ReferenceData>,
        ledger: Arc<dyn InventoryLedger>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        Self { reference, ledger, orders }
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    /// Advances `session` by one client message. Ledger read failures propagate and leave
    /// the session where it was; a failed order append is reported in the status instead.
    pub async fn advance(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<TurnOutcome, RepositoryError> {
        let from = session.state;
        let detected = detect_language(text);
        if detected != Language::English {
            session.language = detected;
        }

        let mut created_orders = Vec::new();
        let mut status = if from != ConversationState::Greeting && is_cancellation(text) {
            session.reset();
            tracing::info!(
                event_name = "agent.conversation.cancelled",
                client_id = session.client_id.0,
                from = %from,
                "conversation cancelled by client"
            );
            messages::order_cancelled(session.language)
        } else {
            match from {
                ConversationState::Greeting => self.on_greeting(session, text).await?,
                ConversationState::ProductSelection => self.quote(session, text).await?,
                ConversationState::QuantitySelection => {
                    self.on_quantity_selection(session, text).await?
                }
                ConversationState::MoreProducts => on_more_products(session, text),
                ConversationState::DeliveryTime => self.on_delivery_time(session, text).await?,
                ConversationState::FarmerSelection => on_farmer_selection(session, text),
                ConversationState::OrderConfirmation => {
                    self.on_order_confirmation(session, text, &mut created_orders).await
                }
            }
        };

        if !session.line_items.is_empty() {
            status.push_str(&messages::ordered_so_far(session.language, &session.line_items));
        }

        tracing::info!(
            event_name = "agent.conversation.transition",
            client_id = session.client_id.0,
            from = %from,
            to = %session.state,
            language = session.language.as_str(),
            line_items = session.line_items.len(),
            "conversation advanced"
        );

        Ok(TurnOutcome { from, to: session.state, status, created_orders })
    }

    async fn on_greeting(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<String, RepositoryError> {
        if self.reference.catalog.detect(text, session.language).is_empty() {
            session.state = ConversationState::ProductSelection;
            return Ok(messages::ask_for_product(session.language));
        }
        self.quote(session, text).await
    }

    /// Resolves the product, checks stock for the requested quantity and ranks farmers
    /// for the client. Only a quoted product moves the session to quantity selection.
    async fn quote(&self, session: &mut Session, text: &str) -> Result<String, RepositoryError> {
        let language = session.language;
        let Some(found) = self.reference.catalog.resolve(text, language) else {
            session.current_product = None;
            session.state = ConversationState::ProductSelection;
            return Ok(messages::product_not_found(language));
        };

        let quantity = extract_quantity(text);
        let product_id = found.product.id;
        let quotes = self.ledger.check_stock(product_id, quantity).await?;
        if quotes.is_empty() {
            session.current_product = None;
            session.state = ConversationState::ProductSelection;
            return Ok(messages::out_of_stock(language, &found.display_name, quantity));
        }

        let entries = self.ledger.entries_for_product(product_id).await?;
        let ranked =
            rank_farmers(&self.reference, &entries, product_id, quantity, session.client_id);
        if ranked.is_empty() {
            session.current_product = None;
            session.state = ConversationState::ProductSelection;
            return Ok(messages::no_nearby_farmer(language, &found.display_name, quantity));
        }

        let status = messages::quote(language, &found.display_name, quantity, &ranked);
        session.current_product = Some(found.product);
        session.state = ConversationState::QuantitySelection;
        Ok(status)
    }

    async fn on_quantity_selection(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<String, RepositoryError> {
        let language = session.language;
        let Some(product) = session.current_product.clone() else {
            session.state = ConversationState::ProductSelection;
            return Ok(messages::ask_for_product(language));
        };

        let quantity = extract_quantity(text);
        let name = localized_name(&product, language);
        let candidates = self.ledger.check_stock(product.id, quantity).await?;
        if candidates.is_empty() {
            return Ok(messages::quantity_unavailable(language, &name));
        }

        let status = messages::quantity_added(language, &name, quantity);
        session.line_items.push(LineItem {
            product,
            quantity,
            candidates,
        });
        session.state = ConversationState::MoreProducts;
        Ok(status)
    }

    async fn on_delivery_time(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<String, RepositoryError> {
        let language = session.language;
        let Some((product_id, quantity)) =
            session.line_items.first().map(|item| (item.product_id(), item.quantity))
        else {
            session.state = ConversationState::ProductSelection;
            return Ok(messages::ask_for_product(language));
        };

        let entries = self.ledger.entries_for_product(product_id).await?;
        let ranked =
            rank_farmers(&self.reference, &entries, product_id, quantity, session.client_id);

        session.delivery = Some(parse_delivery_window(text));
        let status = messages::choose_farmer(language, &ranked);
        session.farmer_options = ranked;
        session.selected_farmer = None;
        session.state = ConversationState::FarmerSelection;
        Ok(status)
    }

    async fn on_order_confirmation(
        &self,
        session: &mut Session,
        text: &str,
        created_orders: &mut Vec<OrderId>,
    ) -> String {
        let language = session.language;
        if !is_affirmative(text) {
            session.reset();
            return messages::order_cancelled(language);
        }

        let request = OrderRequest {
            client_id: session.client_id,
            lines: session
                .line_items
                .iter()
                .map(|item| OrderLine { product_id: item.product_id(), quantity: item.quantity })
                .collect(),
            farmer_id: session.selected_farmer.as_ref().map(|farmer| farmer.farmer_id),
            delivery: session.delivery.unwrap_or_default(),
        };

        match self.orders.append(request).await {
            Ok(orders) => {
                created_orders.extend(orders.iter().map(|order| order.id));
                tracing::info!(
                    event_name = "agent.order.confirmed",
                    client_id = session.client_id.0,
                    order_count = orders.len(),
                    "order confirmed"
                );
                session.reset();
                messages::order_confirmed(language)
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "agent.order.persist_failed",
                    client_id = session.client_id.0,
                    error = %error,
                    "order could not be saved; staying in confirmation"
                );
                messages::order_failed(language)
            }
        }
    }
}

fn on_more_products(session: &mut Session, text: &str) -> String {
    if is_affirmative(text) {
        session.current_product = None;
        session.state = ConversationState::ProductSelection;
        return messages::ask_for_another_product(session.language);
    }
    session.state = ConversationState::DeliveryTime;
    messages::ask_for_delivery(session.language)
}

fn on_farmer_selection(session: &mut Session, text: &str) -> String {
    let language = session.language;
    let selected = parse_selection_index(text, session.farmer_options.len())
        .ok()
        .and_then(|index| session.farmer_options.get(index).cloned());

    let Some(farmer) = selected else {
        tracing::debug!(
            event_name = "agent.conversation.invalid_selection",
            client_id = session.client_id.0,
            options = session.farmer_options.len(),
            "farmer selection not understood"
        );
        return messages::invalid_selection(language);
    };

    let status = messages::order_summary(
        language,
        &session.line_items,
        &farmer.name,
        session.delivery.unwrap_or_default(),
    );
    session.selected_farmer = Some(farmer);
    session.state = ConversationState::OrderConfirmation;
    status
}
