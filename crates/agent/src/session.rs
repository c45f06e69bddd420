use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use fellah_core::catalog::localized_name;
use fellah_core::config::{AppConfig, SessionConfig};
use fellah_core::domain::client::ClientId;
use fellah_core::domain::inventory::StockQuote;
use fellah_core::domain::order::DeliveryWindow;
use fellah_core::domain::product::{Product, ProductId};
use fellah_core::flows::ConversationState;
use fellah_core::language::Language;
use fellah_core::ranking::RankedFarmer;

/// One product and quantity accepted into the order being built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product: Product,
    pub quantity: u32,
    /// Farmers that could cover the quantity when the line was added.
    pub candidates: Vec<StockQuote>,
}

impl LineItem {
    pub fn product_id(&self) -> ProductId {
        self.product.id
    }

    /// Product name in `language`, resolved each time so a language switch carries over.
    pub fn display_name(&self, language: Language) -> String {
        localized_name(&self.product, language)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Client,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct Session {
    pub client_id: ClientId,
    pub language: Language,
    pub state: ConversationState,
    pub current_product: Option<Product>,
    pub line_items: Vec<LineItem>,
    pub delivery: Option<DeliveryWindow>,
    pub farmer_options: Vec<RankedFarmer>,
    pub selected_farmer: Option<RankedFarmer>,
    transcript: VecDeque<Turn>,
    max_transcript_turns: usize,
}

impl Session {
    pub fn new(client_id: ClientId, language: Language, max_transcript_turns: usize) -> Self {
        Self {
            client_id,
            language,
            state: ConversationState::Greeting,
            current_product: None,
            line_items: Vec::new(),
            delivery: None,
            farmer_options: Vec::new(),
            selected_farmer: None,
            transcript: VecDeque::new(),
            max_transcript_turns: max_transcript_turns.max(1),
        }
    }

    /// Back to `Greeting` with an empty order and transcript. The language survives.
    pub fn reset(&mut self) {
        self.state = ConversationState::Greeting;
        self.current_product = None;
        self.line_items.clear();
        self.delivery = None;
        self.farmer_options.clear();
        self.selected_farmer = None;
        self.transcript.clear();
    }

    pub fn record_turn(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push_back(Turn { speaker, text: text.into() });
        while self.transcript.len() > self.max_transcript_turns {
            self.transcript.pop_front();
        }
    }

    pub fn transcript(&self) -> impl Iterator<Item = &Turn> {
        self.transcript.iter()
    }

    pub fn transcript_len(&self) -> usize {
        self.transcript.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionPolicy {
    pub idle_ttl: Duration,
    pub max_sessions: usize,
    pub max_transcript_turns: usize,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&AppConfig::default().session)
    }
}

impl From<&SessionConfig> for SessionPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            idle_ttl: Duration::from_secs(config.idle_ttl_secs),
            max_sessions: config.max_sessions,
            max_transcript_turns: config.max_transcript_turns,
        }
    }
}

/// A session shared between concurrent requests for the same client. Holding the lock
/// for a whole turn serializes that client's messages.
pub type SessionHandle = Arc<Mutex<Session>>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Existing session for the client, or a fresh one in `language`.
    async fn get_or_create(&self, client_id: ClientId, language: Language) -> SessionHandle;
    async fn get(&self, client_id: ClientId) -> Option<SessionHandle>;
    /// Returns whether a session existed.
    async fn reset(&self, client_id: ClientId) -> bool;
    async fn delete(&self, client_id: ClientId) -> bool;
    /// Drops sessions idle longer than the policy TTL; returns how many went.
    async fn evict_idle(&self) -> usize;
    async fn len(&self) -> usize;
}

struct SessionSlot {
    handle: SessionHandle,
    last_active: Instant,
    /// Monotonic touch counter; orders capacity eviction even when clock readings tie.
    touched: u64,
}

pub struct InMemorySessionStore {
    policy: SessionPolicy,
    sessions: RwLock<HashMap<ClientId, SessionSlot>>,
    touches: AtomicU64,
}

impl InMemorySessionStore {
    pub fn new(policy: SessionPolicy) -> Self {
        Self { policy, sessions: RwLock::new(HashMap::new()), touches: AtomicU64::new(0) }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Eviction against an explicit clock reading. Sessions whose lock is held by an
    /// in-flight turn are never evicted.
    pub async fn evict_idle_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| {
            let idle = now.saturating_duration_since(slot.last_active);
            idle <= self.policy.idle_ttl || slot.handle.try_lock().is_err()
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(
                event_name = "agent.session.evicted_idle",
                evicted,
                remaining = sessions.len(),
                "evicted idle sessions"
            );
        }
        evicted
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(SessionPolicy::default())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, client_id: ClientId, language: Language) -> SessionHandle {
        let now = Instant::now();
        let touched = self.touches.fetch_add(1, Ordering::Relaxed);
        let mut sessions = self.sessions.write().await;

        if let Some(slot) = sessions.get_mut(&client_id) {
            slot.last_active = now;
            slot.touched = touched;
            return Arc::clone(&slot.handle);
        }

        if sessions.len() >= self.policy.max_sessions {
            // A session mid-turn keeps its slot; the store may overshoot until it finishes.
            let oldest = sessions
                .iter()
                .filter(|(_, slot)| slot.handle.try_lock().is_ok())
                .min_by_key(|(_, slot)| slot.touched)
                .map(|(id, _)| *id);
            match oldest {
                Some(oldest) => {
                    sessions.remove(&oldest);
                    tracing::info!(
                        event_name = "agent.session.evicted_capacity",
                        client_id = oldest.0,
                        max_sessions = self.policy.max_sessions,
                        "session store at capacity; evicted least recently active session"
                    );
                }
                None => tracing::warn!(
                    event_name = "agent.session.capacity_overshoot",
                    sessions = sessions.len(),
                    max_sessions = self.policy.max_sessions,
                    "every session is mid-turn; admitting one over capacity"
                ),
            }
        }

        let handle = Arc::new(Mutex::new(Session::new(
            client_id,
            language,
            self.policy.max_transcript_turns,
        )));
        sessions.insert(
            client_id,
            SessionSlot { handle: Arc::clone(&handle), last_active: now, touched },
        );
        tracing::debug!(
            event_name = "agent.session.created",
            client_id = client_id.0,
            language = language.as_str(),
            "session created"
        );
        handle
    }

    async fn get(&self, client_id: ClientId) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(&client_id).map(|slot| Arc::clone(&slot.handle))
    }

    async fn reset(&self, client_id: ClientId) -> bool {
        let Some(handle) = self.get(client_id).await else {
            return false;
        };
        handle.lock().await.reset();
        true
    }

    async fn delete(&self, client_id: ClientId) -> bool {
        self.sessions.write().await.remove(&client_id).is_some()
    }

    async fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now()).await
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use fellah_core::domain::client::ClientId;
    use fellah_core::flows::ConversationState;
    use fellah_core::language::Language;

    use super::{InMemorySessionStore, Session, SessionPolicy, SessionStore, Speaker};

    fn policy(max_sessions: usize) -> SessionPolicy {
        SessionPolicy {
            idle_ttl: Duration::from_secs(60),
            max_sessions,
            max_transcript_turns: 4,
        }
    }

    #[test]
    fn reset_keeps_language_and_clears_everything_else() {
        let mut session = Session::new(ClientId(1), Language::Arabic, 4);
        session.state = ConversationState::OrderConfirmation;
        session.record_turn(Speaker::Client, "نعم");

        session.reset();

        assert_eq!(session.language, Language::Arabic);
        assert_eq!(session.state, ConversationState::Greeting);
        assert_eq!(session.transcript_len(), 0);
        assert!(session.line_items.is_empty());
    }

    #[test]
    fn transcript_drops_oldest_turns() {
        let mut session = Session::new(ClientId(1), Language::French, 3);
        for index in 0..5 {
            session.record_turn(Speaker::Client, format!("message {index}"));
        }

        let texts = session.transcript().map(|turn| turn.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["message 2", "message 3", "message 4"]);
    }

    #[tokio::test]
    async fn get_or_create_returns_the_same_session() {
        let store = InMemorySessionStore::new(policy(10));

        let first = store.get_or_create(ClientId(1), Language::French).await;
        first.lock().await.state = ConversationState::MoreProducts;
        let second = store.get_or_create(ClientId(1), Language::English).await;

        assert!(Arc::ptr_eq(&first, &second));
        let session = second.lock().await;
        assert_eq!(session.language, Language::French);
        assert_eq!(session.state, ConversationState::MoreProducts);
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_active() {
        let store = InMemorySessionStore::new(policy(2));

        store.get_or_create(ClientId(1), Language::French).await;
        store.get_or_create(ClientId(2), Language::French).await;
        store.get_or_create(ClientId(1), Language::French).await;
        store.get_or_create(ClientId(3), Language::French).await;

        assert_eq!(store.len().await, 2);
        assert!(store.get(ClientId(2)).await.is_none());
        assert!(store.get(ClientId(1)).await.is_some());
        assert!(store.get(ClientId(3)).await.is_some());
    }

    #[tokio::test]
    async fn capacity_eviction_spares_a_session_mid_turn() {
        let store = InMemorySessionStore::new(policy(1));
        let first = store.get_or_create(ClientId(1), Language::French).await;
        let guard = first.lock().await;

        store.get_or_create(ClientId(2), Language::French).await;
        assert_eq!(store.len().await, 2);

        let again = store.get_or_create(ClientId(1), Language::French).await;
        assert!(Arc::ptr_eq(&first, &again));
        assert!(again.try_lock().is_err());
        drop(guard);

        store.get_or_create(ClientId(3), Language::French).await;
        assert_eq!(store.len().await, 2);
        assert!(store.get(ClientId(2)).await.is_none());
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_unless_busy() {
        let store = InMemorySessionStore::new(policy(10));
        store.get_or_create(ClientId(1), Language::French).await;
        let busy = store.get_or_create(ClientId(2), Language::French).await;

        let later = Instant::now() + Duration::from_secs(120);
        let guard = busy.lock().await;
        assert_eq!(store.evict_idle_at(later).await, 1);
        drop(guard);

        assert!(store.get(ClientId(1)).await.is_none());
        assert!(store.get(ClientId(2)).await.is_some());
        assert_eq!(store.evict_idle_at(Instant::now()).await, 0);
    }

    #[tokio::test]
    async fn reset_and_delete_report_presence() {
        let store = InMemorySessionStore::default();
        assert!(!store.reset(ClientId(9)).await);

        let handle = store.get_or_create(ClientId(9), Language::English).await;
        handle.lock().await.state = ConversationState::DeliveryTime;

        assert!(store.reset(ClientId(9)).await);
        assert_eq!(handle.lock().await.state, ConversationState::Greeting);
        assert!(store.delete(ClientId(9)).await);
        assert!(!store.delete(ClientId(9)).await);
    }
}
