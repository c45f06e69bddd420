//! Agent Runtime - the conversational order taker
//!
//! This crate is the part of fellah that talks to clients. For every inbound message it:
//! - Locks the client's session (`session`), creating it on first contact
//! - Classifies the message language and advances the order-taking state machine
//!   (`conversation`), consulting the catalog, the inventory ledger and the farmer ranker
//! - Persists the order through the order store once the client confirms
//! - Hands the resulting status text to a phraser (`llm`) for the final wording
//!
//! # Architecture
//!
//! The state machine is cyclic:
//! greeting → product_selection → quantity_selection → more_products → delivery_time →
//! farmer_selection → order_confirmation → greeting. A cancellation keyword returns any
//! state to greeting.
//!
//! # Key Types
//!
//! - `AgentRuntime` - process a message, look up the latest pending order
//! - `ConversationEngine` - the deterministic transition table
//! - `SessionStore` - per-client sessions with idle and capacity eviction
//! - `Phraser` - pluggable reply wording (template or OpenAI-compatible endpoint)
//!
//! # Safety Principle
//!
//! The phraser only rewords. Product resolution, stock checks, farmer ranking and order
//! persistence are decided by the state machine before any text reaches it.

pub mod conversation;
pub mod llm;
pub mod messages;
pub mod runtime;
pub mod session;

pub use conversation::{ConversationEngine, TurnOutcome};
pub use llm::{
    phraser_from_config, ChatCompletionPhraser, PhraseRequest, Phraser, PhraserError,
    TemplatePhraser,
};
pub use runtime::{AgentRuntime, ChatReply, LineItemView, ProductRef};
pub use session::{
    InMemorySessionStore, LineItem, Session, SessionHandle, SessionPolicy, SessionStore,
    Speaker, Turn,
};
