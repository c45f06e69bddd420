pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod language;
pub mod notice;
pub mod ranking;
pub mod reference;

pub use catalog::{localized_name, CatalogIndex, CatalogMatch};
pub use domain::client::{Client, ClientId};
pub use domain::farmer::{Farmer, FarmerId};
pub use domain::inventory::{DecrementOutcome, InventoryEntry, StockQuote};
pub use domain::order::{
    DayPart, DeliveryDay, DeliveryWindow, Order, OrderId, OrderLine, OrderRequest, OrderStatus,
    PendingOrderView,
};
pub use domain::product::{Product, ProductId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::ConversationState;
pub use language::Language;
pub use notice::DarijaNotice;
pub use ranking::{rank_farmers, stock_quotes, RankedFarmer, RANKING_LIMIT};
pub use reference::ReferenceData;
