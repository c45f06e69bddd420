pub mod client;
pub mod farmer;
pub mod inventory;
pub mod order;
pub mod product;
