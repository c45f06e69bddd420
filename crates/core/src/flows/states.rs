use std::fmt;

use serde::{Deserialize, Serialize};

/// Steps of the order-taking conversation. The machine is cyclic: a confirmed or cancelled
/// order returns the session to `Greeting`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Greeting,
    ProductSelection,
    QuantitySelection,
    MoreProducts,
    DeliveryTime,
    FarmerSelection,
    OrderConfirmation,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::ProductSelection => "product_selection",
            Self::QuantitySelection => "quantity_selection",
            Self::MoreProducts => "more_products",
            Self::DeliveryTime => "delivery_time",
            Self::FarmerSelection => "farmer_selection",
            Self::OrderConfirmation => "order_confirmation",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
