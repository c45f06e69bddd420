use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::client::ClientId;
use crate::domain::farmer::FarmerId;
use crate::domain::product::ProductId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub i64);

impl OrderId {
    pub fn next_after(max_existing: Option<OrderId>) -> Self {
        Self(max_existing.map(|id| id.0 + 1).unwrap_or(1))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Accepted,
    Declined,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Accepted => "Accepted",
            Self::Declined => "Declined",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Pending" => Ok(Self::Pending),
            "Accepted" => Ok(Self::Accepted),
            "Declined" => Ok(Self::Declined),
            other => Err(DomainError::InvariantViolation(format!("unknown order status `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryDay {
    Today,
    Tomorrow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayPart {
    Morning,
    Evening,
}

/// Coarse delivery preference. Serialized as a token such as `tomorrow_evening`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryWindow {
    pub day: DeliveryDay,
    pub part: DayPart,
}

impl Default for DeliveryWindow {
    fn default() -> Self {
        Self { day: DeliveryDay::Tomorrow, part: DayPart::Evening }
    }
}

impl DeliveryWindow {
    pub fn token(&self) -> &'static str {
        match (self.day, self.part) {
            (DeliveryDay::Today, DayPart::Morning) => "today_morning",
            (DeliveryDay::Today, DayPart::Evening) => "today_evening",
            (DeliveryDay::Tomorrow, DayPart::Morning) => "tomorrow_morning",
            (DeliveryDay::Tomorrow, DayPart::Evening) => "tomorrow_evening",
        }
    }
}

impl fmt::Display for DeliveryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token().replace('_', " "))
    }
}

impl FromStr for DeliveryWindow {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (day, part) = value.trim().split_once('_').ok_or_else(|| {
            DomainError::InvariantViolation(format!("malformed delivery token `{value}`"))
        })?;
        let day = match day {
            "today" => DeliveryDay::Today,
            "tomorrow" => DeliveryDay::Tomorrow,
            _ => {
                return Err(DomainError::InvariantViolation(format!(
                    "unknown delivery day in `{value}`"
                )))
            }
        };
        let part = match part {
            "morning" => DayPart::Morning,
            "evening" => DayPart::Evening,
            _ => {
                return Err(DomainError::InvariantViolation(format!(
                    "unknown day part in `{value}`"
                )))
            }
        };
        Ok(Self { day, part })
    }
}

/// One product and quantity requested within an order confirmation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_id: ClientId,
    pub lines: Vec<OrderLine>,
    pub farmer_id: Option<FarmerId>,
    pub delivery: DeliveryWindow,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub client_id: ClientId,
    pub product_id: ProductId,
    pub farmer_id: FarmerId,
    pub quantity: u32,
    pub status: OrderStatus,
    pub delivery: DeliveryWindow,
}

/// Latest pending order joined with display data, as handed to the farmer notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOrderView {
    pub order_id: OrderId,
    pub client: ClientContact,
    pub farmer: FarmerContact,
    pub products: Vec<OrderedProduct>,
    pub delivery_time: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContact {
    pub id: ClientId,
    pub name: String,
    pub phone: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmerContact {
    pub id: FarmerId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedProduct {
    pub id: ProductId,
    pub name: String,
    pub arabic_name: String,
    pub quantity: u32,
}
