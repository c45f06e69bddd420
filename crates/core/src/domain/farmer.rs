use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FarmerId(pub i64);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Farmer {
    pub id: FarmerId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Aggregate rating out of 5, higher is better.
    pub feedback: f64,
}
