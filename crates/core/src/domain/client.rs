use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub i64);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub phone: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Client {
    /// Planar distance in coordinate units. No geodesic correction at marketplace scale.
    pub fn distance_to(&self, latitude: f64, longitude: f64) -> f64 {
        ((latitude - self.latitude).powi(2) + (longitude - self.longitude).powi(2)).sqrt()
    }
}
