use serde::{Deserialize, Serialize};

/// Product families sold through the booking core
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    Event,
    Transfer,
    Tour,
}

/// Trip direction for transfer products
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripType {
    OneWay,
    RoundTrip,
}

impl Default for TripType {
    fn default() -> Self {
        TripType::OneWay
    }
}
