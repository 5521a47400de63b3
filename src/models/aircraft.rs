use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::seat::CabinClass;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, JsonSchema)]
pub struct Aircraft {
    pub id: i64,
    pub registration: String,
    pub model: String,
    pub total_seats: i64,
    pub economy_seats: i64,
    pub economy_flex_seats: i64,
    pub business_seats: i64,
    pub first_seats: i64,
}

impl Aircraft {
    pub fn seats_in_class(&self, class: CabinClass) -> i64 {
        match class {
            CabinClass::Economy => self.economy_seats,
            CabinClass::EconomyFlex => self.economy_flex_seats,
            CabinClass::Business => self.business_seats,
            CabinClass::First => self.first_seats,
        }
    }

    /// Cabin layout front to back, premium classes first.
    pub fn class_distribution(&self) -> Vec<(CabinClass, i64)> {
        vec![
            (CabinClass::First, self.first_seats),
            (CabinClass::Business, self.business_seats),
            (CabinClass::EconomyFlex, self.economy_flex_seats),
            (CabinClass::Economy, self.economy_seats),
        ]
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NewAircraft {
    pub registration: String,
    pub model: String,
    pub economy_seats: i64,
    pub economy_flex_seats: i64,
    pub business_seats: i64,
    pub first_seats: i64,
}
